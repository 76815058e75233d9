use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;

/// Shared application state, built once at startup and cloned per request.
///
/// The store client is constructed here and injected through axum `State`
/// everywhere it is used, so tests can stand up handlers against their own
/// fixtures instead of a process-wide connection.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub http_client: reqwest::Client,
    /// Response cache for analytics dashboards, keyed by resolved range.
    pub analytics_cache: Cache<String, Value>,
    /// Per-shortlet locks serializing availability-check + range-commit so
    /// concurrent requests for the same shortlet cannot double-book.
    shortlet_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = match config.database_url.as_deref() {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.db_pool_max_connections)
                    .min_connections(config.db_pool_min_connections)
                    .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
                    .connect_lazy(url)?,
            ),
            None => {
                tracing::warn!("DATABASE_URL is not set — store-backed endpoints will be degraded");
                None
            }
        };

        let analytics_cache = Cache::builder()
            .max_capacity(config.analytics_cache_max_entries)
            .time_to_live(Duration::from_secs(config.analytics_cache_ttl_seconds))
            .build();

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            analytics_cache,
            shortlet_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Lock handle for one shortlet. Handles are created on first use and
    /// kept for the process lifetime; the registry is small (one entry per
    /// shortlet ever booked through this instance).
    pub fn shortlet_lock(&self, shortlet_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut registry = self
            .shortlet_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry
            .entry(shortlet_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::AppState;
    use crate::config::AppConfig;

    fn test_state() -> AppState {
        AppState::build(AppConfig::from_env()).expect("state builds without a database")
    }

    #[test]
    fn shortlet_lock_is_shared_per_id() {
        let state = test_state();
        let a = state.shortlet_lock("s-1");
        let b = state.shortlet_lock("s-1");
        let c = state.shortlet_lock("s-2");
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert!(!std::sync::Arc::ptr_eq(&a, &c));
    }
}

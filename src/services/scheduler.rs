use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::time::sleep;

use crate::repository::table_service::delete_rows;
use crate::state::AppState;

/// Spawn the background scheduler that runs periodic jobs.
///
/// Each job runs in its own `tokio::spawn` so a failure in one job never
/// crashes the scheduler loop.
pub async fn run_background_scheduler(state: AppState) {
    tracing::info!("Background scheduler started");

    let Some(pool) = state.db_pool.clone() else {
        tracing::warn!("Scheduler: no database pool configured, exiting");
        return;
    };

    let sweep_interval =
        Duration::from_secs(state.config.pending_sweep_interval_minutes.max(1) * 60);
    let ttl_hours = state.config.pending_booking_ttl_hours.max(1);

    let mut last_sweep: Option<tokio::time::Instant> = None;

    loop {
        sleep(Duration::from_secs(15)).await;

        let now = tokio::time::Instant::now();
        let due = match last_sweep {
            Some(previous) => now.duration_since(previous) >= sweep_interval,
            None => true,
        };
        if !due {
            continue;
        }
        last_sweep = Some(now);

        let pool = pool.clone();
        tokio::spawn(async move {
            sweep_expired_pending_bookings(&pool, ttl_hours).await;
        });
    }
}

/// Abandoned checkouts leave pending_bookings rows behind; anything older
/// than the TTL is deleted. Confirmed flows remove their own pending row.
async fn sweep_expired_pending_bookings(pool: &sqlx::PgPool, ttl_hours: i64) {
    let cutoff = Utc::now() - chrono::Duration::hours(ttl_hours);

    let mut filters = Map::new();
    filters.insert(
        "created_at__lt".to_string(),
        Value::String(cutoff.to_rfc3339()),
    );

    match delete_rows(pool, "pending_bookings", &filters).await {
        Ok(0) => {}
        Ok(removed) => {
            tracing::info!(removed, ttl_hours, "Scheduler: swept expired pending bookings");
        }
        Err(error) => {
            tracing::error!(error = %error, "Scheduler: pending booking sweep failed");
        }
    }
}

use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    /// Business timezone used for "today" boundaries and month bucketing.
    pub business_timezone: String,
    pub admin_api_key: Option<String>,
    pub paystack_secret_key: Option<String>,
    pub paystack_webhook_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from_address: String,
    pub app_public_url: String,
    pub analytics_cache_ttl_seconds: u64,
    pub analytics_cache_max_entries: u64,
    pub pending_booking_ttl_hours: i64,
    pub pending_sweep_interval_minutes: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Staylet API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            business_timezone: env_or("BUSINESS_TIMEZONE", "Africa/Lagos"),
            admin_api_key: env_opt("ADMIN_API_KEY"),
            paystack_secret_key: env_opt("PAYSTACK_SECRET_KEY"),
            paystack_webhook_secret: env_opt("PAYSTACK_WEBHOOK_SECRET"),
            resend_api_key: env_opt("RESEND_API_KEY"),
            email_from_address: env_or("EMAIL_FROM_ADDRESS", "noreply@staylet.app"),
            app_public_url: env_or("APP_PUBLIC_URL", "http://localhost:3000"),
            analytics_cache_ttl_seconds: env_parse_or("ANALYTICS_CACHE_TTL_SECONDS", 20),
            analytics_cache_max_entries: env_parse_or("ANALYTICS_CACHE_MAX_ENTRIES", 500),
            pending_booking_ttl_hours: env_parse_or("PENDING_BOOKING_TTL_HOURS", 24),
            pending_sweep_interval_minutes: env_parse_or("PENDING_SWEEP_INTERVAL_MINUTES", 30),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    /// Secret used to verify inbound webhook signatures. Paystack signs with
    /// the account secret key unless a dedicated webhook secret is set.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.paystack_webhook_secret
            .as_deref()
            .or(self.paystack_secret_key.as_deref())
            .filter(|value| !value.is_empty())
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::normalize_prefix;

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }
}

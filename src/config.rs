use std::env;
use std::time::Duration;

/// Upper bound for every synchronous webhook call.
pub const WEBHOOK_SYNC_TIMEOUT: Duration = Duration::from_secs(20);

/// Lifetime of cached responses from read-style sync webhooks.
pub const WEBHOOK_CACHE_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub webhook_sync_timeout: Duration,
    pub webhook_cache_timeout: Duration,
    /// Event deliveries older than this are purged by `purge-deliveries`.
    pub delivery_retention_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "payhook.db".to_string(),
            webhook_sync_timeout: WEBHOOK_SYNC_TIMEOUT,
            webhook_cache_timeout: WEBHOOK_CACHE_DEFAULT_TIMEOUT,
            delivery_retention_days: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            webhook_sync_timeout: secs_from_env("WEBHOOK_SYNC_TIMEOUT_SECS")
                .unwrap_or(defaults.webhook_sync_timeout),
            webhook_cache_timeout: secs_from_env("WEBHOOK_CACHE_TIMEOUT_SECS")
                .unwrap_or(defaults.webhook_cache_timeout),
            delivery_retention_days: env::var("DELIVERY_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.delivery_retention_days),
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

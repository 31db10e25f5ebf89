use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./linkpulse.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when generating short links, e.g. "https://go.example.com"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    /// Capacity of the click queue. Clicks arriving while it is full are dropped.
    pub click_buffer_size: usize,

    /// Number of background tasks writing clicks to the database
    pub click_worker_count: usize,

    /// Time between two availability checks of every destination
    pub monitor_interval: Duration,

    /// How long shutdown waits for queued clicks to be written
    pub shutdown_grace: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port: u16 = parse_var("PORT", 8080)
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let click_buffer_size = positive("CLICK_BUFFER_SIZE", 100)?;
        let click_worker_count = positive("CLICK_WORKER_COUNT", 5)?;
        let monitor_interval = positive_minutes("MONITOR_INTERVAL_MINUTES", 5)?;
        let shutdown_grace_secs: u64 = parse_var("SHUTDOWN_GRACE_SECS", 5)?;

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./linkpulse.db".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            click_buffer_size,
            click_worker_count,
            monitor_interval,
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
        };

        tracing::info!(
            "Configuration loaded: port={}, db={}, click buffer={}, click workers={}, monitor interval={:?}",
            config.port,
            config.database_url,
            config.click_buffer_size,
            config.click_worker_count,
            config.monitor_interval
        );

        Ok(config)
    }

    /// Public URL for a short code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url, short_code)
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn positive<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + From<u8>,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_var(key, default)?;
    if value < T::from(1) {
        anyhow::bail!("{key} must be at least 1");
    }
    Ok(value)
}

/// A whole number of minutes, at least 1.
fn positive_minutes(key: &str, default: u64) -> Result<Duration> {
    let minutes: u64 = positive(key, default)?;
    let secs = minutes
        .checked_mul(60)
        .with_context(|| format!("{key} is too large: {minutes} minutes"))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_when_unset() {
        let value: usize = parse_var("LINKPULSE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        std::env::set_var("LINKPULSE_TEST_GARBAGE", "lots");
        let result: Result<usize> = parse_var("LINKPULSE_TEST_GARBAGE", 1);
        assert!(result.is_err());
    }

    #[test]
    fn zero_is_not_positive() {
        std::env::set_var("LINKPULSE_TEST_ZERO_WORKERS", "0");
        let result: Result<usize> = positive("LINKPULSE_TEST_ZERO_WORKERS", 5);
        assert!(result.is_err());
    }

    #[test]
    fn minutes_become_a_duration() {
        let interval = positive_minutes("LINKPULSE_TEST_UNSET_MINUTES", 5).unwrap();
        assert_eq!(interval, Duration::from_secs(300));
    }

    #[test]
    fn oversized_minutes_are_rejected() {
        std::env::set_var("LINKPULSE_TEST_HUGE_MINUTES", u64::MAX.to_string());
        let err = positive_minutes("LINKPULSE_TEST_HUGE_MINUTES", 5).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn short_url_joins_base_and_code() {
        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            base_url: "https://go.example.com".into(),
            click_buffer_size: 100,
            click_worker_count: 5,
            monitor_interval: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(5),
        };
        assert_eq!(config.short_url("aB3xY9"), "https://go.example.com/aB3xY9");
    }
}

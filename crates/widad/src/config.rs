//! Environment configuration: plain `env::var` with fallback defaults
//! rather than pulling in a config crate for a binary this small.

use std::time::Duration;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub worker_concurrency: usize,
    pub log_filter: String,
    pub lease_timeout: chrono::Duration,
    pub reclaim_interval: Duration,
    pub schema_path: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("WIDA_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("WIDA_DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            port: env_parsed("WIDA_PORT", 8080),
            worker_concurrency: env_parsed("WIDA_WORKER_CONCURRENCY", 5),
            log_filter: env_or("WIDA_LOG", "info"),
            lease_timeout: chrono::Duration::seconds(env_parsed("WIDA_LEASE_TIMEOUT_SECS", 90)),
            reclaim_interval: Duration::from_secs(env_parsed("WIDA_RECLAIM_INTERVAL_SECS", 30)),
            schema_path: env_or("WIDA_SCHEMA_PATH", "schema.sql"),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

//! Configuration for the Billing API service.

use std::str::FromStr;
use std::time::Duration;

use rentora_billing_core::BillingConfig;

/// Billing API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Configuration with every optional setting at its default
    pub fn with_defaults(database_url: impl Into<String>) -> Self {
        Self {
            http_port: 8082,
            database_url: database_url.into(),
            billing: BillingConfig::default(),
            request_timeout: Duration::from_secs(30),
            metrics_enabled: true,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let http_port = env_or("HTTP_PORT", 8082u16)?;
        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let metrics_enabled = env_or("METRICS_ENABLED", true)?;

        // Billing core
        let plan_cache_ttl_secs = env_or("PLAN_CACHE_TTL_SECS", 60u64)?;
        let usage_window_days = env_or("USAGE_WINDOW_DAYS", 30i64)?;
        let stats_window_days = env_or("STATS_DEFAULT_WINDOW_DAYS", 30i64)?;

        if usage_window_days <= 0 {
            return Err(ConfigError::Invalid("USAGE_WINDOW_DAYS"));
        }
        if stats_window_days <= 0 {
            return Err(ConfigError::Invalid("STATS_DEFAULT_WINDOW_DAYS"));
        }

        let billing = BillingConfig::new()
            .with_plan_cache_ttl(Duration::from_secs(plan_cache_ttl_secs))
            .with_usage_window_days(usage_window_days)
            .with_stats_window_days(stats_window_days);

        Ok(Self {
            http_port,
            database_url,
            billing,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

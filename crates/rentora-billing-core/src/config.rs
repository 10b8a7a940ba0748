//! Billing engine configuration

use std::time::Duration;

/// Billing engine configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// How long plan lookups are cached
    pub plan_cache_ttl: Duration,
    /// Maximum number of cached plans
    pub plan_cache_capacity: u64,
    /// Length of the rolling window for periodic usage counters
    pub usage_window_days: i64,
    /// Default look-back for usage statistics
    pub stats_window_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            plan_cache_ttl: Duration::from_secs(60),
            plan_cache_capacity: 1_000,
            usage_window_days: 30,
            stats_window_days: 30,
        }
    }
}

impl BillingConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the plan cache TTL
    pub fn with_plan_cache_ttl(mut self, ttl: Duration) -> Self {
        self.plan_cache_ttl = ttl;
        self
    }

    /// Set the usage window length in days
    pub fn with_usage_window_days(mut self, days: i64) -> Self {
        self.usage_window_days = days;
        self
    }

    /// Set the default statistics window in days
    pub fn with_stats_window_days(mut self, days: i64) -> Self {
        self.stats_window_days = days;
        self
    }

    /// Usage window as a chrono duration
    pub fn usage_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.usage_window_days)
    }

    /// Statistics window as a chrono duration
    pub fn stats_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.stats_window_days)
    }
}

//! Shared handler state

use std::sync::Arc;
use std::time::Duration;

use rentora_billing_core::BillingService;
use rentora_db::DbPool;

use crate::config::Config;

/// Cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub billing: Arc<BillingService>,
    /// Only used by the readiness probe; `None` on the in-memory store
    pub pool: Option<DbPool>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(billing: BillingService, pool: Option<DbPool>, config: Config) -> Self {
        Self {
            billing: Arc::new(billing),
            pool,
            config: Arc::new(config),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("database", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

//! PostgreSQL repository implementations

mod event;
mod plan;
mod subscription;
mod usage;
mod user;

pub use event::PgSubscriptionEventRepository;
pub use plan::PgPlanRepository;
pub use subscription::PgSubscriptionRepository;
pub use usage::PgUsageLogRepository;
pub use user::{PgResourceRepository, PgUserRepository};

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub plans: PgPlanRepository,
    pub subscriptions: PgSubscriptionRepository,
    pub usage_logs: PgUsageLogRepository,
    pub users: PgUserRepository,
    pub resources: PgResourceRepository,
    pub events: PgSubscriptionEventRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            plans: PgPlanRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            usage_logs: PgUsageLogRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            resources: PgResourceRepository::new(pool.clone()),
            events: PgSubscriptionEventRepository::new(pool),
        }
    }
}

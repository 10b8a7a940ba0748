//! Repository handles used by the engine

use std::sync::Arc;

use rentora_db::{
    MemoryStore, PlanRepository, Repositories, ResourceRepository, SubscriptionEventRepository,
    SubscriptionRepository, UsageLogRepository, UserRepository,
};

/// Trait-object handles to every repository the engine reads or writes
#[derive(Clone)]
pub struct BillingStores {
    pub plans: Arc<dyn PlanRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub usage_logs: Arc<dyn UsageLogRepository>,
    pub users: Arc<dyn UserRepository>,
    pub resources: Arc<dyn ResourceRepository>,
    pub events: Arc<dyn SubscriptionEventRepository>,
}

impl From<Repositories> for BillingStores {
    fn from(repos: Repositories) -> Self {
        Self {
            plans: Arc::new(repos.plans),
            subscriptions: Arc::new(repos.subscriptions),
            usage_logs: Arc::new(repos.usage_logs),
            users: Arc::new(repos.users),
            resources: Arc::new(repos.resources),
            events: Arc::new(repos.events),
        }
    }
}

impl From<MemoryStore> for BillingStores {
    fn from(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            plans: store.clone(),
            subscriptions: store.clone(),
            usage_logs: store.clone(),
            users: store.clone(),
            resources: store.clone(),
            events: store,
        }
    }
}

impl std::fmt::Debug for BillingStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingStores").finish_non_exhaustive()
    }
}

//! Billing service
//!
//! Wires the catalog, lifecycle manager, gate and recorder over one set of
//! stores and exposes the engine's operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rentora_db::UsageLogRepository;
use rentora_types::{
    Feature, PaymentId, Plan, PlanId, Subscription, SubscriptionId, UsageDecision, UsageLogEntry,
    UsageStats, UserId,
};
use tracing::instrument;

use crate::events::{EventSink, StoreEventSink};
use crate::lifecycle::{CreateSubscriptionOptions, SubscriptionPatch};
use crate::recorder::{RecordUsage, UsageReceipt};
use crate::{
    BillingConfig, BillingError, BillingStores, Clock, PlanCatalog, SubscriptionManager,
    SystemClock, UsageGate, UsageRecorder,
};

/// Billing service
#[derive(Clone)]
pub struct BillingService {
    catalog: Arc<PlanCatalog>,
    manager: Arc<SubscriptionManager>,
    gate: Arc<UsageGate>,
    recorder: Arc<UsageRecorder>,
    usage_logs: Arc<dyn UsageLogRepository>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
}

impl BillingService {
    /// Create a billing service on the system clock, persisting lifecycle events
    pub fn new(stores: BillingStores, config: BillingConfig) -> Self {
        let events = Arc::new(StoreEventSink::new(stores.events.clone()));
        Self::with_parts(stores, config, Arc::new(SystemClock), events)
    }

    /// Create a billing service with an explicit clock and event sink
    pub fn with_parts(
        stores: BillingStores,
        config: BillingConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let catalog = Arc::new(PlanCatalog::with_config(stores.plans.clone(), &config));
        let manager = Arc::new(SubscriptionManager::new(
            stores.subscriptions.clone(),
            stores.users.clone(),
            catalog.clone(),
            events,
            clock.clone(),
            config.clone(),
        ));
        let gate = Arc::new(UsageGate::new(
            manager.clone(),
            catalog.clone(),
            stores.resources.clone(),
            clock.clone(),
        ));
        let recorder = Arc::new(UsageRecorder::new(
            gate.clone(),
            stores.subscriptions.clone(),
            stores.usage_logs.clone(),
            clock.clone(),
            config.clone(),
        ));

        Self {
            catalog,
            manager,
            gate,
            recorder,
            usage_logs: stores.usage_logs,
            clock,
            config,
        }
    }

    /// Plan catalog
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Subscription lifecycle manager
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.manager
    }

    /// Usage gate
    pub fn gate(&self) -> &UsageGate {
        &self.gate
    }

    /// List plans currently offered
    pub async fn list_plans(&self) -> Result<Vec<Plan>, BillingError> {
        self.catalog.list_active_plans().await
    }

    /// Subscribe a user to a plan
    pub async fn create_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        options: CreateSubscriptionOptions,
    ) -> Result<Subscription, BillingError> {
        self.manager.create_subscription(user_id, plan_id, options).await
    }

    /// Get a subscription by ID
    pub async fn get_subscription(&self, id: SubscriptionId) -> Result<Subscription, BillingError> {
        self.manager.get_subscription(id).await
    }

    /// The user's live subscription, if any
    pub async fn get_active_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, BillingError> {
        self.manager.get_active_subscription(user_id).await
    }

    /// Apply a partial update to a subscription
    pub async fn update_subscription(
        &self,
        id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, BillingError> {
        self.manager.update_subscription(id, patch).await
    }

    /// Cancel a subscription now or at period end
    pub async fn cancel_subscription(
        &self,
        id: SubscriptionId,
        defer_to_period_end: bool,
    ) -> Result<Subscription, BillingError> {
        self.manager.cancel_subscription(id, defer_to_period_end).await
    }

    /// Renew a subscription for one more billing cycle
    pub async fn renew_subscription(
        &self,
        id: SubscriptionId,
        payment_id: Option<PaymentId>,
    ) -> Result<Subscription, BillingError> {
        self.manager.renew_subscription(id, payment_id).await
    }

    /// Check whether a user may use a feature
    pub async fn check_usage_limit(
        &self,
        user_id: UserId,
        feature: Feature,
        required_count: i64,
    ) -> Result<UsageDecision, BillingError> {
        self.gate
            .check_usage_limit(user_id, feature, required_count)
            .await
    }

    /// Record usage of a feature
    pub async fn record_usage(&self, usage: RecordUsage) -> Result<UsageReceipt, BillingError> {
        self.recorder.record_usage(usage).await
    }

    /// Aggregate a user's usage log over `[start, end]`.
    ///
    /// `end` defaults to now and `start` to the configured statistics window
    /// before `end`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn usage_stats(
        &self,
        user_id: UserId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<UsageStats, BillingError> {
        let end = end.unwrap_or_else(|| self.clock.now());
        let start = start.unwrap_or(end - self.config.stats_window());
        if start > end {
            return Err(BillingError::Validation(
                "start date must not be after end date".to_string(),
            ));
        }

        let entries = self
            .usage_logs
            .find_by_user_in_range(user_id.0, start, end)
            .await?
            .into_iter()
            .map(UsageLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UsageStats::aggregate(start, end, &entries))
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentora_types::{Subscription, UsageCounter};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Plan repository trait (read-only from the billing engine)
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find a plan by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>>;

    /// Find the active plan flagged as the free fallback
    async fn find_free(&self) -> DbResult<Option<PlanRow>>;

    /// List active plans ordered by price
    async fn list_active(&self) -> DbResult<Vec<PlanRow>>;
}

/// Subscription repository trait
///
/// Lifecycle fields and usage counters are written through separate methods:
/// `update` never touches counters, and counters only change through the
/// atomic `increment_usage` and `reset_usage_window` statements.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Find subscriptions that are TRIAL or ACTIVE with `end_date > now`
    async fn find_live_by_user_id(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SubscriptionRow>>;

    /// Insert a subscription unless the user already has a live one.
    ///
    /// Fails with `DbError::Conflict` when a live subscription exists. The
    /// check and the insert are serialized per user.
    async fn create_if_no_live(
        &self,
        sub: CreateSubscription,
        now: DateTime<Utc>,
    ) -> DbResult<SubscriptionRow>;

    /// Persist lifecycle fields
    async fn update(&self, id: Uuid, update: UpdateSubscription) -> DbResult<SubscriptionRow>;

    /// Atomically add `count` to a usage counter.
    ///
    /// With a `ceiling`, the increment only applies if the new value stays at
    /// or below it. Returns the new counter value, or `None` when the guard
    /// rejected the increment or the subscription does not exist.
    async fn increment_usage(
        &self,
        id: Uuid,
        counter: UsageCounter,
        count: i64,
        ceiling: Option<i64>,
    ) -> DbResult<Option<i64>>;

    /// Zero the periodic counters and start a new usage window, but only if
    /// the current window has elapsed at `now`. Returns whether a reset happened.
    async fn reset_usage_window(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub status: String,
    pub auto_renew: bool,
    pub last_usage_reset: DateTime<Utc>,
    pub next_usage_reset: DateTime<Utc>,
}

/// Lifecycle fields written by `SubscriptionRepository::update`
#[derive(Debug, Clone)]
pub struct UpdateSubscription {
    pub status: String,
    pub payment_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub cancelled_date: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub auto_renew: bool,
    pub renewal_attempts: i32,
    pub last_renewal_attempt: Option<DateTime<Utc>>,
}

impl From<&SubscriptionRow> for UpdateSubscription {
    fn from(row: &SubscriptionRow) -> Self {
        Self {
            status: row.status.clone(),
            payment_id: row.payment_id,
            start_date: row.start_date,
            end_date: row.end_date,
            cancelled_date: row.cancelled_date,
            cancel_at_period_end: row.cancel_at_period_end,
            auto_renew: row.auto_renew,
            renewal_attempts: row.renewal_attempts,
            last_renewal_attempt: row.last_renewal_attempt,
        }
    }
}

impl From<&Subscription> for UpdateSubscription {
    fn from(sub: &Subscription) -> Self {
        Self {
            status: sub.status.as_str().to_string(),
            payment_id: sub.payment_id.map(|p| p.0),
            start_date: sub.start_date,
            end_date: sub.end_date,
            cancelled_date: sub.cancelled_date,
            cancel_at_period_end: sub.cancel_at_period_end,
            auto_renew: sub.auto_renew,
            renewal_attempts: sub.renewal_attempts,
            last_renewal_attempt: sub.last_renewal_attempt,
        }
    }
}

/// Usage log repository trait (append-only)
#[async_trait]
pub trait UsageLogRepository: Send + Sync {
    /// Append a usage log entry.
    ///
    /// An entry carrying an idempotency key already used by the same user is
    /// rejected with `DbError::Conflict`, so the append doubles as a claim on
    /// the key.
    async fn append(&self, entry: CreateUsageLog) -> DbResult<UsageLogRow>;

    /// Remove an entry, releasing its idempotency key
    async fn delete(&self, id: Uuid) -> DbResult<()>;

    /// Find an entry previously recorded under an idempotency key
    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<UsageLogRow>>;

    /// Entries for a user created within `[from, to]`, oldest first
    async fn find_by_user_in_range(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<UsageLogRow>>;
}

/// Create usage log input
#[derive(Debug, Clone)]
pub struct CreateUsageLog {
    pub id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub user_id: Uuid,
    pub feature: String,
    pub resource_id: Option<Uuid>,
    pub action: String,
    pub quantity: i64,
    pub was_gated: bool,
    pub gate_type: Option<String>,
    pub override_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User lookup owned by the accounts module
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;
}

/// Ground-truth resource counts used for free-tier usage
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Properties currently owned by the user
    async fn count_properties_by_owner(&self, owner_id: Uuid) -> DbResult<i64>;

    /// Visits scheduled by the user as tenant within `[from, to)`
    async fn count_visits_by_tenant(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<i64>;

    /// Boosted properties created by the user within `[from, to)`
    async fn count_boosted_properties_by_owner(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<i64>;
}

/// Subscription lifecycle event log
#[async_trait]
pub trait SubscriptionEventRepository: Send + Sync {
    /// Append an event
    async fn append(&self, event: CreateSubscriptionEvent) -> DbResult<()>;

    /// Events for a subscription, oldest first
    async fn find_by_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> DbResult<Vec<SubscriptionEventRow>>;
}

/// Create subscription event input
#[derive(Debug, Clone)]
pub struct CreateSubscriptionEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

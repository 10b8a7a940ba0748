//! Usage recorder
//!
//! Commits a usage event: re-checks the gate, bumps the subscription counter
//! with a single guarded increment and appends the audit log entry.
//!
//! A request carrying an idempotency key writes its log entry before the
//! increment. The unique key on the log makes that write a claim; losing it
//! means another request already counted the usage. A claim whose increment
//! fails is deleted again.

use std::sync::Arc;

use rentora_db::{CreateUsageLog, DbError, SubscriptionRepository, UsageLogRepository};
use rentora_types::{
    Feature, Subscription, UsageCounter, UsageDecision, UsageLogId, UserId, ValidationError,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::gate::ResolvedPlanContext;
use crate::{BillingConfig, BillingError, Clock, UsageGate};

/// Longest accepted idempotency key
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// A usage event to record
#[derive(Debug, Clone)]
pub struct RecordUsage {
    pub user_id: UserId,
    pub feature: Feature,
    pub resource_id: Option<Uuid>,
    pub action: String,
    pub count: i64,
    /// Record even when the gate blocks the request
    pub override_gate: bool,
    pub override_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Retries carrying the same key are recorded once
    pub idempotency_key: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RecordUsage {
    /// A single use of `feature`
    pub fn new(user_id: UserId, feature: Feature) -> Self {
        Self {
            user_id,
            feature,
            resource_id: None,
            action: "use".to_string(),
            count: 1,
            override_gate: false,
            override_reason: None,
            metadata: None,
            idempotency_key: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_resource(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Bypass a hard gate
    pub fn overriding(mut self, reason: impl Into<String>) -> Self {
        self.override_gate = true;
        self.override_reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Attach caller address and user agent
    pub fn with_request_meta(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.count < 1 {
            return Err(ValidationError::NonPositiveCount);
        }
        if self.action.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "action",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(key) = &self.idempotency_key {
            if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(ValidationError::InvalidField {
                    field: "idempotency key",
                    reason: format!("must be 1 to {MAX_IDEMPOTENCY_KEY_LEN} characters"),
                });
            }
        }
        Ok(())
    }
}

/// Outcome of a recorded usage event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReceipt {
    /// Gate decision in effect when the usage was recorded
    pub decision: UsageDecision,
    /// Counter value after the increment; `None` when nothing is counted
    pub usage_after: Option<i64>,
    /// Audit log entry; `None` if the log append failed
    pub log_id: Option<UsageLogId>,
    /// An earlier request with the same idempotency key was returned
    pub replayed: bool,
}

/// Usage recorder
#[derive(Clone)]
pub struct UsageRecorder {
    gate: Arc<UsageGate>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage_logs: Arc<dyn UsageLogRepository>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
}

impl UsageRecorder {
    /// Create a new usage recorder
    pub fn new(
        gate: Arc<UsageGate>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        usage_logs: Arc<dyn UsageLogRepository>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Self {
        Self {
            gate,
            subscriptions,
            usage_logs,
            clock,
            config,
        }
    }

    /// Record usage of a feature.
    ///
    /// Fails with `UsageLimitExceeded` when the gate blocks the request and
    /// no override is given; nothing is counted or logged in that case.
    ///
    /// With an idempotency key the audit entry is written first and acts as
    /// a claim on the key: of several concurrent requests sharing a key only
    /// the one holding the claim touches the counter, the others replay it.
    #[instrument(
        skip(self, usage),
        fields(user_id = %usage.user_id, feature = %usage.feature, count = usage.count)
    )]
    pub async fn record_usage(&self, usage: RecordUsage) -> Result<UsageReceipt, BillingError> {
        usage.validate()?;

        if let Some(key) = &usage.idempotency_key {
            if let Some(previous) = self
                .usage_logs
                .find_by_idempotency_key(usage.user_id.0, key)
                .await?
            {
                return self.replay(&usage, UsageLogId(previous.id)).await;
            }
        }

        let context = self.gate.resolve(usage.user_id).await?;
        let decision = self
            .gate
            .decide(&context, usage.user_id, usage.feature, usage.count)
            .await?;

        if decision.is_gated && !usage.override_gate {
            tracing::info!(remaining = ?decision.remaining, "usage blocked by hard gate");
            return Err(exceeded(&decision));
        }
        if decision.is_gated {
            tracing::warn!(
                reason = usage.override_reason.as_deref().unwrap_or(""),
                "hard gate overridden"
            );
        }

        let claimed = if usage.idempotency_key.is_some() {
            match self.claim(&usage, &decision).await? {
                Claim::Held(log_id) => Some(log_id),
                Claim::Replay(log_id) => return self.replay(&usage, log_id).await,
                Claim::Unavailable => None,
            }
        } else {
            None
        };

        let usage_after = match (&context, usage.feature.counter()) {
            (ResolvedPlanContext::Subscribed { subscription, .. }, Some(counter)) => {
                match self.increment(subscription, &context, &usage, counter).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        if let Some(log_id) = claimed {
                            self.release(log_id).await;
                        }
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        let log_id = match claimed {
            Some(log_id) => Some(log_id),
            None if usage.idempotency_key.is_some() => None,
            None => self.append_log(&usage, &decision).await.ok(),
        };

        Ok(UsageReceipt {
            decision,
            usage_after,
            log_id,
            replayed: false,
        })
    }

    /// Receipt for a request whose idempotency key was already used
    async fn replay(
        &self,
        usage: &RecordUsage,
        log_id: UsageLogId,
    ) -> Result<UsageReceipt, BillingError> {
        tracing::info!(log_id = %log_id, "usage already recorded, replaying");
        let decision = self
            .gate
            .check_usage_limit(usage.user_id, usage.feature, usage.count)
            .await?;
        Ok(UsageReceipt {
            decision,
            usage_after: None,
            log_id: Some(log_id),
            replayed: true,
        })
    }

    /// Write the audit entry up front to take the request's idempotency key
    async fn claim(
        &self,
        usage: &RecordUsage,
        decision: &UsageDecision,
    ) -> Result<Claim, BillingError> {
        let Some(key) = usage.idempotency_key.as_deref() else {
            return Ok(Claim::Unavailable);
        };

        // A competing holder may release its claim between our conflict and
        // the lookup, so the append is retried once
        for _ in 0..2 {
            match self.append_log(usage, decision).await {
                Ok(log_id) => return Ok(Claim::Held(log_id)),
                Err(DbError::Conflict(_)) => {
                    if let Some(previous) = self
                        .usage_logs
                        .find_by_idempotency_key(usage.user_id.0, key)
                        .await?
                    {
                        return Ok(Claim::Replay(UsageLogId(previous.id)));
                    }
                }
                Err(_) => return Ok(Claim::Unavailable),
            }
        }

        Err(DbError::Conflict(format!("idempotency key {key} is contended")).into())
    }

    /// Drop a claimed entry after its usage failed to count
    async fn release(&self, log_id: UsageLogId) {
        if let Err(e) = self.usage_logs.delete(log_id.0).await {
            tracing::warn!(log_id = %log_id, error = %e, "failed to release usage log claim");
        }
    }

    async fn increment(
        &self,
        subscription: &Subscription,
        context: &ResolvedPlanContext,
        usage: &RecordUsage,
        counter: UsageCounter,
    ) -> Result<i64, BillingError> {
        let now = self.clock.now();
        if counter.is_periodic() && subscription.usage_window_elapsed(now) {
            let reset = self
                .subscriptions
                .reset_usage_window(subscription.id.0, now, now + self.config.usage_window())
                .await?;
            if reset {
                tracing::info!(subscription_id = %subscription.id, "usage window reset");
            }
        }

        let limit = context.effective_quota(usage.feature).unwrap_or(0);
        let ceiling = (!usage.override_gate).then_some(limit);

        if let Some(value) = self
            .subscriptions
            .increment_usage(subscription.id.0, counter, usage.count, ceiling)
            .await?
        {
            return Ok(value);
        }

        // Unguarded increments only miss when the row is gone
        let Some(limit) = ceiling else {
            return Err(BillingError::SubscriptionNotFound);
        };

        // Guard rejected the increment: a concurrent request used the headroom
        let current = self
            .subscriptions
            .find_by_id(subscription.id.0)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
            .and_then(|row| Subscription::try_from(row).map_err(BillingError::from))?
            .usage_at(counter, now);

        tracing::info!(current, limit, "usage blocked by concurrent update");
        Err(BillingError::UsageLimitExceeded {
            remaining: limit - current,
            current,
            limit,
        })
    }

    async fn append_log(
        &self,
        usage: &RecordUsage,
        decision: &UsageDecision,
    ) -> Result<UsageLogId, DbError> {
        let entry = CreateUsageLog {
            id: Uuid::new_v4(),
            subscription_id: decision.subscription_id.map(|s| s.0),
            user_id: usage.user_id.0,
            feature: usage.feature.as_str().to_string(),
            resource_id: usage.resource_id,
            action: usage.action.clone(),
            quantity: usage.count,
            was_gated: decision.is_gated,
            gate_type: decision.gate_type.map(|g| g.as_str().to_string()),
            override_reason: usage
                .override_gate
                .then(|| usage.override_reason.clone())
                .flatten(),
            ip_address: usage.ip_address.clone(),
            user_agent: usage.user_agent.clone(),
            metadata: usage.metadata.clone(),
            idempotency_key: usage.idempotency_key.clone(),
            created_at: self.clock.now(),
        };

        self.usage_logs
            .append(entry)
            .await
            .map(|row| UsageLogId(row.id))
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to append usage log");
                e
            })
    }
}

/// Outcome of taking an idempotency key
enum Claim {
    /// This request owns the key; its audit entry is already written
    Held(UsageLogId),
    /// Another request owns the key
    Replay(UsageLogId),
    /// The log store is unreachable; usage proceeds without an entry
    Unavailable,
}

fn exceeded(decision: &UsageDecision) -> BillingError {
    BillingError::UsageLimitExceeded {
        remaining: decision.remaining.unwrap_or(0),
        current: decision.current_usage,
        limit: decision.max_limit.unwrap_or(0),
    }
}

impl std::fmt::Debug for UsageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageRecorder").finish_non_exhaustive()
    }
}

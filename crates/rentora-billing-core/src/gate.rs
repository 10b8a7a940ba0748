//! Usage gate
//!
//! Resolves which plan applies to a user, measures current usage of a
//! feature and classifies the request against the plan's quota.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rentora_db::ResourceRepository;
use rentora_types::{
    evaluate_quota, Feature, FeatureRule, GateType, PlanId, PlanLimits, Subscription,
    SubscriptionId, UsageCounter, UsageDecision, UserId, ValidationError,
};
use tracing::instrument;

use crate::{BillingError, Clock, PlanCatalog, SubscriptionManager};

/// The plan a user is gated against, resolved once per check
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPlanContext {
    /// Live subscription; usage comes from its counters
    Subscribed {
        subscription: Subscription,
        limits: PlanLimits,
    },
    /// No live subscription; usage is counted from existing resources.
    /// `plan_id` is `None` when the built-in fallback limits apply.
    FreeTier {
        plan_id: Option<PlanId>,
        limits: PlanLimits,
    },
}

impl ResolvedPlanContext {
    pub fn limits(&self) -> &PlanLimits {
        match self {
            Self::Subscribed { limits, .. } | Self::FreeTier { limits, .. } => limits,
        }
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            Self::Subscribed { subscription, .. } => Some(subscription),
            Self::FreeTier { .. } => None,
        }
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription().map(|s| s.id)
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        match self {
            Self::Subscribed { subscription, .. } => Some(subscription.plan_id),
            Self::FreeTier { plan_id, .. } => *plan_id,
        }
    }

    /// Quota applied to `feature`, or `None` for flag-only features.
    ///
    /// Quota features that also require a flag get a zero quota while the
    /// flag is off.
    pub fn effective_quota(&self, feature: Feature) -> Option<i64> {
        let limits = self.limits();
        match feature.rule() {
            FeatureRule::Quota { counter, requires } => {
                if requires.is_some_and(|flag| !limits.flag(flag)) {
                    Some(0)
                } else {
                    Some(limits.quota(counter))
                }
            }
            FeatureRule::Flag(_) => None,
        }
    }
}

/// Usage gate
#[derive(Clone)]
pub struct UsageGate {
    manager: Arc<SubscriptionManager>,
    catalog: Arc<PlanCatalog>,
    resources: Arc<dyn ResourceRepository>,
    clock: Arc<dyn Clock>,
}

impl UsageGate {
    /// Create a new usage gate
    pub fn new(
        manager: Arc<SubscriptionManager>,
        catalog: Arc<PlanCatalog>,
        resources: Arc<dyn ResourceRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manager,
            catalog,
            resources,
            clock,
        }
    }

    /// Decide whether `user_id` may use `feature` `required_count` more times.
    ///
    /// Read-only: repeated calls without intervening usage return the same
    /// decision.
    #[instrument(skip(self), fields(user_id = %user_id, feature = %feature))]
    pub async fn check_usage_limit(
        &self,
        user_id: UserId,
        feature: Feature,
        required_count: i64,
    ) -> Result<UsageDecision, BillingError> {
        if required_count < 1 {
            return Err(ValidationError::NonPositiveCount.into());
        }

        let context = self.resolve(user_id).await?;
        self.decide(&context, user_id, feature, required_count).await
    }

    /// Resolve the plan context for a user
    pub async fn resolve(&self, user_id: UserId) -> Result<ResolvedPlanContext, BillingError> {
        if let Some(subscription) = self.manager.get_active_subscription(user_id).await? {
            let plan = self.catalog.get_plan(subscription.plan_id).await?;
            return Ok(ResolvedPlanContext::Subscribed {
                subscription,
                limits: plan.limits,
            });
        }

        Ok(match self.catalog.get_free_plan().await? {
            Some(plan) => ResolvedPlanContext::FreeTier {
                plan_id: Some(plan.id),
                limits: plan.limits,
            },
            None => ResolvedPlanContext::FreeTier {
                plan_id: None,
                limits: PlanLimits::FREE_FALLBACK,
            },
        })
    }

    /// Evaluate a feature request against an already resolved context
    pub async fn decide(
        &self,
        context: &ResolvedPlanContext,
        user_id: UserId,
        feature: Feature,
        required_count: i64,
    ) -> Result<UsageDecision, BillingError> {
        let subscription_id = context.subscription_id();
        let plan_id = context.plan_id();

        let decision = match feature.rule() {
            FeatureRule::Flag(flag) => {
                let enabled = context.limits().flag(flag);
                UsageDecision {
                    feature,
                    has_access: enabled,
                    is_gated: !enabled,
                    gate_type: (!enabled).then_some(GateType::Hard),
                    current_usage: 0,
                    max_limit: (!enabled).then_some(0),
                    remaining: (!enabled).then_some(0),
                    subscription_id,
                    plan_id,
                }
            }
            FeatureRule::Quota { counter, .. } => {
                let max_limit = context.effective_quota(feature).unwrap_or(0);
                let current_usage = self.current_usage(context, user_id, counter).await?;
                let verdict = evaluate_quota(current_usage, max_limit, required_count);
                UsageDecision {
                    feature,
                    has_access: !verdict.is_gated,
                    is_gated: verdict.is_gated,
                    gate_type: verdict.gate_type,
                    current_usage,
                    max_limit: Some(max_limit),
                    remaining: Some(verdict.remaining),
                    subscription_id,
                    plan_id,
                }
            }
        };

        if let Some(gate) = decision.gate_type {
            tracing::debug!(
                gate = %gate,
                current = decision.current_usage,
                remaining = ?decision.remaining,
                "usage gate triggered"
            );
        }

        Ok(decision)
    }

    async fn current_usage(
        &self,
        context: &ResolvedPlanContext,
        user_id: UserId,
        counter: UsageCounter,
    ) -> Result<i64, BillingError> {
        let now = self.clock.now();
        match context {
            ResolvedPlanContext::Subscribed { subscription, .. } => {
                Ok(subscription.usage_at(counter, now))
            }
            ResolvedPlanContext::FreeTier { .. } => match counter {
                UsageCounter::Properties => {
                    Ok(self.resources.count_properties_by_owner(user_id.0).await?)
                }
                UsageCounter::Visits => {
                    let (from, to) = calendar_month(now)?;
                    Ok(self
                        .resources
                        .count_visits_by_tenant(user_id.0, from, to)
                        .await?)
                }
                UsageCounter::Boosts => {
                    let (from, to) = calendar_month(now)?;
                    Ok(self
                        .resources
                        .count_boosted_properties_by_owner(user_id.0, from, to)
                        .await?)
                }
                // Per-property quotas; no property context at this level
                UsageCounter::Media | UsageCounter::Amenities => Ok(0),
            },
        }
    }
}

/// `[first instant of the month, first instant of the next month)` containing `now`
pub(crate) fn calendar_month(
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), BillingError> {
    let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc());
    let bounds = start.and_then(|s| s.checked_add_months(Months::new(1)).map(|e| (s, e)));
    bounds.ok_or_else(|| BillingError::Validation("date out of supported range".to_string()))
}

impl std::fmt::Debug for UsageGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGate").finish()
    }
}

//! Subscription lifecycle management
//!
//! Creates, updates, cancels and renews subscriptions. Every write goes
//! through `SubscriptionRepository::update` or `create_if_no_live`; usage
//! counters are never touched here.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rentora_db::{CreateSubscription, DbError, SubscriptionRepository, UpdateSubscription, UserRepository};
use rentora_types::{
    BillingCycle, PaymentId, PlanId, Subscription, SubscriptionEventKind, SubscriptionId,
    SubscriptionStatus, UserId,
};
use tracing::instrument;
use uuid::Uuid;

use crate::events::{EventSink, LifecycleEvent};
use crate::{BillingConfig, BillingError, Clock, PlanCatalog};

/// Optional overrides for a new subscription; unset fields come from the plan
#[derive(Debug, Clone, Default)]
pub struct CreateSubscriptionOptions {
    pub payment_id: Option<PaymentId>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    /// Defaults to now
    pub start_date: Option<DateTime<Utc>>,
    pub trial_days: Option<u32>,
    pub auto_renew: Option<bool>,
}

/// Partial update of a subscription
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub status: Option<SubscriptionStatus>,
    pub auto_renew: Option<bool>,
    pub cancel_at_period_end: Option<bool>,
    pub payment_id: Option<PaymentId>,
}

impl SubscriptionPatch {
    /// Whether the patch carries no fields
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.auto_renew.is_none()
            && self.cancel_at_period_end.is_none()
            && self.payment_id.is_none()
    }
}

/// Subscription lifecycle manager
#[derive(Clone)]
pub struct SubscriptionManager {
    subscriptions: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserRepository>,
    catalog: Arc<PlanCatalog>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
}

impl SubscriptionManager {
    /// Create a new subscription manager
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserRepository>,
        catalog: Arc<PlanCatalog>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Self {
        Self {
            subscriptions,
            users,
            catalog,
            events,
            clock,
            config,
        }
    }

    /// Subscribe a user to a plan
    #[instrument(skip(self, options), fields(user_id = %user_id, plan_id = %plan_id))]
    pub async fn create_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        options: CreateSubscriptionOptions,
    ) -> Result<Subscription, BillingError> {
        let user = self
            .users
            .find_by_id(user_id.0)
            .await?
            .ok_or(BillingError::UserNotFound)?;
        if !user.is_active {
            return Err(BillingError::UserInactive);
        }

        let plan = self.catalog.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(BillingError::PlanInactive);
        }

        let price_cents = options.price_cents.unwrap_or(plan.price_cents);
        if price_cents < 0 {
            return Err(BillingError::Validation("price must not be negative".to_string()));
        }
        let currency = options.currency.unwrap_or(plan.currency);
        if currency.trim().is_empty() {
            return Err(BillingError::Validation("currency must not be empty".to_string()));
        }

        let now = self.clock.now();
        let start_date = options.start_date.unwrap_or(now);
        let billing_cycle = options.billing_cycle.unwrap_or(plan.billing_cycle);
        let trial_days = options.trial_days.unwrap_or(plan.trial_days);

        let end_date = advance(billing_cycle, start_date)?;
        let trial_end_date = if trial_days > 0 {
            Some(
                start_date
                    .checked_add_signed(Duration::days(i64::from(trial_days)))
                    .ok_or_else(out_of_range)?,
            )
        } else {
            None
        };
        let status = if trial_days > 0 {
            SubscriptionStatus::Trial
        } else {
            SubscriptionStatus::Active
        };

        let input = CreateSubscription {
            id: Uuid::new_v4(),
            user_id: user_id.0,
            plan_id: plan_id.0,
            payment_id: options.payment_id.map(|p| p.0),
            price_cents,
            currency,
            billing_cycle: billing_cycle.as_str().to_string(),
            start_date,
            end_date,
            trial_end_date,
            status: status.as_str().to_string(),
            auto_renew: options.auto_renew.unwrap_or(true),
            last_usage_reset: start_date,
            next_usage_reset: start_date + self.config.usage_window(),
        };

        let row = match self.subscriptions.create_if_no_live(input, now).await {
            Ok(row) => row,
            Err(DbError::Conflict(_)) => return Err(BillingError::DuplicateSubscription),
            Err(e) => return Err(e.into()),
        };
        let subscription = Subscription::try_from(row)?;

        tracing::info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            end_date = %subscription.end_date,
            "subscription created"
        );
        self.emit(SubscriptionEventKind::Created, &subscription, now).await;

        Ok(subscription)
    }

    /// Apply a partial update
    #[instrument(skip(self, patch), fields(subscription_id = %id))]
    pub async fn update_subscription(
        &self,
        id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<Subscription, BillingError> {
        if patch.is_empty() {
            return Err(BillingError::NoChanges);
        }

        let current = self.get_subscription(id).await?;
        let now = self.clock.now();
        let mut update = UpdateSubscription::from(&current);

        let status_change = patch.status.filter(|s| *s != current.status);
        if let Some(status) = status_change {
            if status.is_live() && !current.status.is_live() {
                self.ensure_no_other_live(&current, now).await?;
            }
            update.status = status.as_str().to_string();
            if status == SubscriptionStatus::Cancelled && current.cancelled_date.is_none() {
                update.cancelled_date = Some(now);
            }
        }
        if let Some(auto_renew) = patch.auto_renew {
            update.auto_renew = auto_renew;
        }
        if let Some(cancel_at_period_end) = patch.cancel_at_period_end {
            update.cancel_at_period_end = cancel_at_period_end;
        }
        if let Some(payment_id) = patch.payment_id {
            update.payment_id = Some(payment_id.0);
        }

        let updated = self.persist(id, update).await?;

        if let Some(status) = status_change {
            self.emit(SubscriptionEventKind::StatusChanged(status), &updated, now)
                .await;
        }

        Ok(updated)
    }

    /// Cancel now, or at the end of the current period when `defer_to_period_end`
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn cancel_subscription(
        &self,
        id: SubscriptionId,
        defer_to_period_end: bool,
    ) -> Result<Subscription, BillingError> {
        let current = self.get_subscription(id).await?;
        match current.status {
            SubscriptionStatus::Cancelled => return Err(BillingError::AlreadyCancelled),
            SubscriptionStatus::Expired => return Err(BillingError::AlreadyExpired),
            _ => {}
        }

        let now = self.clock.now();
        let mut update = UpdateSubscription::from(&current);
        update.auto_renew = false;

        if defer_to_period_end {
            if current.cancel_at_period_end {
                return Err(BillingError::AlreadyCancelled);
            }
            if !current.status.is_live() {
                return Err(BillingError::InvalidStateTransition {
                    from: current.status,
                    action: "schedule cancellation of",
                });
            }
            update.cancel_at_period_end = true;

            let updated = self.persist(id, update).await?;
            tracing::info!(end_date = %updated.end_date, "cancellation scheduled");
            self.emit(SubscriptionEventKind::CancelScheduled, &updated, now)
                .await;
            return Ok(updated);
        }

        update.status = SubscriptionStatus::Cancelled.as_str().to_string();
        update.cancel_at_period_end = false;
        update.cancelled_date = current.cancelled_date.or(Some(now));

        let updated = self.persist(id, update).await?;
        tracing::info!("subscription cancelled");
        self.emit(
            SubscriptionEventKind::StatusChanged(SubscriptionStatus::Cancelled),
            &updated,
            now,
        )
        .await;

        Ok(updated)
    }

    /// Extend a subscription by one billing cycle.
    ///
    /// The new period starts at the later of the current end date and now,
    /// so early renewals keep their remaining paid time and late renewals
    /// are not backdated.
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn renew_subscription(
        &self,
        id: SubscriptionId,
        payment_id: Option<PaymentId>,
    ) -> Result<Subscription, BillingError> {
        let current = self.get_subscription(id).await?;
        if matches!(
            current.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            return Err(BillingError::InvalidStateTransition {
                from: current.status,
                action: "renew",
            });
        }

        let now = self.clock.now();
        if !current.is_live_at(now) {
            self.ensure_no_other_live(&current, now).await?;
        }

        let start_date = current.end_date.max(now);
        let end_date = advance(current.billing_cycle, start_date)?;

        let mut update = UpdateSubscription::from(&current);
        update.status = SubscriptionStatus::Active.as_str().to_string();
        update.start_date = start_date;
        update.end_date = end_date;
        update.cancel_at_period_end = false;
        update.cancelled_date = None;
        update.renewal_attempts = current.renewal_attempts.saturating_add(1);
        update.last_renewal_attempt = Some(now);
        if let Some(payment_id) = payment_id {
            update.payment_id = Some(payment_id.0);
        }

        let updated = self.persist(id, update).await?;
        tracing::info!(
            start_date = %updated.start_date,
            end_date = %updated.end_date,
            attempts = updated.renewal_attempts,
            "subscription renewed"
        );
        self.emit(SubscriptionEventKind::Renewed, &updated, now).await;

        Ok(updated)
    }

    /// The user's live subscription, if any.
    ///
    /// More than one live subscription violates the storage invariant; the
    /// one ending last wins and the inconsistency is logged.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_active_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, BillingError> {
        let now = self.clock.now();
        let rows = self.subscriptions.find_live_by_user_id(user_id.0, now).await?;

        let mut live = rows
            .into_iter()
            .map(Subscription::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if live.len() > 1 {
            tracing::warn!(
                count = live.len(),
                "user has more than one live subscription, using the one ending last"
            );
        }

        live.sort_by(|a, b| {
            b.end_date
                .cmp(&a.end_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(live.into_iter().next())
    }

    /// Get a subscription by ID
    pub async fn get_subscription(&self, id: SubscriptionId) -> Result<Subscription, BillingError> {
        let row = self
            .subscriptions
            .find_by_id(id.0)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;
        Ok(Subscription::try_from(row)?)
    }

    async fn ensure_no_other_live(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        let others = self
            .subscriptions
            .find_live_by_user_id(subscription.user_id.0, now)
            .await?;
        if others.iter().any(|row| row.id != subscription.id.0) {
            return Err(BillingError::DuplicateSubscription);
        }
        Ok(())
    }

    async fn persist(
        &self,
        id: SubscriptionId,
        update: UpdateSubscription,
    ) -> Result<Subscription, BillingError> {
        let row = match self.subscriptions.update(id.0, update).await {
            Ok(row) => row,
            Err(DbError::NotFound) => return Err(BillingError::SubscriptionNotFound),
            Err(e) => return Err(e.into()),
        };
        Ok(Subscription::try_from(row)?)
    }

    async fn emit(&self, kind: SubscriptionEventKind, subscription: &Subscription, at: DateTime<Utc>) {
        let event = LifecycleEvent::new(kind, subscription, at);
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(
                event = %event.name(),
                subscription_id = %subscription.id,
                error = %e,
                "failed to emit lifecycle event"
            );
        }
    }
}

fn advance(cycle: BillingCycle, from: DateTime<Utc>) -> Result<DateTime<Utc>, BillingError> {
    cycle.advance(from).ok_or_else(out_of_range)
}

fn out_of_range() -> BillingError {
    BillingError::Validation("date out of supported range".to_string())
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patch() {
        assert!(SubscriptionPatch::default().is_empty());
        assert!(!SubscriptionPatch {
            auto_renew: Some(false),
            ..Default::default()
        }
        .is_empty());
    }
}

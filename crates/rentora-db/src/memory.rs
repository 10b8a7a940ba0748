//! In-memory repositories
//!
//! `MemoryStore` implements every repository trait over `DashMap`s. It backs
//! the engine's tests and local runs without PostgreSQL, and keeps the same
//! atomicity guarantees as the SQL implementations: counter increments and
//! window resets happen under the entry lock, and live-subscription creation
//! is serialized.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rentora_types::{SubscriptionStatus, UsageCounter};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::*;
use crate::repo::*;

#[derive(Debug, Clone)]
struct PropertyRecord {
    owner_id: Uuid,
    is_boosted: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct VisitRecord {
    tenant_id: Uuid,
    created_at: DateTime<Utc>,
}

/// In-memory implementation of all repositories
#[derive(Default, Clone)]
pub struct MemoryStore {
    plans: Arc<DashMap<Uuid, PlanRow>>,
    subscriptions: Arc<DashMap<Uuid, SubscriptionRow>>,
    usage_logs: Arc<DashMap<Uuid, UsageLogRow>>,
    idempotency: Arc<DashMap<(Uuid, String), Uuid>>,
    users: Arc<DashMap<Uuid, UserRow>>,
    properties: Arc<DashMap<Uuid, PropertyRecord>>,
    visits: Arc<DashMap<Uuid, VisitRecord>>,
    events: Arc<DashMap<Uuid, SubscriptionEventRow>>,
    create_guard: Arc<Mutex<()>>,
}

fn is_live(row: &SubscriptionRow, now: DateTime<Utc>) -> bool {
    (row.status == SubscriptionStatus::Trial.as_str()
        || row.status == SubscriptionStatus::Active.as_str())
        && row.end_date > now
}

fn counter_mut(row: &mut SubscriptionRow, counter: UsageCounter) -> &mut i64 {
    match counter {
        UsageCounter::Properties => &mut row.properties_used,
        UsageCounter::Visits => &mut row.visits_used_this_month,
        UsageCounter::Media => &mut row.media_used_this_month,
        UsageCounter::Amenities => &mut row.amenities_used_this_month,
        UsageCounter::Boosts => &mut row.boosts_used_this_month,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a plan
    pub fn insert_plan(&self, plan: PlanRow) {
        self.plans.insert(plan.id, plan);
    }

    /// Insert or replace a user
    pub fn insert_user(&self, user: UserRow) {
        self.users.insert(user.id, user);
    }

    /// Insert a subscription row as-is, bypassing the live guard
    pub fn insert_subscription(&self, sub: SubscriptionRow) {
        self.subscriptions.insert(sub.id, sub);
    }

    /// Record a property listed by `owner_id`
    pub fn add_property(&self, owner_id: Uuid, is_boosted: bool, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.properties.insert(
            id,
            PropertyRecord {
                owner_id,
                is_boosted,
                created_at,
            },
        );
        id
    }

    /// Record a visit requested by `tenant_id`
    pub fn add_visit(&self, tenant_id: Uuid, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.visits.insert(
            id,
            VisitRecord {
                tenant_id,
                created_at,
            },
        );
        id
    }

    /// All usage log rows for a user, oldest first
    pub fn usage_logs_for(&self, user_id: Uuid) -> Vec<UsageLogRow> {
        let mut rows: Vec<_> = self
            .usage_logs
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows
    }

    /// All subscriptions for a user, any status
    pub fn subscriptions_for(&self, user_id: Uuid) -> Vec<SubscriptionRow> {
        self.subscriptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        Ok(self.plans.get(&id).map(|r| r.value().clone()))
    }

    async fn find_free(&self) -> DbResult<Option<PlanRow>> {
        Ok(self
            .plans
            .iter()
            .filter(|r| r.is_free && r.is_active)
            .min_by_key(|r| r.created_at)
            .map(|r| r.value().clone()))
    }

    async fn list_active(&self) -> DbResult<Vec<PlanRow>> {
        let mut plans: Vec<_> = self
            .plans
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.value().clone())
            .collect();
        plans.sort_by(|a, b| (a.price_cents, &a.name).cmp(&(b.price_cents, &b.name)));
        Ok(plans)
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.subscriptions.get(&id).map(|r| r.value().clone()))
    }

    async fn find_live_by_user_id(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let mut subs: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|r| r.user_id == user_id && is_live(r.value(), now))
            .map(|r| r.value().clone())
            .collect();
        subs.sort_by(|a, b| {
            b.end_date
                .cmp(&a.end_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(subs)
    }

    async fn create_if_no_live(
        &self,
        sub: CreateSubscription,
        now: DateTime<Utc>,
    ) -> DbResult<SubscriptionRow> {
        let _guard = self.create_guard.lock().unwrap_or_else(|e| e.into_inner());

        let has_live = self
            .subscriptions
            .iter()
            .any(|r| r.user_id == sub.user_id && is_live(r.value(), now));
        if has_live {
            return Err(DbError::Conflict(format!(
                "user {} already has a live subscription",
                sub.user_id
            )));
        }

        let created_at = now;
        let row = SubscriptionRow {
            id: sub.id,
            user_id: sub.user_id,
            plan_id: sub.plan_id,
            payment_id: sub.payment_id,
            price_cents: sub.price_cents,
            currency: sub.currency,
            billing_cycle: sub.billing_cycle,
            start_date: sub.start_date,
            end_date: sub.end_date,
            trial_end_date: sub.trial_end_date,
            cancelled_date: None,
            status: sub.status,
            cancel_at_period_end: false,
            auto_renew: sub.auto_renew,
            renewal_attempts: 0,
            last_renewal_attempt: None,
            properties_used: 0,
            visits_used_this_month: 0,
            media_used_this_month: 0,
            amenities_used_this_month: 0,
            boosts_used_this_month: 0,
            last_usage_reset: sub.last_usage_reset,
            next_usage_reset: sub.next_usage_reset,
            created_at,
            updated_at: created_at,
        };
        self.subscriptions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, update: UpdateSubscription) -> DbResult<SubscriptionRow> {
        let mut row = self.subscriptions.get_mut(&id).ok_or(DbError::NotFound)?;
        row.status = update.status;
        row.payment_id = update.payment_id;
        row.start_date = update.start_date;
        row.end_date = update.end_date;
        row.cancelled_date = update.cancelled_date;
        row.cancel_at_period_end = update.cancel_at_period_end;
        row.auto_renew = update.auto_renew;
        row.renewal_attempts = update.renewal_attempts;
        row.last_renewal_attempt = update.last_renewal_attempt;
        row.updated_at = Utc::now();
        Ok(row.value().clone())
    }

    async fn increment_usage(
        &self,
        id: Uuid,
        counter: UsageCounter,
        count: i64,
        ceiling: Option<i64>,
    ) -> DbResult<Option<i64>> {
        let Some(mut row) = self.subscriptions.get_mut(&id) else {
            return Ok(None);
        };
        let value = counter_mut(&mut row, counter);
        let next = value
            .checked_add(count)
            .ok_or_else(|| DbError::OutOfRange(format!("{counter:?} counter overflow")))?;
        if ceiling.is_some_and(|max| next > max) {
            return Ok(None);
        }
        *value = next;
        row.updated_at = Utc::now();
        Ok(Some(next))
    }

    async fn reset_usage_window(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(mut row) = self.subscriptions.get_mut(&id) else {
            return Ok(false);
        };
        if row.next_usage_reset > now {
            return Ok(false);
        }
        for counter in UsageCounter::ALL.iter().filter(|c| c.is_periodic()) {
            *counter_mut(&mut row, *counter) = 0;
        }
        row.last_usage_reset = now;
        row.next_usage_reset = next_reset;
        row.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl UsageLogRepository for MemoryStore {
    async fn append(&self, entry: CreateUsageLog) -> DbResult<UsageLogRow> {
        let row = UsageLogRow {
            id: entry.id,
            subscription_id: entry.subscription_id,
            user_id: entry.user_id,
            feature: entry.feature,
            resource_id: entry.resource_id,
            action: entry.action,
            quantity: entry.quantity,
            was_gated: entry.was_gated,
            gate_type: entry.gate_type,
            override_reason: entry.override_reason,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            metadata: entry.metadata,
            idempotency_key: entry.idempotency_key,
            created_at: entry.created_at,
        };

        let Some(key) = row.idempotency_key.clone() else {
            self.usage_logs.insert(row.id, row.clone());
            return Ok(row);
        };

        // The row lands while the key slot is held, so a lookup by key never
        // sees a claimed key without its entry
        match self.idempotency.entry((row.user_id, key)) {
            Entry::Occupied(_) => Err(DbError::Conflict(
                "usage already recorded for this idempotency key".to_string(),
            )),
            Entry::Vacant(slot) => {
                self.usage_logs.insert(row.id, row.clone());
                slot.insert(row.id);
                Ok(row)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let Some((user_id, key)) = self
            .usage_logs
            .get(&id)
            .map(|r| (r.user_id, r.idempotency_key.clone()))
        else {
            return Err(DbError::NotFound);
        };
        // Free the key before the row goes, so a lookup never finds the key
        // held by an entry that no longer exists
        if let Some(key) = key {
            self.idempotency
                .remove_if(&(user_id, key), |_, claimed| *claimed == id);
        }
        self.usage_logs.remove(&id).ok_or(DbError::NotFound)?;
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<UsageLogRow>> {
        let Some(id) = self
            .idempotency
            .get(&(user_id, key.to_string()))
            .map(|r| *r.value())
        else {
            return Ok(None);
        };
        Ok(self.usage_logs.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_user_in_range(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<UsageLogRow>> {
        Ok(self
            .usage_logs_for(user_id)
            .into_iter()
            .filter(|r| r.created_at >= from && r.created_at <= to)
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl ResourceRepository for MemoryStore {
    async fn count_properties_by_owner(&self, owner_id: Uuid) -> DbResult<i64> {
        Ok(self
            .properties
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .count() as i64)
    }

    async fn count_visits_by_tenant(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<i64> {
        Ok(self
            .visits
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.created_at >= from && r.created_at < to)
            .count() as i64)
    }

    async fn count_boosted_properties_by_owner(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<i64> {
        Ok(self
            .properties
            .iter()
            .filter(|r| {
                r.owner_id == owner_id
                    && r.is_boosted
                    && r.created_at >= from
                    && r.created_at < to
            })
            .count() as i64)
    }
}

#[async_trait]
impl SubscriptionEventRepository for MemoryStore {
    async fn append(&self, event: CreateSubscriptionEvent) -> DbResult<()> {
        let row = SubscriptionEventRow {
            id: event.id,
            subscription_id: event.subscription_id,
            user_id: event.user_id,
            event_type: event.event_type,
            payload: event.payload,
            created_at: event.created_at,
        };
        self.events.insert(row.id, row);
        Ok(())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> DbResult<Vec<SubscriptionEventRow>> {
        let mut events: Vec<_> = self
            .events
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .map(|r| r.value().clone())
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }
}

//! Plans, users and a wired-up billing service over the in-memory store

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rentora_billing_core::{
    BillingConfig, BillingService, BillingStores, EventSink, ManualClock,
};
use rentora_db::{MemoryStore, PlanRow, UserRow};
use rentora_types::{PlanId, PlanLimits, UserId};
use uuid::Uuid;

use super::test_doubles::RecordingEventSink;

/// Fixed UTC instant
pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

/// Active monthly plan with the given limits
pub fn plan_row(name: &str, limits: PlanLimits, trial_days: i32) -> PlanRow {
    let created = at(2023, 1, 1);
    PlanRow {
        id: Uuid::new_v4(),
        name: name.to_string(),
        display_name: name.to_uppercase(),
        is_active: true,
        is_free: false,
        price_cents: 2_900,
        currency: "USD".to_string(),
        billing_cycle: "MONTHLY".to_string(),
        trial_days,
        max_properties: limits.max_properties,
        max_visits_per_month: limits.max_visits_per_month,
        max_media_per_property: limits.max_media_per_property,
        max_amenities_per_property: limits.max_amenities_per_property,
        max_boosts_per_month: limits.max_boosts_per_month,
        allow_boost: limits.allow_boost,
        allow_premium_support: limits.allow_premium_support,
        allow_advanced_analytics: limits.allow_advanced_analytics,
        allow_bulk_operations: limits.allow_bulk_operations,
        created_at: created,
        updated_at: created,
    }
}

/// Active user
pub fn user_row() -> UserRow {
    let id = Uuid::new_v4();
    UserRow {
        id,
        email: format!("user-{id}@example.com"),
        is_active: true,
        created_at: at(2023, 1, 1),
    }
}

/// Limits of a typical paid plan
pub fn pro_limits() -> PlanLimits {
    PlanLimits {
        max_properties: 25,
        max_visits_per_month: 10,
        max_media_per_property: 30,
        max_amenities_per_property: 40,
        max_boosts_per_month: 5,
        allow_boost: true,
        allow_premium_support: true,
        allow_advanced_analytics: false,
        allow_bulk_operations: false,
    }
}

/// Billing service over a `MemoryStore` with a manual clock
pub struct Harness {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingEventSink>,
    pub billing: BillingService,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        let store = MemoryStore::new();
        let events = Arc::new(RecordingEventSink::default());
        Self::build(store.clone(), BillingStores::from(store), now, events)
    }

    /// Harness whose stores may be partially replaced
    pub fn with_stores(
        store: MemoryStore,
        stores: BillingStores,
        now: DateTime<Utc>,
        events: Arc<RecordingEventSink>,
    ) -> Self {
        Self::build(store, stores, now, events)
    }

    fn build(
        store: MemoryStore,
        stores: BillingStores,
        now: DateTime<Utc>,
        events: Arc<RecordingEventSink>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let sink: Arc<dyn EventSink> = events.clone();
        let billing = BillingService::with_parts(stores, BillingConfig::default(), clock.clone(), sink);
        Self {
            store,
            clock,
            events,
            billing,
        }
    }

    /// Insert an active user
    pub fn user(&self) -> UserId {
        let row = user_row();
        let id = UserId(row.id);
        self.store.insert_user(row);
        id
    }

    /// Insert a plan and return its id
    pub fn plan(&self, row: PlanRow) -> PlanId {
        let id = PlanId(row.id);
        self.store.insert_plan(row);
        id
    }

    /// Insert the designated free plan
    pub fn free_plan(&self, limits: PlanLimits) -> PlanId {
        let mut row = plan_row("free", limits, 0);
        row.is_free = true;
        row.price_cents = 0;
        self.plan(row)
    }
}

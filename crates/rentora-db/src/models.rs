//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use rentora_types::{
    BillingCycle, Feature, GateType, PaymentId, Plan, PlanId, PlanLimits, Subscription,
    SubscriptionId, SubscriptionStatus, UsageCounters, UsageLogEntry, UsageLogId, UserId,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::DbError;

/// Plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_free: bool,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: String,
    pub trial_days: i32,
    pub max_properties: i64,
    pub max_visits_per_month: i64,
    pub max_media_per_property: i64,
    pub max_amenities_per_property: i64,
    pub max_boosts_per_month: i64,
    pub allow_boost: bool,
    pub allow_premium_support: bool,
    pub allow_advanced_analytics: bool,
    pub allow_bulk_operations: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
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
    pub cancelled_date: Option<DateTime<Utc>>,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub auto_renew: bool,
    pub renewal_attempts: i32,
    pub last_renewal_attempt: Option<DateTime<Utc>>,
    pub properties_used: i64,
    pub visits_used_this_month: i64,
    pub media_used_this_month: i64,
    pub amenities_used_this_month: i64,
    pub boosts_used_this_month: i64,
    pub last_usage_reset: DateTime<Utc>,
    pub next_usage_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Usage log row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UsageLogRow {
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

/// User row, as far as the billing engine needs it
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Subscription lifecycle event row
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionEventRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

fn decode<T: std::str::FromStr>(value: &str) -> Result<T, DbError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| DbError::Decode(e.to_string()))
}

// Conversion implementations from Row types to rentora-types domain types

impl TryFrom<PlanRow> for Plan {
    type Error = DbError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PlanId(row.id),
            billing_cycle: decode::<BillingCycle>(&row.billing_cycle)?,
            trial_days: u32::try_from(row.trial_days)
                .map_err(|_| DbError::Decode(format!("negative trial_days on plan {}", row.id)))?,
            name: row.name,
            display_name: row.display_name,
            is_active: row.is_active,
            is_free: row.is_free,
            price_cents: row.price_cents,
            currency: row.currency,
            limits: PlanLimits {
                max_properties: row.max_properties,
                max_visits_per_month: row.max_visits_per_month,
                max_media_per_property: row.max_media_per_property,
                max_amenities_per_property: row.max_amenities_per_property,
                max_boosts_per_month: row.max_boosts_per_month,
                allow_boost: row.allow_boost,
                allow_premium_support: row.allow_premium_support,
                allow_advanced_analytics: row.allow_advanced_analytics,
                allow_bulk_operations: row.allow_bulk_operations,
            },
        })
    }
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubscriptionId(row.id),
            user_id: UserId(row.user_id),
            plan_id: PlanId(row.plan_id),
            payment_id: row.payment_id.map(PaymentId),
            price_cents: row.price_cents,
            billing_cycle: decode::<BillingCycle>(&row.billing_cycle)?,
            status: decode::<SubscriptionStatus>(&row.status)?,
            currency: row.currency,
            start_date: row.start_date,
            end_date: row.end_date,
            trial_end_date: row.trial_end_date,
            cancelled_date: row.cancelled_date,
            cancel_at_period_end: row.cancel_at_period_end,
            auto_renew: row.auto_renew,
            renewal_attempts: row.renewal_attempts,
            last_renewal_attempt: row.last_renewal_attempt,
            usage: UsageCounters {
                properties_used: row.properties_used,
                visits_used_this_month: row.visits_used_this_month,
                media_used_this_month: row.media_used_this_month,
                amenities_used_this_month: row.amenities_used_this_month,
                boosts_used_this_month: row.boosts_used_this_month,
            },
            last_usage_reset: row.last_usage_reset,
            next_usage_reset: row.next_usage_reset,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<UsageLogRow> for UsageLogEntry {
    type Error = DbError;

    fn try_from(row: UsageLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UsageLogId(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId),
            user_id: UserId(row.user_id),
            feature: decode::<Feature>(&row.feature)?,
            gate_type: row
                .gate_type
                .as_deref()
                .map(decode::<GateType>)
                .transpose()?,
            resource_id: row.resource_id,
            action: row.action,
            quantity: row.quantity,
            was_gated: row.was_gated,
            override_reason: row.override_reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata: row.metadata,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

impl UserRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }
}

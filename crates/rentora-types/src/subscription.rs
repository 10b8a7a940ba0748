//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BillingCycle, ParseEnumError, PaymentId, PlanId, SubscriptionId, UsageCounter, UserId};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// In trial period
    Trial,
    /// Subscription is active
    Active,
    /// Subscription was cancelled
    Cancelled,
    /// Period elapsed without renewal
    Expired,
    /// Payment is past due
    PastDue,
    /// Suspended by an administrator
    Suspended,
}

impl SubscriptionStatus {
    /// All statuses
    pub const ALL: [Self; 6] = [
        Self::Trial,
        Self::Active,
        Self::Cancelled,
        Self::Expired,
        Self::PastDue,
        Self::Suspended,
    ];

    /// TRIAL and ACTIVE are the only states that grant plan usage
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }

    /// Get the status wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
            Self::PastDue => "PAST_DUE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("subscription status", s))
    }
}

/// Usage counters stored on a subscription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub properties_used: i64,
    pub visits_used_this_month: i64,
    pub media_used_this_month: i64,
    pub amenities_used_this_month: i64,
    pub boosts_used_this_month: i64,
}

impl UsageCounters {
    /// Read a counter
    pub const fn get(&self, counter: UsageCounter) -> i64 {
        match counter {
            UsageCounter::Properties => self.properties_used,
            UsageCounter::Visits => self.visits_used_this_month,
            UsageCounter::Media => self.media_used_this_month,
            UsageCounter::Amenities => self.amenities_used_this_month,
            UsageCounter::Boosts => self.boosts_used_this_month,
        }
    }

    /// Mutable access to a counter
    pub fn get_mut(&mut self, counter: UsageCounter) -> &mut i64 {
        match counter {
            UsageCounter::Properties => &mut self.properties_used,
            UsageCounter::Visits => &mut self.visits_used_this_month,
            UsageCounter::Media => &mut self.media_used_this_month,
            UsageCounter::Amenities => &mut self.amenities_used_this_month,
            UsageCounter::Boosts => &mut self.boosts_used_this_month,
        }
    }

    /// Zero every periodic counter, keeping the cumulative ones
    pub fn reset_periodic(&mut self) {
        for counter in UsageCounter::ALL {
            if counter.is_periodic() {
                *self.get_mut(counter) = 0;
            }
        }
    }
}

/// A user's time-bounded instance of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub payment_id: Option<PaymentId>,
    /// Price snapshotted at creation, in minor currency units
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub cancelled_date: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub auto_renew: bool,
    pub renewal_attempts: i32,
    pub last_renewal_attempt: Option<DateTime<Utc>>,
    pub usage: UsageCounters,
    pub last_usage_reset: DateTime<Utc>,
    pub next_usage_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Live means TRIAL or ACTIVE with the end date still ahead
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.end_date > now
    }

    /// Whether the periodic usage window has elapsed at `now`
    pub fn usage_window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_usage_reset
    }

    /// Usage of a counter as seen at `now`.
    ///
    /// Periodic counters read as zero once the usage window has elapsed,
    /// even before the stored counters have been reset.
    pub fn usage_at(&self, counter: UsageCounter, now: DateTime<Utc>) -> i64 {
        if counter.is_periodic() && self.usage_window_elapsed(now) {
            0
        } else {
            self.usage.get(counter)
        }
    }
}

/// Lifecycle event kinds emitted by the subscription manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionEventKind {
    Created,
    Renewed,
    CancelScheduled,
    StatusChanged(SubscriptionStatus),
}

impl SubscriptionEventKind {
    /// Event name, e.g. `SUBSCRIPTION_CREATED` or `SUBSCRIPTION_CANCELLED`
    pub fn name(&self) -> String {
        match self {
            Self::Created => "SUBSCRIPTION_CREATED".to_string(),
            Self::Renewed => "SUBSCRIPTION_RENEWED".to_string(),
            Self::CancelScheduled => "SUBSCRIPTION_CANCEL_SCHEDULED".to_string(),
            Self::StatusChanged(status) => format!("SUBSCRIPTION_{status}"),
        }
    }
}

//! Subscription plan types

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlanFlag, PlanId, UsageCounter};

/// Recurring period after which a subscription's end date advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl BillingCycle {
    /// All billing cycles
    pub const ALL: [Self; 5] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Annually,
    ];

    /// Advance `from` by one cycle.
    ///
    /// Month based cycles are calendar aware and clamp to the last day of the
    /// target month (Jan 31 + 1 month = Feb 28/29). Returns `None` only when
    /// the result is outside the representable date range.
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Daily => from.checked_add_signed(Duration::days(1)),
            Self::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Self::Monthly => from.checked_add_months(Months::new(1)),
            Self::Quarterly => from.checked_add_months(Months::new(3)),
            Self::Annually => from.checked_add_months(Months::new(12)),
        }
    }

    /// Wire name of the cycle
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Annually => "ANNUALLY",
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "QUARTERLY" => Ok(Self::Quarterly),
            "ANNUALLY" | "YEARLY" => Ok(Self::Annually),
            _ => Err(ParseEnumError::new("billing cycle", s)),
        }
    }
}

/// Quotas and feature flags granted by a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    /// Cumulative number of properties (not periodic)
    pub max_properties: i64,
    /// Visits per usage window
    pub max_visits_per_month: i64,
    /// Media uploads per property
    pub max_media_per_property: i64,
    /// Amenities per property
    pub max_amenities_per_property: i64,
    /// Boosts per usage window
    pub max_boosts_per_month: i64,
    pub allow_boost: bool,
    pub allow_premium_support: bool,
    pub allow_advanced_analytics: bool,
    pub allow_bulk_operations: bool,
}

impl PlanLimits {
    /// Built-in limits applied when no free plan is configured in the catalog
    pub const FREE_FALLBACK: Self = Self {
        max_properties: 3,
        max_visits_per_month: 5,
        max_media_per_property: 5,
        max_amenities_per_property: 10,
        max_boosts_per_month: 0,
        allow_boost: false,
        allow_premium_support: false,
        allow_advanced_analytics: false,
        allow_bulk_operations: false,
    };

    /// Quota configured for a usage counter
    pub const fn quota(&self, counter: UsageCounter) -> i64 {
        match counter {
            UsageCounter::Properties => self.max_properties,
            UsageCounter::Visits => self.max_visits_per_month,
            UsageCounter::Media => self.max_media_per_property,
            UsageCounter::Amenities => self.max_amenities_per_property,
            UsageCounter::Boosts => self.max_boosts_per_month,
        }
    }

    /// Whether a boolean feature flag is enabled
    pub const fn flag(&self, flag: PlanFlag) -> bool {
        match flag {
            PlanFlag::Boost => self.allow_boost,
            PlanFlag::PremiumSupport => self.allow_premium_support,
            PlanFlag::AdvancedAnalytics => self.allow_advanced_analytics,
            PlanFlag::BulkOperations => self.allow_bulk_operations,
        }
    }
}

/// Subscription plan definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    /// Machine name (e.g. `pro`)
    pub name: String,
    pub display_name: String,
    pub is_active: bool,
    /// Designated fallback plan for users without a subscription
    pub is_free: bool,
    /// Base price in minor currency units
    pub price_cents: i64,
    /// ISO 4217 currency code
    pub currency: String,
    pub billing_cycle: BillingCycle,
    /// Trial length in days, 0 means no trial
    pub trial_days: u32,
    pub limits: PlanLimits,
}

/// Error parsing one of the string-typed enums
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// What was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_keeps_day_of_month() {
        assert_eq!(BillingCycle::Monthly.advance(at(2024, 1, 15)), Some(at(2024, 2, 15)));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        assert_eq!(BillingCycle::Monthly.advance(at(2024, 1, 31)), Some(at(2024, 2, 29)));
        assert_eq!(BillingCycle::Monthly.advance(at(2023, 1, 31)), Some(at(2023, 2, 28)));
        assert_eq!(BillingCycle::Monthly.advance(at(2024, 3, 31)), Some(at(2024, 4, 30)));
    }

    #[test]
    fn test_quarterly_and_annual() {
        assert_eq!(BillingCycle::Quarterly.advance(at(2024, 11, 30)), Some(at(2025, 2, 28)));
        assert_eq!(BillingCycle::Annually.advance(at(2024, 2, 29)), Some(at(2025, 2, 28)));
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(BillingCycle::Daily.advance(at(2024, 12, 31)), Some(at(2025, 1, 1)));
        assert_eq!(BillingCycle::Weekly.advance(at(2024, 2, 26)), Some(at(2024, 3, 4)));
    }

    #[test]
    fn test_billing_cycle_parse() {
        assert_eq!("monthly".parse::<BillingCycle>().unwrap(), BillingCycle::Monthly);
        assert_eq!("YEARLY".parse::<BillingCycle>().unwrap(), BillingCycle::Annually);
        assert!("fortnightly".parse::<BillingCycle>().is_err());
        for cycle in BillingCycle::ALL {
            assert_eq!(cycle.as_str().parse::<BillingCycle>().unwrap(), cycle);
        }
    }

    #[test]
    fn test_fallback_limits() {
        let limits = PlanLimits::FREE_FALLBACK;
        assert_eq!(limits.quota(UsageCounter::Properties), 3);
        assert_eq!(limits.quota(UsageCounter::Visits), 5);
        assert_eq!(limits.quota(UsageCounter::Media), 5);
        assert_eq!(limits.quota(UsageCounter::Amenities), 10);
        assert_eq!(limits.quota(UsageCounter::Boosts), 0);
        assert!(!limits.flag(PlanFlag::PremiumSupport));
        assert!(!limits.flag(PlanFlag::AdvancedAnalytics));
        assert!(!limits.flag(PlanFlag::BulkOperations));
    }
}

//! Gated features and usage-gate decisions

use serde::{Deserialize, Serialize};

use crate::{ParseEnumError, PlanId, SubscriptionId};

/// Features whose use is gated by the subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    PropertyCreate,
    VisitSchedule,
    MediaUpload,
    AmenityAdd,
    BoostProperty,
    SupportTicket,
    AnalyticsAccess,
    BulkOperation,
}

/// Per-subscription usage counter backing a quota feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCounter {
    /// Cumulative, never reset while the subscription is in force
    Properties,
    Visits,
    Media,
    Amenities,
    Boosts,
}

/// Boolean plan capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFlag {
    Boost,
    PremiumSupport,
    AdvancedAnalytics,
    BulkOperations,
}

/// How a feature is gated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureRule {
    /// Counted against a quota. `requires` must also be enabled on the plan.
    Quota {
        counter: UsageCounter,
        requires: Option<PlanFlag>,
    },
    /// Access follows a plan flag; nothing is counted
    Flag(PlanFlag),
}

impl Feature {
    /// All features
    pub const ALL: [Self; 8] = [
        Self::PropertyCreate,
        Self::VisitSchedule,
        Self::MediaUpload,
        Self::AmenityAdd,
        Self::BoostProperty,
        Self::SupportTicket,
        Self::AnalyticsAccess,
        Self::BulkOperation,
    ];

    /// Get the feature wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyCreate => "PROPERTY_CREATE",
            Self::VisitSchedule => "VISIT_SCHEDULE",
            Self::MediaUpload => "MEDIA_UPLOAD",
            Self::AmenityAdd => "AMENITY_ADD",
            Self::BoostProperty => "BOOST_PROPERTY",
            Self::SupportTicket => "SUPPORT_TICKET",
            Self::AnalyticsAccess => "ANALYTICS_ACCESS",
            Self::BulkOperation => "BULK_OPERATION",
        }
    }

    /// Gating rule for this feature
    pub const fn rule(&self) -> FeatureRule {
        match self {
            Self::PropertyCreate => FeatureRule::Quota {
                counter: UsageCounter::Properties,
                requires: None,
            },
            Self::VisitSchedule => FeatureRule::Quota {
                counter: UsageCounter::Visits,
                requires: None,
            },
            Self::MediaUpload => FeatureRule::Quota {
                counter: UsageCounter::Media,
                requires: None,
            },
            Self::AmenityAdd => FeatureRule::Quota {
                counter: UsageCounter::Amenities,
                requires: None,
            },
            Self::BoostProperty => FeatureRule::Quota {
                counter: UsageCounter::Boosts,
                requires: Some(PlanFlag::Boost),
            },
            Self::SupportTicket => FeatureRule::Flag(PlanFlag::PremiumSupport),
            Self::AnalyticsAccess => FeatureRule::Flag(PlanFlag::AdvancedAnalytics),
            Self::BulkOperation => FeatureRule::Flag(PlanFlag::BulkOperations),
        }
    }

    /// Counter incremented when this feature is used, if any
    pub const fn counter(&self) -> Option<UsageCounter> {
        match self.rule() {
            FeatureRule::Quota { counter, .. } => Some(counter),
            FeatureRule::Flag(_) => None,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("feature", s))
    }
}

impl UsageCounter {
    /// All counters
    pub const ALL: [Self; 5] = [
        Self::Properties,
        Self::Visits,
        Self::Media,
        Self::Amenities,
        Self::Boosts,
    ];

    /// Whether the counter is zeroed at each usage window reset
    pub const fn is_periodic(&self) -> bool {
        !matches!(self, Self::Properties)
    }
}

/// Gate classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateType {
    /// Early warning, at most 20% of the quota left
    Soft,
    /// The request would exceed the quota
    Hard,
}

impl GateType {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
        }
    }
}

impl std::fmt::Display for GateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOFT" => Ok(Self::Soft),
            "HARD" => Ok(Self::Hard),
            _ => Err(ParseEnumError::new("gate type", s)),
        }
    }
}

/// Soft gate threshold: remaining headroom at or below this percent of the quota
pub const SOFT_GATE_PERCENT: i64 = 20;

/// Outcome of comparing usage against a quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaVerdict {
    pub remaining: i64,
    pub is_gated: bool,
    pub gate_type: Option<GateType>,
}

/// Compare `current_usage` against `max_limit` for a request of `required_count`.
///
/// A zero quota disables the feature: any request is hard-gated and the soft
/// threshold is never evaluated.
pub fn evaluate_quota(current_usage: i64, max_limit: i64, required_count: i64) -> QuotaVerdict {
    let remaining = max_limit.saturating_sub(current_usage);
    let is_gated = remaining < required_count;

    let gate_type = if is_gated {
        Some(GateType::Hard)
    } else if max_limit > 0
        && remaining.saturating_mul(100) <= max_limit.saturating_mul(SOFT_GATE_PERCENT)
    {
        Some(GateType::Soft)
    } else {
        None
    };

    QuotaVerdict {
        remaining,
        is_gated,
        gate_type,
    }
}

/// Result of a usage-gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDecision {
    pub feature: Feature,
    pub has_access: bool,
    pub is_gated: bool,
    pub gate_type: Option<GateType>,
    pub current_usage: i64,
    /// `None` means the feature is not quota limited on this plan
    pub max_limit: Option<i64>,
    /// `None` when `max_limit` is `None`
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<SubscriptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_parse() {
        assert_eq!("PROPERTY_CREATE".parse::<Feature>().unwrap(), Feature::PropertyCreate);
        assert_eq!("boost_property".parse::<Feature>().unwrap(), Feature::BoostProperty);
        assert!("TELEPORT".parse::<Feature>().is_err());
    }

    #[test]
    fn test_every_quota_counter_is_reachable() {
        for counter in UsageCounter::ALL {
            assert!(
                Feature::ALL.iter().any(|f| f.counter() == Some(counter)),
                "no feature maps to {counter:?}"
            );
        }
    }

    #[test]
    fn test_flag_features_have_no_counter() {
        assert_eq!(Feature::SupportTicket.counter(), None);
        assert_eq!(Feature::AnalyticsAccess.counter(), None);
        assert_eq!(Feature::BulkOperation.counter(), None);
    }

    #[test]
    fn test_only_properties_is_cumulative() {
        assert!(!UsageCounter::Properties.is_periodic());
        assert!(UsageCounter::Visits.is_periodic());
        assert!(UsageCounter::Boosts.is_periodic());
    }

    #[test]
    fn test_quota_headroom_is_open() {
        let verdict = evaluate_quota(0, 2, 1);
        assert_eq!(verdict.remaining, 2);
        assert!(!verdict.is_gated);
        assert_eq!(verdict.gate_type, None);
    }

    #[test]
    fn test_soft_gate_at_twenty_percent() {
        let verdict = evaluate_quota(8, 10, 1);
        assert_eq!(verdict.remaining, 2);
        assert!(!verdict.is_gated);
        assert_eq!(verdict.gate_type, Some(GateType::Soft));

        let verdict = evaluate_quota(7, 10, 1);
        assert_eq!(verdict.gate_type, None);
    }

    #[test]
    fn test_hard_gate_when_request_exceeds_remaining() {
        let verdict = evaluate_quota(8, 10, 3);
        assert!(verdict.is_gated);
        assert_eq!(verdict.gate_type, Some(GateType::Hard));

        let verdict = evaluate_quota(2, 2, 1);
        assert_eq!(verdict.remaining, 0);
        assert_eq!(verdict.gate_type, Some(GateType::Hard));
    }

    #[test]
    fn test_zero_quota_is_disabled() {
        let verdict = evaluate_quota(0, 0, 1);
        assert_eq!(verdict.remaining, 0);
        assert!(verdict.is_gated);
        assert_eq!(verdict.gate_type, Some(GateType::Hard));
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let decision = UsageDecision {
            feature: Feature::VisitSchedule,
            has_access: true,
            is_gated: false,
            gate_type: Some(GateType::Soft),
            current_usage: 8,
            max_limit: Some(10),
            remaining: Some(2),
            subscription_id: None,
            plan_id: None,
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["hasAccess"], true);
        assert_eq!(json["gateType"], "SOFT");
        assert_eq!(json["maxLimit"], 10);
        assert!(json.get("subscriptionId").is_none());
    }
}

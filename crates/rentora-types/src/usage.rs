//! Usage audit log and statistics types

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Feature, GateType, SubscriptionId, UsageLogId, UserId};

/// Append-only record of a usage event and the gate decision in effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub id: UsageLogId,
    /// `None` for free-tier usage
    pub subscription_id: Option<SubscriptionId>,
    pub user_id: UserId,
    pub feature: Feature,
    /// Resource the usage applies to (property, visit, ...)
    pub resource_id: Option<Uuid>,
    pub action: String,
    pub quantity: i64,
    pub was_gated: bool,
    pub gate_type: Option<GateType>,
    /// Set when an override bypassed a hard gate
    pub override_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated usage over a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Sum of recorded quantities
    pub total_usage: i64,
    pub by_feature: BTreeMap<Feature, i64>,
    pub by_day: BTreeMap<NaiveDate, i64>,
    /// Number of entries recorded past a hard gate via override
    pub gated_actions: i64,
}

impl UsageStats {
    /// Aggregate log entries into statistics for `[start_date, end_date]`
    pub fn aggregate<'a>(
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        entries: impl IntoIterator<Item = &'a UsageLogEntry>,
    ) -> Self {
        let mut stats = Self {
            start_date,
            end_date,
            total_usage: 0,
            by_feature: BTreeMap::new(),
            by_day: BTreeMap::new(),
            gated_actions: 0,
        };

        for entry in entries {
            if entry.created_at < start_date || entry.created_at > end_date {
                continue;
            }
            stats.total_usage += entry.quantity;
            *stats.by_feature.entry(entry.feature).or_default() += entry.quantity;
            *stats.by_day.entry(entry.created_at.date_naive()).or_default() += entry.quantity;
            if entry.was_gated {
                stats.gated_actions += 1;
            }
        }

        stats
    }
}

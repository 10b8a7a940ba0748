//! Shared handler utilities
//!
//! Input parsing, ownership checks and metrics helpers used across handlers.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rentora_types::{Feature, Subscription, SubscriptionId, UserId};

use crate::error::ApiError;

// ============================================================================
// Input Validation
// ============================================================================

/// Maximum length for user-provided strings
const MAX_STRING_LEN: usize = 256;

/// Validate a user-provided string is within safe bounds.
pub fn validate_string_length(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.len() > MAX_STRING_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field_name} too long (max {MAX_STRING_LEN} chars)"
        )));
    }
    Ok(())
}

/// Parse a feature name from the closed set of gated features.
pub fn parse_feature(raw: &str) -> Result<Feature, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown feature: {raw}")))
}

/// Parse a subscription id from a path segment.
pub fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, ApiError> {
    SubscriptionId::parse(raw)
        .map_err(|_| ApiError::BadRequest("invalid subscription id format".into()))
}

/// Which end of a day a bare `YYYY-MM-DD` date stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBound {
    Start,
    End,
}

/// Parse an RFC 3339 timestamp or a bare calendar date.
pub fn parse_date(raw: &str, field_name: &str, bound: DayBound) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!(
            "{field_name} must be an RFC 3339 timestamp or YYYY-MM-DD date"
        ))
    })?;

    let time = match bound {
        DayBound::Start => NaiveTime::MIN,
        DayBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

/// Reject access to a subscription the caller does not own.
pub fn ensure_owner(subscription: &Subscription, user_id: UserId) -> Result<(), ApiError> {
    if subscription.user_id != user_id {
        return Err(ApiError::Forbidden(
            "subscription belongs to another user".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record HTTP operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "billing_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

// ============================================================================
// Tests
// ============================================================================

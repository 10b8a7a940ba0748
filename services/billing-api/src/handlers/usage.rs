//! Usage gating handlers

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rentora_billing_core::{BillingError, RecordUsage, UsageReceipt};
use rentora_types::{Feature, UsageDecision, UsageStats};

use super::shared::{parse_date, parse_feature, record_op_duration, validate_string_length, DayBound};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{AuthUser, RequestMeta};
use crate::state::AppState;

/// Header alternative to the `idempotencyKey` body field
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckUsageQuery {
    pub feature: String,
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageRequest {
    pub feature: String,
    pub resource_id: Option<uuid::Uuid>,
    pub action: Option<String>,
    pub count: Option<i64>,
    #[serde(rename = "override", default)]
    pub override_gate: bool,
    pub override_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordUsageResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub receipt: UsageReceipt,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn record_gated(feature: Feature, gate: &'static str) {
    metrics::counter!(
        "billing_usage_gated_total",
        "feature" => feature.as_str(),
        "gate" => gate
    )
    .increment(1);
}

fn record_decision(decision: &UsageDecision) {
    if let Some(gate) = decision.gate_type {
        record_gated(decision.feature, gate.as_str());
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/subscriptions/usage/check
#[instrument(skip(state, query), fields(user_id = %auth.user_id, feature = %query.feature))]
pub async fn check_usage(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CheckUsageQuery>,
) -> ApiResult<Json<UsageDecision>> {
    let start = Instant::now();

    let feature = parse_feature(&query.feature)?;
    let result = state
        .billing
        .check_usage_limit(auth.user_id, feature, query.count.unwrap_or(1))
        .await;
    record_op_duration("check_usage", start, result.is_ok());

    let decision = result?;
    record_decision(&decision);

    Ok(Json(decision))
}

/// POST /api/v1/subscriptions/usage/record
/// Hot path - every gated action in the platform lands here
#[instrument(skip(state, meta, headers, req), fields(user_id = %auth.user_id, feature = %req.feature))]
pub async fn record_usage(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    headers: HeaderMap,
    Json(req): Json<RecordUsageRequest>,
) -> ApiResult<Json<RecordUsageResponse>> {
    let start = Instant::now();

    let feature = parse_feature(&req.feature)?;
    let idempotency_key = req.idempotency_key.or_else(|| {
        headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let mut usage = RecordUsage::new(auth.user_id, feature)
        .with_request_meta(meta.ip_address, meta.user_agent);
    if let Some(action) = req.action {
        validate_string_length(&action, "action")?;
        usage = usage.with_action(action);
    }
    if let Some(count) = req.count {
        usage = usage.with_count(count);
    }
    if let Some(resource_id) = req.resource_id {
        usage = usage.with_resource(resource_id);
    }
    if req.override_gate {
        let reason = req.override_reason.unwrap_or_default();
        validate_string_length(&reason, "overrideReason")?;
        tracing::warn!(reason = %reason, "usage gate overridden");
        usage = usage.overriding(reason);
    }
    if let Some(metadata) = req.metadata {
        usage = usage.with_metadata(metadata);
    }
    if let Some(key) = idempotency_key {
        usage = usage.with_idempotency_key(key);
    }
    let count = usage.count;

    let result = state.billing.record_usage(usage).await;
    record_op_duration("record_usage", start, result.is_ok());

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(err @ BillingError::UsageLimitExceeded { .. }) => {
            record_gated(feature, "HARD");
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if !receipt.replayed {
        record_decision(&receipt.decision);
        metrics::counter!("billing_usage_recorded_total", "feature" => feature.as_str())
            .increment(count.unsigned_abs());
    }

    Ok(Json(RecordUsageResponse {
        success: true,
        message: "Usage recorded",
        receipt,
    }))
}

/// GET /api/v1/subscriptions/usage/stats
#[instrument(skip(state, query), fields(user_id = %auth.user_id))]
pub async fn usage_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UsageStatsQuery>,
) -> ApiResult<Json<UsageStats>> {
    let start = Instant::now();

    let from = query
        .start_date
        .as_deref()
        .map(|raw| parse_date(raw, "startDate", DayBound::Start))
        .transpose()?;
    let to = query
        .end_date
        .as_deref()
        .map(|raw| parse_date(raw, "endDate", DayBound::End))
        .transpose()?;

    let result = state.billing.usage_stats(auth.user_id, from, to).await;
    record_op_duration("usage_stats", start, result.is_ok());

    Ok(Json(result?))
}

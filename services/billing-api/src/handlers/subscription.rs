//! Subscription handlers

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use rentora_billing_core::{CreateSubscriptionOptions, SubscriptionPatch};
use rentora_types::{PaymentId, PlanId, Subscription, SubscriptionStatus};

use super::shared::{
    ensure_owner, parse_date, parse_subscription_id, record_op_duration, validate_string_length,
    DayBound,
};
use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
    pub payment_id: Option<String>,
    /// Overrides the plan price, in minor currency units
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub start_date: Option<String>,
    pub trial_days: Option<u32>,
    pub auto_renew: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub status: Option<String>,
    pub auto_renew: Option<bool>,
    pub cancel_at_period_end: Option<bool>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    pub cancel_at_period_end: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewSubscriptionRequest {
    pub payment_id: Option<String>,
}

fn parse_payment_id(raw: &str) -> Result<PaymentId, ApiError> {
    PaymentId::parse(raw).map_err(|_| ApiError::BadRequest("invalid payment id format".into()))
}

impl CreateSubscriptionRequest {
    fn into_parts(self) -> Result<(PlanId, CreateSubscriptionOptions), ApiError> {
        let plan_id = PlanId::parse(&self.plan_id)
            .map_err(|_| ApiError::BadRequest("invalid plan id format".into()))?;

        if let Some(currency) = &self.currency {
            validate_string_length(currency, "currency")?;
        }

        let billing_cycle = self
            .billing_cycle
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: rentora_types::ParseEnumError| ApiError::BadRequest(e.to_string()))?;

        let start_date = self
            .start_date
            .as_deref()
            .map(|raw| parse_date(raw, "startDate", DayBound::Start))
            .transpose()?;

        let options = CreateSubscriptionOptions {
            payment_id: self.payment_id.as_deref().map(parse_payment_id).transpose()?,
            price_cents: self.price,
            currency: self.currency,
            billing_cycle,
            start_date,
            trial_days: self.trial_days,
            auto_renew: self.auto_renew,
        };

        Ok((plan_id, options))
    }
}

impl TryFrom<UpdateSubscriptionRequest> for SubscriptionPatch {
    type Error = ApiError;

    fn try_from(req: UpdateSubscriptionRequest) -> Result<Self, Self::Error> {
        let status = req
            .status
            .as_deref()
            .map(str::parse::<SubscriptionStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        Ok(Self {
            status,
            auto_renew: req.auto_renew,
            cancel_at_period_end: req.cancel_at_period_end,
            payment_id: req.payment_id.as_deref().map(parse_payment_id).transpose()?,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/subscriptions
#[instrument(skip(state, req), fields(user_id = %auth.user_id, plan_id = %req.plan_id))]
pub async fn create_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let start = Instant::now();

    let (plan_id, options) = req.into_parts()?;
    let result = state
        .billing
        .create_subscription(auth.user_id, plan_id, options)
        .await;
    record_op_duration("create_subscription", start, result.is_ok());

    let subscription = result?;
    metrics::counter!("billing_subscriptions_created_total").increment(1);

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /api/v1/subscriptions/active
#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn get_active_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Option<Subscription>>> {
    let start = Instant::now();

    let result = state.billing.get_active_subscription(auth.user_id).await;
    record_op_duration("get_active_subscription", start, result.is_ok());

    Ok(Json(result?))
}

/// GET /api/v1/subscriptions/{id}
#[instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();

    let id = parse_subscription_id(&id)?;
    let result = state.billing.get_subscription(id).await;
    record_op_duration("get_subscription", start, result.is_ok());

    let subscription = result?;
    ensure_owner(&subscription, auth.user_id)?;

    Ok(Json(subscription))
}

/// PATCH /api/v1/subscriptions/{id}
#[instrument(skip(state, req), fields(user_id = %auth.user_id))]
pub async fn update_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();

    let id = parse_subscription_id(&id)?;
    let patch = SubscriptionPatch::try_from(req)?;

    let existing = state.billing.get_subscription(id).await?;
    ensure_owner(&existing, auth.user_id)?;

    let result = state.billing.update_subscription(id, patch).await;
    record_op_duration("update_subscription", start, result.is_ok());

    Ok(Json(result?))
}

/// POST /api/v1/subscriptions/{id}/cancel
#[instrument(skip(state, req), fields(user_id = %auth.user_id))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CancelSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();

    let id = parse_subscription_id(&id)?;
    let existing = state.billing.get_subscription(id).await?;
    ensure_owner(&existing, auth.user_id)?;

    let defer = req.cancel_at_period_end.unwrap_or(false);
    let result = state.billing.cancel_subscription(id, defer).await;
    record_op_duration("cancel_subscription", start, result.is_ok());

    let subscription = result?;
    metrics::counter!("billing_subscriptions_canceled_total").increment(1);

    Ok(Json(subscription))
}

/// POST /api/v1/subscriptions/{id}/renew
#[instrument(skip(state, req), fields(user_id = %auth.user_id))]
pub async fn renew_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<RenewSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();

    let id = parse_subscription_id(&id)?;
    let payment_id = req.payment_id.as_deref().map(parse_payment_id).transpose()?;

    let existing = state.billing.get_subscription(id).await?;
    ensure_owner(&existing, auth.user_id)?;

    let result = state.billing.renew_subscription(id, payment_id).await;
    record_op_duration("renew_subscription", start, result.is_ok());

    let subscription = result?;
    metrics::counter!("billing_subscriptions_renewed_total").increment(1);

    Ok(Json(subscription))
}

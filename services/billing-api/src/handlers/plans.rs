//! Plan catalog handlers

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use tracing::instrument;

use rentora_types::Plan;

use super::shared::record_op_duration;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/v1/plans
#[instrument(skip(state))]
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
    let start = Instant::now();

    let result = state.billing.list_plans().await;
    record_op_duration("list_plans", start, result.is_ok());

    Ok(Json(result?))
}

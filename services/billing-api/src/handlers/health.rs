//! Liveness and readiness probes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    /// `connected`, or `in-memory` when no database is configured
    pub database: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready
///
/// Pings the database; 503 while it is unreachable.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let database = match &state.pool {
        None => "in-memory",
        Some(pool) => {
            sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
                tracing::error!(error = ?e, "readiness probe could not reach the database");
                StatusCode::SERVICE_UNAVAILABLE
            })?;
            "connected"
        }
    };

    Ok(Json(ReadyResponse {
        status: "ready",
        database,
    }))
}

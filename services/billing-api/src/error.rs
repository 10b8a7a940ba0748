//! Error types for the Billing API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rentora_billing_core::BillingError;
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Billing(#[from] BillingError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Billing(err) => match err {
                BillingError::PlanNotFound
                | BillingError::SubscriptionNotFound
                | BillingError::UserNotFound => StatusCode::NOT_FOUND,
                BillingError::UsageLimitExceeded { .. } => StatusCode::FORBIDDEN,
                BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BillingError::UserInactive
                | BillingError::PlanInactive
                | BillingError::Validation(_)
                | BillingError::NoChanges
                | BillingError::DuplicateSubscription
                | BillingError::AlreadyCancelled
                | BillingError::AlreadyExpired
                | BillingError::InvalidStateTransition { .. } => StatusCode::BAD_REQUEST,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Billing(err) => match err {
                BillingError::PlanNotFound => "PLAN_NOT_FOUND",
                BillingError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
                BillingError::UserNotFound => "USER_NOT_FOUND",
                BillingError::UserInactive => "USER_INACTIVE",
                BillingError::PlanInactive => "PLAN_INACTIVE",
                BillingError::Validation(_) => "VALIDATION_ERROR",
                BillingError::NoChanges => "NO_CHANGES",
                BillingError::DuplicateSubscription => "DUPLICATE_SUBSCRIPTION",
                BillingError::AlreadyCancelled => "ALREADY_CANCELLED",
                BillingError::AlreadyExpired => "ALREADY_EXPIRED",
                BillingError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
                BillingError::UsageLimitExceeded { .. } => "USAGE_LIMIT_EXCEEDED",
                BillingError::Database(_) => "INTERNAL_ERROR",
            },
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Billing(BillingError::UsageLimitExceeded {
                remaining,
                current,
                limit,
            }) => Some(serde_json::json!({
                "remaining": remaining,
                "current": current,
                "limit": limit,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Storage details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

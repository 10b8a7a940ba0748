//! Billing errors

use rentora_types::{SubscriptionStatus, ValidationError};
use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Plan not found
    #[error("plan not found")]
    PlanNotFound,

    /// Subscription not found
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// User not found
    #[error("user not found")]
    UserNotFound,

    /// User exists but is deactivated
    #[error("user is not active")]
    UserInactive,

    /// Plan exists but is no longer offered
    #[error("plan is not active")]
    PlanInactive,

    /// Invalid input
    #[error("validation error: {0}")]
    Validation(String),

    /// Update patch carried no fields
    #[error("no changes provided")]
    NoChanges,

    /// The user already has a live subscription
    #[error("user already has an active subscription")]
    DuplicateSubscription,

    /// Cancelling a cancelled subscription
    #[error("subscription is already cancelled")]
    AlreadyCancelled,

    /// Cancelling an expired subscription
    #[error("subscription has already expired")]
    AlreadyExpired,

    /// Operation not allowed from the current status
    #[error("cannot {action} a subscription in status {from}")]
    InvalidStateTransition {
        from: SubscriptionStatus,
        action: &'static str,
    },

    /// Usage limit exceeded
    #[error("usage limit exceeded: {current} / {limit}, {remaining} remaining")]
    UsageLimitExceeded {
        /// Headroom left before the request
        remaining: i64,
        /// Current usage
        current: i64,
        /// Usage limit
        limit: i64,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rentora_db::DbError),
}

impl BillingError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound | Self::SubscriptionNotFound | Self::UserNotFound
        )
    }

    /// Whether the caller can fix the request; storage failures are the only server-side errors
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

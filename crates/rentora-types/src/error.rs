//! Common error types

use thiserror::Error;

/// Input validation failures shared by the service layers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is not a UUID
    #[error("invalid {0} id format")]
    InvalidId(&'static str),

    /// Unknown enum value
    #[error(transparent)]
    InvalidEnum(#[from] crate::ParseEnumError),

    /// Count must be at least 1
    #[error("count must be positive")]
    NonPositiveCount,

    /// Free-form field rejected
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

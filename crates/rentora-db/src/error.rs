//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Write rejected by a uniqueness or invariant guard
    #[error("conflict: {0}")]
    Conflict(String),

    /// Arithmetic on a stored value left its range
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Stored value could not be decoded into a domain type
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for repository operations
pub type DbResult<T> = Result<T, DbError>;

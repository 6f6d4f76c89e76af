//! # Store Errors

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Another writer holds the database lock past the busy timeout
    #[error("Database busy: {0}")]
    Busy(String),

    /// A uniqueness or foreign-key constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Schema migration could not be applied
    #[error("Migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    /// A stored value could not be mapped back to a domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Busy(_) => 503,
            StoreError::Constraint(_) => 409,
            StoreError::MigrationFailed { .. } => 500,
            StoreError::CorruptRow(_) => 500,
            StoreError::Sqlite(_) => 500,
            StoreError::Internal(_) => 500,
        }
    }

    /// Transient contention; the caller may retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _) => match code.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::Busy(err.to_string())
                }
                ErrorCode::ConstraintViolation => StoreError::Constraint(err.to_string()),
                _ => StoreError::Sqlite(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::CorruptRow(err.to_string()),
            _ => StoreError::Sqlite(err.to_string()),
        }
    }
}

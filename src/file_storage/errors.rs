//! # File Storage Errors

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // ===== Object errors =====
    /// The descriptor points at content that no longer exists
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // ===== Backend errors =====
    #[error("I/O error: {0}")]
    IoError(String),

    /// Remote object store rejected or failed the request
    #[error("{0}")]
    Provider(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::ObjectNotFound(_) => 410,
            StorageError::InvalidPath(_) => 400,
            StorageError::IoError(_) => 500,
            StorageError::Provider(_) => 502,
            StorageError::Signing(_) => 500,
            StorageError::Internal(_) => 500,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Provider(err.to_string())
    }
}

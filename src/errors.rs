//! # Service Errors
//!
//! Request-level error taxonomy. Every subsystem error converts into one of
//! these, and each variant maps to exactly one HTTP status (auth errors carry
//! their own).

use thiserror::Error;

use crate::auth::AuthError;
use crate::billing::BillingError;
use crate::file_storage::StorageError;
use crate::store::StoreError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Malformed request
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid identity or insufficient role
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Document is not readable in its current moderation state
    #[error("Document not available")]
    NotAvailable,

    /// Free tier exhausted
    #[error("Upgrade required to access more documents")]
    QuotaExceeded,

    #[error("{0} not found")]
    NotFound(String),

    /// Entitled, but the stored content is missing
    #[error("File missing on server: {0}")]
    StorageGone(String),

    /// Payment or storage provider failure
    #[error("{service} error: {message}")]
    ExternalService { service: String, message: String },

    /// Optional integration not configured
    #[error("{0} not configured")]
    Unconfigured(String),

    /// Transient datastore contention, safe to retry
    #[error("Database busy, please retry")]
    PersistenceConflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Auth(e) => e.status_code(),
            ServiceError::QuotaExceeded => 402,
            ServiceError::NotAvailable => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::StorageGone(_) => 410,
            ServiceError::ExternalService { .. } => 502,
            ServiceError::Unconfigured(_) => 503,
            ServiceError::PersistenceConflict(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy(msg) => ServiceError::PersistenceConflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound(key) => ServiceError::StorageGone(key),
            StorageError::Provider(message) => ServiceError::ExternalService {
                service: "Storage".to_string(),
                message,
            },
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<BillingError> for ServiceError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotConfigured(what) => ServiceError::Unconfigured(what),
            BillingError::Provider(message) => ServiceError::ExternalService {
                service: "Payment provider".to_string(),
                message,
            },
            BillingError::InvalidSignature(msg) | BillingError::InvalidPayload(msg) => {
                ServiceError::Validation(format!("Webhook error: {}", msg))
            }
            BillingError::Store(e) => e.into(),
            BillingError::Auth(e) => e.into(),
        }
    }
}

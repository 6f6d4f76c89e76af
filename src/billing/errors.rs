//! # Billing Errors

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Result type for billing operations
pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Clone, Error)]
pub enum BillingError {
    /// Payments or webhooks are switched off in this deployment
    #[error("{0} not configured")]
    NotConfigured(String),

    /// The payment provider failed or rejected the request
    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl BillingError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BillingError::NotConfigured(_) => 503,
            BillingError::Provider(_) => 502,
            BillingError::InvalidSignature(_) => 400,
            BillingError::InvalidPayload(_) => 400,
            BillingError::Store(e) => e.status_code(),
            BillingError::Auth(e) => e.status_code(),
        }
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Provider(err.to_string())
    }
}

//! JSON error responses
//!
//! Every handler fails with `(StatusCode, Json<ErrorResponse>)`; the status
//! comes from [`ServiceError::status_code`].

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<T, ApiError>;

/// Convert any subsystem error into an HTTP error response.
pub fn api_error(err: impl Into<ServiceError>) -> ApiError {
    let err = err.into();
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    } else if status.is_server_error() {
        warn!(error = %err, status = status.as_u16(), "request failed");
    }

    (status, Json(ErrorResponse::from(&err)))
}

/// Run a blocking repository call off the async executor.
pub async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(ServiceError::Internal(format!("blocking task failed: {}", e))))?
        .map_err(api_error)
}

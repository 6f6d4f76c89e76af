//! Billing HTTP Routes
//!
//! Checkout initiation and the payment provider's webhook. The webhook reads
//! the raw body: the signature covers the exact bytes received.

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::errors::{api_error, ApiResult};
use super::extract::CurrentUser;
use super::state::SharedState;
use crate::billing::{CheckoutResponse, SIGNATURE_HEADER};

pub fn billing_routes() -> Router<SharedState> {
    Router::new()
        .route("/billing/checkout", post(checkout_handler))
        .route("/billing/webhook", post(webhook_handler))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

async fn checkout_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<CheckoutResponse>> {
    let response = state.billing.checkout(&user).await.map_err(api_error)?;
    Ok(Json(response))
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = state
        .billing
        .handle_webhook(body.to_vec(), signature, Utc::now().timestamp())
        .await
        .map_err(api_error)?;

    info!(outcome = ?outcome, "webhook processed");
    Ok(Json(WebhookAck { received: true }))
}

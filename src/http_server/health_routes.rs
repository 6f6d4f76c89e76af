//! Health and banner routes, mounted at the root rather than under `/api`.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: String,
    pub docs_endpoint: String,
}

pub fn health_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/", get(root_handler))
}

async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

async fn root_handler() -> impl IntoResponse {
    Json(BannerResponse {
        message: "Backend running".to_string(),
        docs_endpoint: "/api/docs".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok" }));
    }
}

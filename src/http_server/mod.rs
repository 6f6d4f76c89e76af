//! # HTTP Server
//!
//! axum front end: shared state, bearer-token extractors, JSON error mapping
//! and one router module per resource.

pub mod errors;
pub mod extract;
pub mod state;
pub mod auth_routes;
pub mod doc_routes;
pub mod billing_routes;
pub mod feedback_routes;
pub mod health_routes;
pub mod server;

pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use state::{AppState, SharedState, StartupError};
pub use server::{build_router, HttpServer};

//! Auth HTTP Routes
//!
//! Registration, login and the current account's profile.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::errors::{api_error, blocking, ApiResult};
use super::extract::CurrentUser;
use super::state::SharedState;
use crate::access::Profile;
use crate::auth::user::{LoginRequest, RegisterRequest};
use crate::auth::{TokenResponse, User};
use crate::errors::ServiceError;

pub fn auth_routes() -> Router<SharedState> {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/me", get(me_handler))
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: Profile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Profile,
    pub free_limit: u32,
}

async fn auth_response(
    state: &SharedState,
    user: User,
    token: TokenResponse,
) -> ApiResult<AuthResponse> {
    let user = state.access.profile(&user).await.map_err(api_error)?;
    Ok(AuthResponse { token, user })
}

async fn register_handler(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = {
        let state = state.clone();
        blocking(move || state.auth.register(request).map_err(ServiceError::from)).await?
    };
    let response = auth_response(&state, user, token).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login_handler(
    State(state): State<SharedState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (user, token) = {
        let state = state.clone();
        blocking(move || state.auth.login(request).map_err(ServiceError::from)).await?
    };
    Ok(Json(auth_response(&state, user, token).await?))
}

async fn me_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MeResponse>> {
    let profile = state.access.profile(&user).await.map_err(api_error)?;
    Ok(Json(MeResponse {
        user: profile,
        free_limit: state.free_doc_limit,
    }))
}

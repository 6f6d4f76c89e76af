//! Request extractors: bearer-token identity and client network metadata.

use std::convert::Infallible;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use super::errors::{api_error, blocking, ApiError};
use super::state::SharedState;
use crate::audit::ClientInfo;
use crate::auth::{AuthError, User};
use crate::errors::ServiceError;

/// Extract Bearer token from Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

async fn authenticate(state: &SharedState, token: &str) -> Result<User, ApiError> {
    let state = state.clone();
    let token = token.to_string();
    blocking(move || state.auth.authenticate(&token).map_err(ServiceError::from)).await
}

/// The authenticated caller; rejects with 401 when the token is missing or invalid.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| api_error(AuthError::AuthenticationRequired))?;
        Ok(CurrentUser(authenticate(state, token).await?))
    }
}

/// Optional identity. A missing or unusable token means anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<SharedState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };

        match authenticate(state, token).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err((status, _)) if status.is_client_error() => {
                debug!(status = status.as_u16(), "ignoring unusable bearer token");
                Ok(MaybeUser(None))
            }
            Err(e) => Err(e),
        }
    }
}

/// Client address and user agent for the audit log
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestClient {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded_for = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());
        let user_agent = parts.headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(RequestClient(ClientInfo::from_request_parts(
            forwarded_for,
            peer,
            user_agent,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_request_client_prefers_forwarded_for() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header(USER_AGENT, "curl/8")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let RequestClient(client) = RequestClient::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(client.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(client.user_agent.as_deref(), Some("curl/8"));
    }

    #[tokio::test]
    async fn test_request_client_falls_back_to_peer() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4000))));

        let RequestClient(client) = RequestClient::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(client.ip_address.as_deref(), Some("192.0.2.7"));
        assert_eq!(client.user_agent, None);
    }
}

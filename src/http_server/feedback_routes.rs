//! Feedback HTTP Routes

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Serialize;

use super::errors::{blocking, ApiResult};
use super::extract::MaybeUser;
use super::state::SharedState;
use crate::feedback::{Feedback, FeedbackRequest};
use crate::notify::Notification;

pub fn feedback_routes() -> Router<SharedState> {
    Router::new().route("/feedback", post(feedback_handler))
}

#[derive(Debug, Serialize)]
pub struct FeedbackEnvelope {
    pub feedback: Feedback,
}

async fn feedback_handler(
    State(state): State<SharedState>,
    MaybeUser(user): MaybeUser,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<FeedbackEnvelope>)> {
    let feedback = {
        let state = state.clone();
        let user = user.clone();
        blocking(move || state.feedback.submit(&request, user.as_ref())).await?
    };

    let sender = user
        .map(|u| u.email)
        .or_else(|| feedback.contact.clone());
    state.notifier.notify(Notification::FeedbackReceived {
        message: feedback.message.clone(),
        document_id: feedback.document_id,
        sender,
    });

    Ok((StatusCode::CREATED, Json(FeedbackEnvelope { feedback })))
}

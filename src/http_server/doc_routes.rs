//! Document HTTP Routes
//!
//! Listing, upload, moderation, deletion and the gated download.

use axum::{
    body::Bytes,
    extract::{Json, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::{api_error, ApiResult};
use super::extract::{CurrentUser, MaybeUser, RequestClient};
use super::state::SharedState;
use crate::documents::{
    DocumentKind, DocumentListing, DocumentStatus, Moderation, UploadForm,
};
use crate::errors::ServiceError;
use crate::file_storage::{attachment_disposition, Location};

pub fn doc_routes() -> Router<SharedState> {
    Router::new()
        .route("/docs", get(list_handler).post(upload_handler))
        .route("/docs/:id", delete(delete_handler))
        .route("/docs/:id/approve", post(approve_handler))
        .route("/docs/:id/reject", post(reject_handler))
        .route("/docs/:id/download", get(download_handler))
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploaderRef {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: i64,
    pub title: String,
    pub course_code: String,
    pub year: Option<String>,
    pub term: Option<String>,
    pub kind: DocumentKind,
    pub notes: Option<String>,
    /// Only populated for admins
    pub status: Option<DocumentStatus>,
    pub uploader: UploaderRef,
    pub created_at: DateTime<Utc>,
}

impl DocumentResponse {
    pub fn from_listing(listing: DocumentListing, include_status: bool) -> Self {
        let doc = listing.document;
        Self {
            id: doc.id,
            title: doc.title,
            course_code: doc.course_code,
            year: doc.year,
            term: doc.term,
            kind: doc.kind,
            notes: doc.notes,
            status: include_status.then_some(doc.status),
            uploader: UploaderRef {
                id: doc.uploader_id,
                email: listing.uploader_email,
            },
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentResponse>,
}

#[derive(Debug, Serialize)]
pub struct DocumentEnvelope {
    pub document: DocumentResponse,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub document_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}

// ==================
// Handlers
// ==================

async fn list_handler(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<DocumentsResponse>> {
    let is_admin = viewer.as_ref().map(|u| u.is_admin()).unwrap_or(false);

    // Unknown filters are ignored rather than rejected
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<DocumentStatus>().ok());

    let listings = state
        .documents
        .list(viewer.as_ref(), status)
        .await
        .map_err(api_error)?;

    Ok(Json(DocumentsResponse {
        documents: listings
            .into_iter()
            .map(|l| DocumentResponse::from_listing(l, is_admin))
            .collect(),
    }))
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(ServiceError::validation(e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            form.file_name = field.file_name().map(str::to_string);
            form.content_type = field.content_type().map(str::to_string);
            form.bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(ServiceError::validation(e.body_text())))?
                .to_vec();
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| api_error(ServiceError::validation(e.body_text())))?;
        let value = Some(value).filter(|v| !v.trim().is_empty());
        match name.as_str() {
            "title" => form.title = value,
            "course_code" => form.course_code = value,
            "year" => form.year = value,
            "term" => form.term = value,
            "kind" => form.kind = value,
            "notes" => form.notes = value,
            _ => {}
        }
    }

    Ok(form)
}

async fn upload_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DocumentEnvelope>)> {
    let form = read_upload_form(multipart).await?;
    let document = state
        .documents
        .upload(&user, form)
        .await
        .map_err(api_error)?;

    let listing = DocumentListing {
        document,
        uploader_email: user.email.clone(),
    };
    Ok((
        StatusCode::CREATED,
        Json(DocumentEnvelope {
            document: DocumentResponse::from_listing(listing, true),
        }),
    ))
}

async fn moderate(
    state: SharedState,
    user: CurrentUser,
    id: i64,
    action: Moderation,
) -> ApiResult<Json<DocumentEnvelope>> {
    let listing = state
        .documents
        .moderate(&user.0, id, action)
        .await
        .map_err(api_error)?;
    Ok(Json(DocumentEnvelope {
        document: DocumentResponse::from_listing(listing, true),
    }))
}

async fn approve_handler(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<DocumentEnvelope>> {
    moderate(state, user, id, Moderation::Approve).await
}

async fn reject_handler(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<DocumentEnvelope>> {
    moderate(state, user, id, Moderation::Reject).await
}

async fn delete_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteResponse>> {
    state.documents.delete(&user, id).await.map_err(api_error)?;
    Ok(Json(DeleteResponse {
        deleted: true,
        document_id: id,
    }))
}

async fn download_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    RequestClient(client): RequestClient,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let grant = state
        .access
        .download(&user, id, client)
        .await
        .map_err(api_error)?;

    match grant.location {
        Location::Remote { url, expires_at } => Ok(Json(DownloadUrlResponse {
            download_url: url,
            expires_at,
        })
        .into_response()),
        Location::LocalPath {
            path,
            file_name,
            content_type,
        } => {
            let data = tokio::fs::read(&path).await.map_err(|e| {
                warn!(document_id = id, path = %path.display(), error = %e, "stored file unreadable");
                if e.kind() == std::io::ErrorKind::NotFound {
                    api_error(ServiceError::StorageGone(file_name.clone()))
                } else {
                    api_error(ServiceError::Internal(e.to_string()))
                }
            })?;

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, attachment_disposition(&file_name)),
                ],
                Bytes::from(data),
            )
                .into_response())
        }
    }
}

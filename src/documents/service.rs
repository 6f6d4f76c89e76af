//! Listing, upload, moderation and deletion of documents.

use tracing::{info, warn};

use super::lifecycle::{transition, Moderation};
use super::model::{Document, DocumentListing, DocumentStatus, NewDocument};
use super::repository::{self, MAX_LISTING};
use super::upload::UploadForm;
use crate::auth::{require_admin, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::file_storage::StorageResolver;
use crate::notify::{Notification, Notifier};
use crate::store::{Database, StoreError};

#[derive(Debug, Clone)]
pub struct DocumentService {
    db: Database,
    storage: StorageResolver,
    notifier: Notifier,
}

impl DocumentService {
    pub fn new(db: Database, storage: StorageResolver, notifier: Notifier) -> Self {
        Self {
            db,
            storage,
            notifier,
        }
    }

    /// Newest first. Non-admins only ever see approved documents; admins may
    /// filter by any status.
    pub async fn list(
        &self,
        viewer: Option<&User>,
        status: Option<DocumentStatus>,
    ) -> ServiceResult<Vec<DocumentListing>> {
        let filter = match viewer {
            Some(user) if user.is_admin() => status,
            _ => Some(DocumentStatus::Approved),
        };

        Ok(self
            .db
            .call(move |db| {
                db.with_conn(|conn| repository::list_documents(conn, filter, MAX_LISTING))
            })
            .await?)
    }

    /// Store the file, insert a pending document and notify the admin inbox.
    pub async fn upload(&self, uploader: &User, form: UploadForm) -> ServiceResult<Document> {
        let upload = form.validate()?;

        let storage = self
            .storage
            .upload(&upload.stored_name, upload.bytes, &upload.content_type)
            .await?;

        let new_document = NewDocument {
            title: upload.title,
            course_code: upload.course_code,
            year: upload.year,
            term: upload.term,
            kind: upload.kind,
            notes: upload.notes,
            file_name: upload.stored_name,
            storage: storage.clone(),
            content_type: upload.content_type,
            uploader_id: uploader.id,
        };

        let inserted = self
            .db
            .call(move |db| db.with_conn(|conn| repository::insert_document(conn, &new_document)))
            .await;
        let document = match inserted {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&storage).await {
                    warn!(key = %storage.key, error = %cleanup, "orphaned upload not removed");
                }
                return Err(e.into());
            }
        };

        info!(
            document_id = document.id,
            uploader_id = uploader.id,
            storage = document.storage.kind.as_str(),
            "document uploaded"
        );
        self.notifier.notify(Notification::UploadReceived {
            document_id: document.id,
            title: document.title.clone(),
            course_code: document.course_code.clone(),
            kind: document.kind.as_str().to_string(),
            uploader_email: uploader.email.clone(),
        });

        Ok(document)
    }

    /// Approve or reject. Re-applying the current status is allowed.
    pub async fn moderate(
        &self,
        actor: &User,
        document_id: i64,
        action: Moderation,
    ) -> ServiceResult<DocumentListing> {
        require_admin(actor)?;
        let actor = actor.clone();

        let listing = self
            .db
            .call(move |db| {
                db.with_immediate_tx(|tx| {
                    let Some(current) = repository::get_listing(tx, document_id)? else {
                        return Ok(None);
                    };
                    let updated = transition(current.document, &actor, action)
                        .map_err(|e| StoreError::Internal(e.to_string()))?;
                    repository::update_status(tx, updated.id, updated.status)?;
                    Ok(Some(DocumentListing {
                        document: updated,
                        uploader_email: current.uploader_email,
                    }))
                })
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Document"))?;

        info!(document_id, status = %listing.document.status, "document moderated");
        Ok(listing)
    }

    /// Remove the stored file (best effort) and the document row; ledger and
    /// audit rows cascade with it.
    pub async fn delete(&self, actor: &User, document_id: i64) -> ServiceResult<()> {
        require_admin(actor)?;

        let document = self
            .db
            .call(move |db| db.with_conn(|conn| repository::get_document(conn, document_id)))
            .await?
            .ok_or_else(|| ServiceError::not_found("Document"))?;

        if let Err(e) = self.storage.remove(&document.storage).await {
            warn!(document_id, key = %document.storage.key, error = %e, "stored file not removed");
        }

        let deleted = self
            .db
            .call(move |db| db.with_immediate_tx(|tx| repository::delete_document(tx, document_id)))
            .await
            .map_err(|e| {
                warn!(document_id, error = %e, "document delete failed");
                ServiceError::Internal("Failed to delete document".to_string())
            })?;
        if !deleted {
            return Err(ServiceError::not_found("Document"));
        }

        info!(document_id, "document deleted");
        Ok(())
    }
}

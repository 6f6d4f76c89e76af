//! # Download Access
//!
//! The download path: load the document, decide and record entitlement in
//! one transaction, resolve where the content lives, then queue an audit
//! entry. A storage failure after the grant does not undo the ledger row.

use serde::Serialize;
use tracing::info;

use crate::audit::{AuditEntry, AuditHandle, ClientInfo};
use crate::auth::{Role, SubscriptionStatus, User};
use crate::documents::Document;
use crate::entitlement::{Authorization, Decision, EntitlementEngine, Grant};
use crate::errors::{ServiceError, ServiceResult};
use crate::file_storage::{Location, StorageResolver};
use crate::ledger::LedgerTx;
use crate::store::Database;

/// A granted download
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    pub document: Document,
    pub grant: Grant,
    pub location: Location,
}

/// Account view returned by `GET /me`
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub subscription_status: SubscriptionStatus,
    pub free_docs_remaining: u32,
    pub accessed_doc_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct AccessService {
    db: Database,
    engine: EntitlementEngine,
    storage: StorageResolver,
    audit: AuditHandle,
}

impl AccessService {
    pub fn new(
        db: Database,
        engine: EntitlementEngine,
        storage: StorageResolver,
        audit: AuditHandle,
    ) -> Self {
        Self {
            db,
            engine,
            storage,
            audit,
        }
    }

    pub fn engine(&self) -> &EntitlementEngine {
        &self.engine
    }

    pub async fn download(
        &self,
        user: &User,
        document_id: i64,
        client: ClientInfo,
    ) -> ServiceResult<DownloadGrant> {
        let engine = self.engine;
        let actor = user.clone();

        let Authorization { document, decision } = self
            .db
            .call(move |db| engine.authorize(db, &actor, document_id))
            .await?
            .ok_or_else(|| ServiceError::not_found("Document"))?;

        let grant = match decision {
            Decision::Allow(grant) => grant,
            Decision::Deny(reason) => {
                info!(user_id = user.id, document_id, reason = ?reason, "download denied");
                return Err(reason.into());
            }
        };

        let location = self.storage.resolve(&document).await?;
        self.audit
            .record(AuditEntry::new(Some(user.id), document.id, client));

        info!(user_id = user.id, document_id, grant = ?grant, "download granted");
        Ok(DownloadGrant {
            document,
            grant,
            location,
        })
    }

    pub async fn profile(&self, user: &User) -> ServiceResult<Profile> {
        let engine = self.engine;
        let actor = user.clone();

        let (remaining, accessed) = self
            .db
            .call(move |db| {
                db.with_conn(|conn| {
                    let ledger = LedgerTx::new(conn);
                    Ok((
                        engine.free_docs_remaining(&actor, &ledger)?,
                        ledger.accessed_document_ids(actor.id)?,
                    ))
                })
            })
            .await?;

        Ok(Profile {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            subscription_status: user.subscription_status,
            free_docs_remaining: remaining,
            accessed_doc_ids: accessed,
        })
    }
}


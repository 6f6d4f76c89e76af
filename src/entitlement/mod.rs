//! # Entitlement Engine
//!
//! Decides whether a user may download a document right now.
//!
//! Order of checks:
//! 1. lifecycle: unreadable documents are `NotAvailable`, whoever asks
//! 2. admins are always allowed
//! 3. paid subscribers are allowed
//! 4. a free user re-opening a document they already unlocked is allowed
//! 5. a free user with ledger size below the limit takes a new slot
//! 6. otherwise `QuotaExceeded`
//!
//! [`EntitlementEngine::authorize`] reads the document, evaluates the policy
//! and writes the ledger row in the same `BEGIN IMMEDIATE` transaction. Two
//! requests from one user racing for the last free slot are serialised by
//! SQLite's write lock, and the second one sees the first one's row. A
//! moderation or delete committed before the grant is always observed.

use tracing::debug;

use crate::auth::User;
use crate::documents::{is_readable_by, repository, Document};
use crate::errors::ServiceError;
use crate::ledger::{LedgerTx, LedgerView};
use crate::store::{Database, StoreResult};

/// Free documents per user when not configured
pub const DEFAULT_FREE_DOC_LIMIT: u32 = 2;

/// Why a download was allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Admin,
    Subscriber,
    /// Free user re-opening a document already on their ledger
    PreviouslyUnlocked,
    /// Free user taking a new quota slot
    FreeSlot,
}

impl Grant {
    /// Whether this grant leaves a ledger row behind
    pub fn records_access(&self) -> bool {
        matches!(self, Grant::Subscriber | Grant::FreeSlot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAvailable,
    QuotaExceeded,
}

impl From<DenyReason> for ServiceError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotAvailable => ServiceError::NotAvailable,
            DenyReason::QuotaExceeded => ServiceError::QuotaExceeded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny(DenyReason),
}

/// Decision together with the document state it was made against
#[derive(Debug, Clone)]
pub struct Authorization {
    pub document: Document,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy)]
pub struct EntitlementEngine {
    free_doc_limit: u32,
}

impl Default for EntitlementEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_DOC_LIMIT)
    }
}

impl EntitlementEngine {
    pub fn new(free_doc_limit: u32) -> Self {
        Self { free_doc_limit }
    }

    pub fn free_doc_limit(&self) -> u32 {
        self.free_doc_limit
    }

    /// Pure policy evaluation. Does not write.
    pub fn decide<L: LedgerView + ?Sized>(
        &self,
        actor: &User,
        document: &Document,
        ledger: &L,
    ) -> StoreResult<Decision> {
        if !is_readable_by(document, actor) {
            return Ok(Decision::Deny(DenyReason::NotAvailable));
        }
        if actor.is_admin() {
            return Ok(Decision::Allow(Grant::Admin));
        }
        if actor.is_paid() {
            return Ok(Decision::Allow(Grant::Subscriber));
        }
        if ledger.has_accessed(actor.id, document.id)? {
            return Ok(Decision::Allow(Grant::PreviouslyUnlocked));
        }
        if ledger.count_distinct_documents(actor.id)? < self.free_doc_limit {
            return Ok(Decision::Allow(Grant::FreeSlot));
        }
        Ok(Decision::Deny(DenyReason::QuotaExceeded))
    }

    /// Load the document, decide and, on allow, record the ledger row, all in
    /// one transaction. `None` when the document does not exist.
    pub fn authorize(
        &self,
        db: &Database,
        actor: &User,
        document_id: i64,
    ) -> StoreResult<Option<Authorization>> {
        db.with_immediate_tx(|tx| {
            let Some(document) = repository::get_document(tx, document_id)? else {
                return Ok(None);
            };

            let ledger = LedgerTx::new(tx);
            let decision = self.decide(actor, &document, &ledger)?;

            if let Decision::Allow(grant) = decision {
                if grant.records_access() {
                    let outcome = ledger.record_access_if_absent(actor.id, document.id)?;
                    debug!(
                        user_id = actor.id,
                        document_id = document.id,
                        grant = ?grant,
                        created = outcome.created,
                        "ledger updated"
                    );
                }
            }
            Ok(Some(Authorization { document, decision }))
        })
    }

    /// Free slots left on the user's ledger, regardless of role or plan.
    pub fn free_docs_remaining<L: LedgerView + ?Sized>(
        &self,
        actor: &User,
        ledger: &L,
    ) -> StoreResult<u32> {
        let used = ledger.count_distinct_documents(actor.id)?;
        Ok(self.free_doc_limit.saturating_sub(used))
    }
}

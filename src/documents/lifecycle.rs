//! # Document Lifecycle
//!
//! pending -> approved | rejected. Both moderation actions may be re-issued
//! from any state; re-applying the current state is a no-op, not an error.

use crate::auth::{require_admin, AuthResult, User};

use super::model::{Document, DocumentStatus};

/// Admin moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moderation {
    Approve,
    Reject,
}

impl Moderation {
    pub fn target(&self) -> DocumentStatus {
        match self {
            Moderation::Approve => DocumentStatus::Approved,
            Moderation::Reject => DocumentStatus::Rejected,
        }
    }
}

/// Apply a moderation action. Only admins may moderate; prior state is not checked.
pub fn transition(document: Document, actor: &User, action: Moderation) -> AuthResult<Document> {
    require_admin(actor)?;
    Ok(Document {
        status: action.target(),
        ..document
    })
}

/// Approved documents are readable by everyone; admins read regardless of status.
pub fn is_readable_by(document: &Document, actor: &User) -> bool {
    document.status == DocumentStatus::Approved || actor.is_admin()
}

//! # Feedback
//!
//! Free-text reports about the library or a specific document. Submitting
//! does not require an account.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::errors::{ServiceError, ServiceResult};
use crate::store::{Database, StoreResult};

/// Request body of `POST /feedback`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub id: i64,
    pub message: String,
    pub contact: Option<String>,
    pub document_id: Option<i64>,
    pub user_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRequest {
    /// Trimmed message, or a validation error when it is missing.
    pub fn message(&self) -> ServiceResult<String> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::validation("Message required"))
    }
}

fn insert(
    conn: &Connection,
    message: &str,
    contact: Option<&str>,
    document_id: Option<i64>,
    user: Option<&User>,
) -> StoreResult<Feedback> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO feedback (user_id, document_id, message, contact, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.map(|u| u.id), document_id, message, contact, created_at],
    )?;

    Ok(Feedback {
        id: conn.last_insert_rowid(),
        message: message.to_string(),
        contact: contact.map(str::to_string),
        document_id,
        user_email: user.map(|u| u.email.clone()),
        created_at,
    })
}

#[derive(Debug, Clone)]
pub struct FeedbackRepository {
    db: Database,
}

impl FeedbackRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a submission. An unknown `document_id` is stored as no document.
    pub fn submit(&self, request: &FeedbackRequest, user: Option<&User>) -> ServiceResult<Feedback> {
        let message = request.message()?;
        let contact = request
            .contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let feedback = self.db.with_conn(|conn| {
            let document_id = match request.document_id {
                Some(id) => {
                    let mut stmt = conn.prepare_cached("SELECT 1 FROM documents WHERE id = ?1")?;
                    stmt.exists(params![id])?.then_some(id)
                }
                None => None,
            };
            insert(conn, &message, contact, document_id, user)
        })?;
        Ok(feedback)
    }
}

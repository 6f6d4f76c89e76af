//! # Audit Log
//!
//! Append-only record of successful download resolutions: who, what, when
//! and from where. Entries are handed to a background worker through a
//! bounded channel; a full queue or a failed insert is logged and dropped.
//! Nothing here can fail a download.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{Database, StoreError, StoreResult};

/// Queue depth before new entries are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Network metadata of the requesting client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// First hop of `X-Forwarded-For` wins over the socket peer address.
    pub fn from_request_parts(
        forwarded_for: Option<&str>,
        peer: Option<String>,
        user_agent: Option<&str>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            ip_address: forwarded.or(peer),
            user_agent: user_agent.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub user_id: Option<i64>,
    pub document_id: i64,
    pub client: ClientInfo,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(user_id: Option<i64>, document_id: i64, client: ClientInfo) -> Self {
        Self {
            user_id,
            document_id,
            client,
            created_at: Utc::now(),
        }
    }
}

/// Audit sink
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> StoreResult<()>;
}

/// `download_audits` table
#[derive(Debug, Clone)]
pub struct SqliteAuditLog {
    db: Database,
}

impl SqliteAuditLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Entries for one document, oldest first
    pub fn entries_for_document(&self, document_id: i64) -> StoreResult<Vec<AuditEntry>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT user_id, document_id, ip_address, user_agent, created_at
                 FROM download_audits WHERE document_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![document_id], |row| {
                Ok(AuditEntry {
                    user_id: row.get(0)?,
                    document_id: row.get(1)?,
                    client: ClientInfo {
                        ip_address: row.get(2)?,
                        user_agent: row.get(3)?,
                    },
                    created_at: row.get(4)?,
                })
            })?;

            let mut entries = Vec::new();
            for entry in rows {
                entries.push(entry?);
            }
            Ok(entries)
        })
    }
}

impl AuditLog for SqliteAuditLog {
    fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO download_audits (user_id, document_id, ip_address, user_agent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.user_id,
                    entry.document_id,
                    entry.client.ip_address,
                    entry.client.user_agent,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
    }
}

/// Sending half of the audit queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditHandle {
    /// Queue an entry. Never blocks and never fails the caller.
    pub fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.tx.try_send(entry) {
            warn!(error = %e, "audit entry dropped");
        }
    }
}

/// Start the background writer. The worker exits once every handle is dropped.
pub fn spawn_audit_worker(log: Arc<dyn AuditLog>, capacity: usize) -> (AuditHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AuditEntry>(capacity.max(1));

    let worker = tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            let log = log.clone();
            let document_id = entry.document_id;
            let result = tokio::task::spawn_blocking(move || log.append(&entry))
                .await
                .unwrap_or_else(|e| Err(StoreError::Internal(e.to_string())));

            match result {
                Ok(()) => debug!(document_id, "audit entry written"),
                Err(e) => warn!(document_id, error = %e, "audit append failed"),
            }
        }
        debug!("audit worker stopped");
    });

    (AuditHandle { tx }, worker)
}

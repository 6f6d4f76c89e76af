//! # Usage Ledger
//!
//! One row per (user, document) the user has been granted. The row count is
//! the free-tier quota counter, and the UNIQUE(user_id, document_id)
//! constraint makes repeat grants idempotent: a second insert of the same
//! pair, concurrent or not, becomes a no-op.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::store::{Database, StoreResult};

/// Read side of the ledger, as consulted by entitlement decisions
pub trait LedgerView {
    fn has_accessed(&self, user_id: i64, document_id: i64) -> StoreResult<bool>;

    fn count_distinct_documents(&self, user_id: i64) -> StoreResult<u32>;
}

/// Result of [`LedgerTx::record_access_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// `false` when the pair was already present
    pub created: bool,
}

/// Ledger operations bound to one connection or open transaction
#[derive(Debug, Clone, Copy)]
pub struct LedgerTx<'c> {
    conn: &'c Connection,
}

impl<'c> LedgerTx<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn record_access_if_absent(&self, user_id: i64, document_id: i64) -> StoreResult<RecordOutcome> {
        let inserted = self.conn.execute(
            "INSERT INTO document_accesses (user_id, document_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, document_id) DO NOTHING",
            params![user_id, document_id, Utc::now()],
        )?;
        Ok(RecordOutcome {
            created: inserted == 1,
        })
    }

    /// Documents the user has unlocked, oldest grant first
    pub fn accessed_document_ids(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT document_id FROM document_accesses WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }
}

impl LedgerView for LedgerTx<'_> {
    fn has_accessed(&self, user_id: i64, document_id: i64) -> StoreResult<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM document_accesses WHERE user_id = ?1 AND document_id = ?2",
        )?;
        Ok(stmt.exists(params![user_id, document_id])?)
    }

    fn count_distinct_documents(&self, user_id: i64) -> StoreResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(DISTINCT document_id) FROM document_accesses WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Ledger over the shared database, one pooled connection per call
#[derive(Debug, Clone)]
pub struct UsageLedger {
    db: Database,
}

impl UsageLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn record_access_if_absent(&self, user_id: i64, document_id: i64) -> StoreResult<RecordOutcome> {
        self.db
            .with_conn(|conn| LedgerTx::new(conn).record_access_if_absent(user_id, document_id))
    }

    pub fn accessed_document_ids(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        self.db
            .with_conn(|conn| LedgerTx::new(conn).accessed_document_ids(user_id))
    }
}

impl LedgerView for UsageLedger {
    fn has_accessed(&self, user_id: i64, document_id: i64) -> StoreResult<bool> {
        self.db
            .with_conn(|conn| LedgerTx::new(conn).has_accessed(user_id, document_id))
    }

    fn count_distinct_documents(&self, user_id: i64) -> StoreResult<u32> {
        self.db
            .with_conn(|conn| LedgerTx::new(conn).count_distinct_documents(user_id))
    }
}

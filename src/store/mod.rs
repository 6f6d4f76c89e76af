//! # Relational Store
//!
//! SQLite persistence shared by every request handler.
//! WAL mode, foreign keys on, a busy timeout on every connection, and a
//! small pool of idle connections so handlers never share one handle.

pub mod errors;
pub mod migrations;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::debug;

pub use errors::{StoreError, StoreResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_IDLE: usize = 8;

struct Inner {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

/// Handle to the application database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.inner.path)
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Self {
            inner: Arc::new(Inner {
                path: path.as_ref().to_path_buf(),
                idle: Mutex::new(Vec::new()),
                max_idle: DEFAULT_MAX_IDLE,
            }),
        };

        let conn = db.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "database opened");
        migrations::run_migrations(&conn)?;
        db.release(conn);

        Ok(db)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current schema version
    pub fn schema_version(&self) -> StoreResult<u32> {
        self.with_conn(|conn| migrations::current_version(conn))
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.inner.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!(path = %self.inner.path.display(), "opened sqlite connection");
        Ok(conn)
    }

    fn acquire(&self) -> StoreResult<Connection> {
        let pooled = self
            .inner
            .idle
            .lock()
            .map_err(|_| StoreError::Internal("Lock poisoned".to_string()))?
            .pop();

        match pooled {
            Some(conn) => Ok(conn),
            None => self.connect(),
        }
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut idle) = self.inner.idle.lock() {
            if idle.len() < self.inner.max_idle {
                idle.push(conn);
            }
        }
    }

    /// Run `f` on a pooled connection.
    pub fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.acquire()?;
        let result = f(&mut conn);
        self.release(conn);
        result
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so reads made inside `f` cannot be
    /// invalidated by another writer before the commit. Returning `Err`
    /// rolls back.
    pub fn with_immediate_tx<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run a blocking closure against the database from async code.
    pub async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Internal(format!("blocking task failed: {}", e)))?
    }
}

//! Migration runner: version tracking, forward-only, one transaction per migration.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::errors::{StoreError, StoreResult};

/// Highest schema version known to this build.
pub const LATEST_VERSION: u32 = 2;

type MigrationFn = fn(&Connection) -> rusqlite::Result<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 2] = [
    (1, "initial_schema", v001_initial_schema),
    (2, "feedback", v002_feedback),
];

fn v001_initial_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            subscription_status TEXT NOT NULL DEFAULT 'free',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            course_code TEXT NOT NULL,
            year TEXT,
            term TEXT,
            kind TEXT NOT NULL,
            notes TEXT,
            file_name TEXT NOT NULL,
            storage TEXT NOT NULL DEFAULT 'local',
            storage_key TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'application/pdf',
            status TEXT NOT NULL DEFAULT 'pending',
            uploader_id INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_status_created
            ON documents(status, created_at);

        CREATE TABLE IF NOT EXISTS document_accesses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            CONSTRAINT uniq_user_doc UNIQUE (user_id, document_id)
        );
        CREATE INDEX IF NOT EXISTS idx_document_accesses_document
            ON document_accesses(document_id);

        CREATE TABLE IF NOT EXISTS download_audits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_download_audits_document
            ON download_audits(document_id);
        ",
    )
}

fn v002_feedback(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            document_id INTEGER REFERENCES documents(id) ON DELETE SET NULL,
            message TEXT NOT NULL,
            contact TEXT,
            created_at TEXT NOT NULL
        );
        ",
    )
}

/// Current schema version, 0 if the database has never been migrated.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| stmt.exists([]))?;

    if !exists {
        return Ok(0);
    }

    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Run all pending migrations. Returns how many were applied.
pub fn run_migrations(conn: &Connection) -> StoreResult<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    let current = current_version(conn)?;
    if current >= LATEST_VERSION {
        debug!(version = current, "database schema is up to date");
        return Ok(0);
    }

    info!(from = current, to = LATEST_VERSION, "running migrations");

    let mut applied = 0;
    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = migrate_fn(conn).and_then(|_| {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
                .map(|_| ())
        });

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                info!(version, name, "applied migration");
                applied += 1;
            }
            Err(e) => {
                warn!(version, name, error = %e, "migration failed, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(applied)
}

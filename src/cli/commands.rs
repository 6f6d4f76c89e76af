//! CLI command implementations
//!
//! Boot order for `serve`: configuration, tracing, database (migrations
//! included), component wiring, HTTP listener.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::http_server::{AppState, HttpServer};
use crate::observability::init_tracing;
use crate::store::Database;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Output of `migrate`
#[derive(Debug, Serialize)]
pub struct MigrateReport {
    pub database: String,
    pub schema_version: u32,
}

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config } => serve(config.as_deref()),
        Command::Migrate { config } => {
            let report = migrate(config.as_deref())?;
            write_json(&report)
        }
    }
}

/// Open the configured database and apply pending migrations.
pub fn migrate(config_path: Option<&Path>) -> CliResult<MigrateReport> {
    let config = AppConfig::load(config_path)?;
    init_tracing(&config.logging);

    let db = Database::open(&config.database_path)?;
    let schema_version = db.schema_version()?;
    info!(path = %config.database_path.display(), schema_version, "database migrated");

    Ok(MigrateReport {
        database: config.database_path.display().to_string(),
        schema_version,
    })
}

/// Boot every component and serve HTTP until Ctrl-C.
pub fn serve(config_path: Option<&Path>) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    init_tracing(&config.logging);

    let db = Database::open(&config.database_path)?;
    info!(
        path = %config.database_path.display(),
        schema_version = db.schema_version()?,
        free_doc_limit = config.quota.free_doc_limit,
        "database ready"
    );

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    // Component wiring spawns the background workers
    let _guard = rt.enter();
    let state = AppState::from_config(&config, db)?;
    let server = HttpServer::new(config.server.clone(), state);

    rt.block_on(server.start())
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

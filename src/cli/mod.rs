//! CLI module for papergate
//!
//! Provides command-line interface for:
//! - serve: Boot the service and serve HTTP
//! - migrate: Bring the database schema up to date

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{migrate, run_command, serve, MigrateReport};
pub use errors::{CliError, CliErrorCode, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

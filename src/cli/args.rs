//! CLI argument definitions using clap
//!
//! Commands:
//! - papergate serve [--config <path>]
//! - papergate migrate [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// papergate - moderated past-paper library
#[derive(Parser, Debug)]
#[command(name = "papergate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve {
        /// Path to a JSON configuration file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Apply pending schema migrations and exit
    Migrate {
        /// Path to a JSON configuration file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

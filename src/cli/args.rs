//! CLI argument definitions using clap
//!
//! Commands:
//! - floe-cms serve [--config <path>] [--port <port>] [--db-url <url>]
//! - floe-cms reset-admin [--config <path>] [--db-url <url>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Floe CMS - multi-tenant content management backend
#[derive(Parser, Debug)]
#[command(name = "floe-cms")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate the database, seed the admin account and serve the API
    Serve {
        /// Path to configuration file (default: ./floe.json if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding the configuration
        #[arg(long)]
        port: Option<u16>,

        /// Database URL, overriding the configuration
        #[arg(long)]
        db_url: Option<String>,
    },

    /// Reset the configured admin account's password and re-activate it
    ResetAdmin {
        /// Path to configuration file (default: ./floe.json if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Database URL, overriding the configuration
        #[arg(long)]
        db_url: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

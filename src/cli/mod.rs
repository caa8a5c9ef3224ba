//! CLI module for Floe CMS
//!
//! Provides command-line interface for:
//! - serve: Migrate, bootstrap and serve the HTTP API
//! - reset-admin: Restore access to the configured admin account

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{reset_admin, run_command, serve};
pub use errors::{CliError, CliResult};

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "floe_cms=info,tower_http=info";

/// Install the JSON log subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Already installed when embedded in a host that set its own subscriber
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Parse arguments, set up logging and run the selected command
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing();
    run_command(cli.command).await
}

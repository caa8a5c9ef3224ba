//! Floe CMS entry point
//!
//! All logic is delegated to the CLI module; errors are printed to stderr
//! and the process exits non-zero.

use floe_cms::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        tracing::error!(code = e.code(), error = %e, "fatal");
        eprintln!("{}: {}", e.code(), e);
        std::process::exit(1);
    }
}

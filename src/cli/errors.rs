//! CLI-specific error types
//!
//! Every CLI error is fatal: it is printed and the process exits non-zero.

use std::io;

use thiserror::Error;

use crate::auth::errors::AuthError;
use crate::config::ConfigError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "FLOE_CLI_CONFIG_ERROR",
            Self::Database(_) => "FLOE_CLI_DATABASE_ERROR",
            Self::Auth(_) => "FLOE_CLI_AUTH_ERROR",
            Self::Io(_) => "FLOE_CLI_IO_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

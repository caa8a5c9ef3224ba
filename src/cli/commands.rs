//! CLI command implementations
//!
//! `serve` boots in a fixed order: load configuration, open the store,
//! migrate, seed the admin account, purge expired refresh tokens, serve.

use std::path::Path;

use crate::auth::bootstrap::{ensure_admin_exists, reset_admin_user};
use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::http_server::{AppState, HttpServer};

use super::args::Command;
use super::errors::CliResult;

/// Dispatch a parsed command
pub async fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config, port, db_url } => {
            let config = load_config(config.as_deref(), port, db_url)?;
            serve(config).await
        }
        Command::ResetAdmin { config, db_url } => {
            let config = load_config(config.as_deref(), None, db_url)?;
            reset_admin(config).await
        }
    }
}

/// Load configuration and apply command-line overrides
fn load_config(path: Option<&Path>, port: Option<u16>, db_url: Option<String>) -> CliResult<AppConfig> {
    let mut config = AppConfig::load(path)?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(url) = db_url {
        config.database.url = url;
    }

    Ok(config)
}

async fn open_store(config: &AppConfig) -> CliResult<SqliteStore> {
    let store = SqliteStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.acquire_timeout(),
    )
    .await?;
    store.migrate().await?;

    tracing::info!(url = %config.database.url, "database ready");
    Ok(store)
}

/// Boot the store and serve the API until shutdown
pub async fn serve(config: AppConfig) -> CliResult<()> {
    let store = open_store(&config).await?;
    let repos = store.repositories();

    let report = ensure_admin_exists(&repos, &config.auth.admin_email, &config.auth.admin_password).await?;
    if report.created_admin {
        tracing::warn!(
            email = %report.admin.email,
            "created the initial admin account with the configured password; change it after first login"
        );
    }

    let secret = config.auth.resolve_jwt_secret();
    let state = AppState::new(
        repos,
        config.auth.session_config(secret),
        config.auth.password_policy(),
    );

    let purged = state.sessions.purge_expired_tokens().await?;
    if purged > 0 {
        tracing::info!(purged, "removed expired refresh tokens");
    }

    let mut server_config = config.server.clone();
    server_config.rate_limit = config.auth.rate_limit();

    let server = HttpServer::with_config(server_config, state);
    let result = server.start().await;

    store.close().await;
    result?;
    Ok(())
}

/// Reset the configured admin account
pub async fn reset_admin(config: AppConfig) -> CliResult<()> {
    let store = open_store(&config).await?;
    let repos = store.repositories();

    ensure_admin_exists(&repos, &config.auth.admin_email, &config.auth.admin_password).await?;
    let user = reset_admin_user(&repos, &config.auth.admin_email, &config.auth.admin_password).await?;
    let revoked = repos.refresh_tokens.revoke_all_for_user(user.id).await?;

    tracing::info!(user_id = user.id, revoked, "admin account reset");
    store.close().await;
    Ok(())
}

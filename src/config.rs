//! Application configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional JSON file and
//! `FLOE_`-prefixed environment variables. Nested keys use `__` in the
//! environment, e.g. `FLOE_AUTH__JWT_SECRET` or `FLOE_SERVER__PORT`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::crypto::{generate_secret, PasswordPolicy};
use crate::auth::jwt::JwtConfig;
use crate::auth::session::SessionConfig;
use crate::http_server::{HttpServerConfig, RateLimit};

/// Config file read when none is given explicitly
pub const DEFAULT_CONFIG_FILE: &str = "floe.json";

const ENV_PREFIX: &str = "FLOE_";

/// Longest accepted token lifetime: ten years
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

/// Token lifetimes, bootstrap credentials and password rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; generated at startup when unset
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,
    /// Revoke refresh tokens on use and issue replacements
    #[serde(default)]
    pub rotate_refresh_tokens: bool,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Requests allowed per client IP within one expiry window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    #[serde(default = "default_rate_limit_expiry")]
    pub rate_limit_expiry_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://floe.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_acquire_timeout() -> u64 {
    5
}

const fn default_access_ttl() -> i64 {
    900 // 15 minutes
}

const fn default_refresh_ttl() -> i64 {
    604_800 // 7 days
}

fn default_admin_email() -> String {
    "admin@floe.cms".to_string()
}

fn default_admin_password() -> String {
    "adminpassword".to_string()
}

const fn default_password_min_length() -> usize {
    8
}

const fn default_rate_limit_requests() -> u32 {
    60
}

const fn default_rate_limit_expiry() -> u64 {
    60
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
            rotate_refresh_tokens: false,
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            password_min_length: default_password_min_length(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_expiry_secs: default_rate_limit_expiry(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl AuthConfig {
    /// The configured secret, or a freshly generated one
    ///
    /// A generated secret lives only as long as the process, so every
    /// outstanding access token becomes invalid on restart.
    pub fn resolve_jwt_secret(&self) -> String {
        match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "no JWT secret configured; generated a random one, tokens will not survive a restart"
                );
                generate_secret()
            }
        }
    }

    /// Session settings with an already resolved secret
    pub fn session_config(&self, secret: String) -> SessionConfig {
        SessionConfig {
            jwt: JwtConfig {
                secret,
                access_token_ttl: chrono::Duration::seconds(self.access_token_ttl_secs),
            },
            refresh_token_ttl: chrono::Duration::seconds(self.refresh_token_ttl_secs),
            rotate_refresh_tokens: self.rotate_refresh_tokens,
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy::with_min_length(self.password_min_length)
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests: self.rate_limit_requests,
            window: Duration::from_secs(self.rate_limit_expiry_secs),
        }
    }

    /// Reject lifetimes and limits the session and rate limiting layers
    /// cannot represent
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("auth.access_token_ttl_secs", self.access_token_ttl_secs, 1, MAX_TOKEN_TTL_SECS)?;
        check_range("auth.refresh_token_ttl_secs", self.refresh_token_ttl_secs, 1, MAX_TOKEN_TTL_SECS)?;
        check_range(
            "auth.rate_limit_requests",
            i64::from(self.rate_limit_requests),
            1,
            i64::from(u32::MAX),
        )?;
        check_range(
            "auth.rate_limit_expiry_secs",
            i64::try_from(self.rate_limit_expiry_secs).unwrap_or(i64::MAX),
            1,
            MAX_TOKEN_TTL_SECS,
        )
    }
}

fn check_range(key: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        })
    }
}

impl AppConfig {
    /// Load configuration from defaults, file and environment.
    ///
    /// An explicitly given file must exist; the default `floe.json` is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, a value cannot be parsed or
    /// a lifetime or rate limit is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::MissingFile(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Json::file(file))
                .merge(Env::prefixed(env_prefix).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))?;
        config.auth.validate()?;
        Ok(config)
    }
}

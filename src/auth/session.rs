//! # Session Management
//!
//! Login, access token validation, refresh and revocation.
//!
//! Access tokens are stateless JWTs; refresh tokens are opaque values whose
//! SHA-256 digest is persisted in the refresh token store. A user may hold
//! any number of live refresh tokens.
//!
//! Login is not transactional: the access token is minted before the refresh
//! row is inserted, but neither is returned unless the insert succeeds.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::crypto::{generate_refresh_token, hash_token, verify_password_blocking};
use super::errors::{AuthError, AuthResult};
use super::jwt::{Claims, JwtConfig, JwtManager};
use super::role::RoleRecord;
use super::store::Repositories;
use super::user::User;

/// Token pair returned on login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// JWT access token (short-lived)
    pub access_token: String,

    /// Opaque refresh token (long-lived)
    pub refresh_token: String,

    /// Access token expiration
    pub expires_at: DateTime<Utc>,
}

/// Result of exchanging a refresh token
#[derive(Debug, Clone, Serialize)]
pub struct TokenRefresh {
    pub access_token: String,

    pub expires_at: DateTime<Utc>,

    /// Replacement refresh token, only when rotation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt: JwtConfig,

    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,

    /// Revoke a refresh token when it is used and hand out a new one
    pub rotate_refresh_tokens: bool,
}

impl SessionConfig {
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            refresh_token_ttl: Duration::days(7),
            rotate_refresh_tokens: false,
        }
    }
}

/// Session manager handles token issuance and validation
#[derive(Clone)]
pub struct SessionManager {
    jwt: JwtManager,
    refresh_token_ttl: Duration,
    rotate_refresh_tokens: bool,
    repos: Repositories,
}

impl SessionManager {
    pub fn new(config: SessionConfig, repos: Repositories) -> Self {
        Self {
            jwt: JwtManager::new(config.jwt),
            refresh_token_ttl: config.refresh_token_ttl,
            rotate_refresh_tokens: config.rotate_refresh_tokens,
            repos,
        }
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let Some(user) = self.repos.users.find_by_email(email).await? else {
            tracing::warn!("login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.active {
            tracing::warn!(user_id = user.id, "login refused: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        if !verify_password_blocking(password, &user.password_hash).await? {
            tracing::warn!(user_id = user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let role = self.role_of(&user).await?;
        let (access_token, expires_at) = self.jwt.issue(&user, role.id, role.name, None)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;

        tracing::info!(user_id = user.id, role = %role.name, "user logged in");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Validate an access token and extract claims
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        self.jwt.validate_token(token)
    }

    /// [`validate_token`](Self::validate_token) at an explicit instant
    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        self.jwt.validate_token_at(token, now)
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The new token carries the user's current role. With rotation on, the
    /// presented token is revoked first and only one concurrent caller wins.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<TokenRefresh> {
        let token_hash = hash_token(refresh_token);
        let now = Utc::now();

        let Some(stored) = self.repos.refresh_tokens.find_active(&token_hash, now).await? else {
            tracing::warn!("refresh refused: unknown, expired or revoked token");
            return Err(AuthError::InvalidRefreshToken);
        };

        let Some(user) = self.repos.users.find_by_id(stored.user_id).await? else {
            tracing::warn!(user_id = stored.user_id, "refresh refused: user no longer exists");
            return Err(AuthError::InvalidRefreshToken);
        };

        if !user.active {
            tracing::warn!(user_id = user.id, "refresh refused: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        let role = self.role_of(&user).await?;

        let rotated = if self.rotate_refresh_tokens {
            if !self
                .repos
                .refresh_tokens
                .revoke_if_active(&token_hash, now)
                .await?
            {
                tracing::warn!(user_id = user.id, "refresh refused: token already used");
                return Err(AuthError::InvalidRefreshToken);
            }
            Some(self.issue_refresh_token(user.id).await?)
        } else {
            None
        };

        let (access_token, expires_at) = self.jwt.issue(&user, role.id, role.name, None)?;

        tracing::info!(user_id = user.id, rotated = rotated.is_some(), "access token refreshed");

        Ok(TokenRefresh {
            access_token,
            expires_at,
            refresh_token: rotated,
        })
    }

    /// Revoke a refresh token (logout)
    ///
    /// Revoking an already revoked token succeeds.
    pub async fn revoke_token(&self, refresh_token: &str) -> AuthResult<()> {
        let token_hash = hash_token(refresh_token);

        if !self.repos.refresh_tokens.revoke(&token_hash).await? {
            return Err(AuthError::TokenNotFound);
        }

        tracing::info!("refresh token revoked");
        Ok(())
    }

    /// Revoke every refresh token of a user
    pub async fn revoke_all_for_user(&self, user_id: i64) -> AuthResult<u64> {
        let count = self.repos.refresh_tokens.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id, count, "revoked all refresh tokens");
        Ok(count)
    }

    /// Delete refresh tokens whose expiry has passed
    pub async fn purge_expired_tokens(&self) -> AuthResult<u64> {
        let count = self.repos.refresh_tokens.delete_expired(Utc::now()).await?;
        tracing::debug!(count, "purged expired refresh tokens");
        Ok(count)
    }

    async fn role_of(&self, user: &User) -> AuthResult<RoleRecord> {
        self.repos
            .roles
            .find_by_id(user.role_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(user_id = user.id, role_id = user.role_id, "user references a missing role");
                AuthError::StorageError(format!("role {} not found", user.role_id))
            })
    }

    async fn issue_refresh_token(&self, user_id: i64) -> AuthResult<String> {
        let refresh_token = generate_refresh_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.refresh_token_ttl)
            .ok_or_else(|| {
                tracing::error!(ttl = %self.refresh_token_ttl, "refresh token expiry overflows");
                AuthError::TokenGenerationFailed
            })?;

        self.repos
            .refresh_tokens
            .create(user_id, &hash_token(&refresh_token), expires_at)
            .await?;

        Ok(refresh_token)
    }
}

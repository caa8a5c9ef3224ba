//! # Refresh Token Store
//!
//! Persisted, opaque, long-lived credentials. Only the SHA-256 digest of a
//! token is stored; the raw value is handed to the client once.
//!
//! A row is live while `revoked = false` and `expires_at > now`. Rows are
//! never updated except for the revoked flag.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::crypto::constant_time_str_eq;
use super::errors::{AuthError, AuthResult};

/// Refresh token row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    /// SHA-256 digest of the raw token, hex
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Refresh token repository trait
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Persist a new, unrevoked token
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshToken>;

    /// Find a live row by digest
    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>>;

    /// Set the revoked flag on the row with this digest, whatever its state.
    /// Returns whether a row matched.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;

    /// Revoke only if the row is still live. Returns whether this call did
    /// the revoking, so exactly one of several concurrent callers wins.
    async fn revoke_if_active(&self, token_hash: &str, now: DateTime<Utc>) -> AuthResult<bool>;

    /// Revoke every token of a user; returns how many rows changed
    async fn revoke_all_for_user(&self, user_id: i64) -> AuthResult<u64>;

    /// Delete rows whose expiry has passed
    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// In-memory refresh token repository for testing
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenRepository {
    tokens: RwLock<Vec<RefreshToken>>,
    next_id: RwLock<i64>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StorageError("Lock poisoned".to_string())
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshToken> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let mut next_id = self.next_id.write().map_err(poisoned)?;

        if tokens.iter().any(|t| t.token_hash == token_hash) {
            return Err(AuthError::StorageError(
                "UNIQUE constraint failed: refresh_tokens.token".to_string(),
            ));
        }

        *next_id += 1;
        let token = RefreshToken {
            id: *next_id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        tokens.push(token.clone());
        Ok(token)
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        Ok(tokens
            .iter()
            .find(|t| constant_time_str_eq(&t.token_hash, token_hash) && t.is_live_at(now))
            .cloned())
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        match tokens
            .iter_mut()
            .find(|t| constant_time_str_eq(&t.token_hash, token_hash))
        {
            Some(token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_if_active(&self, token_hash: &str, now: DateTime<Utc>) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        match tokens
            .iter_mut()
            .find(|t| constant_time_str_eq(&t.token_hash, token_hash) && t.is_live_at(now))
        {
            Some(token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> AuthResult<u64> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let mut count = 0;
        for token in tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let len_before = tokens.len();
        tokens.retain(|t| t.expires_at > now);
        Ok((len_before - tokens.len()) as u64)
    }
}

//! # JWT Token Management
//!
//! Access token issuance and validation.
//!
//! Tokens are HS256 only and validated without touching the store. The
//! expiry boundary is inclusive: a token whose `exp` equals the current
//! second is already expired.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::role::Role;
use super::user::User;

/// JWT claims for access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,

    pub email: String,

    pub role_id: i64,

    /// Role as of issuance; a later role change only shows up after refresh
    pub role_name: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<i64>,

    /// Issued at (Unix epoch seconds)
    pub iat: i64,

    /// Expiration (Unix epoch seconds)
    pub exp: i64,

    /// Subject (user ID as string)
    pub sub: String,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role_name == Role::Admin
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing
    pub secret: String,

    /// Access token lifetime
    pub access_token_ttl: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_ttl: Duration::minutes(15),
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// Create a new JWT manager with the given configuration
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue an access token for a user holding `role`
    ///
    /// Returns the signed token and its expiry.
    pub fn issue(
        &self,
        user: &User,
        role_id: i64,
        role: Role,
        workspace_id: Option<i64>,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        self.issue_at(user, role_id, role, workspace_id, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit issuance instant
    pub fn issue_at(
        &self,
        user: &User,
        role_id: i64,
        role: Role,
        workspace_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        let exp = now
            .checked_add_signed(self.config.access_token_ttl)
            .ok_or_else(|| {
                tracing::error!(ttl = %self.config.access_token_ttl, "access token expiry overflows");
                AuthError::TokenGenerationFailed
            })?;

        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role_id,
            role_name: role,
            workspace_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            sub: user.id.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(error = %e, "failed to sign access token");
                AuthError::TokenGenerationFailed
            })?;

        Ok((token, exp))
    }

    /// Validate an access token and extract claims
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate an access token as of `now`
    ///
    /// Every failure maps to [`AuthError::InvalidToken`]; the cause is only
    /// logged.
    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        // Expiry is checked below so the boundary second counts as expired
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            tracing::debug!(user_id = claims.user_id, exp = claims.exp, "access token expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

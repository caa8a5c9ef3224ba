//! # Auth Errors
//!
//! Error types for the authentication and authorization core.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Authentication Errors
    // ==================

    /// Unknown email or wrong password (generic - don't leak which)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated
    #[error("user account is deactivated")]
    AccountDeactivated,

    /// Current password did not match during a password change
    #[error("Invalid current password")]
    InvalidCurrentPassword,

    /// No Authorization header on a protected route
    #[error("Authorization header required")]
    AuthenticationRequired,

    /// Authorization header present but not `Bearer <token>`
    #[error("Invalid Authorization header format")]
    InvalidAuthorizationHeader,

    // ==================
    // Token Errors
    // ==================

    /// Access token malformed, wrongly signed, wrong algorithm or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Refresh token unknown, expired or revoked
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Revocation target does not exist
    #[error("token not found")]
    TokenNotFound,

    // ==================
    // Authorization Errors
    // ==================

    /// Role does not allow the operation
    #[error("{0}")]
    Forbidden(String),

    /// Caller is not a member of the target workspace
    #[error("Access denied to this workspace")]
    WorkspaceAccessDenied,

    /// Client exceeded its request budget
    #[error("Too many requests")]
    RateLimited,

    // ==================
    // Account Errors
    // ==================

    /// Password does not meet requirements
    #[error("{0}")]
    WeakPassword(String),

    /// Email does not look like an address
    #[error("Invalid email format")]
    InvalidEmail,

    /// Email already registered
    #[error("Email is already taken")]
    EmailAlreadyExists,

    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),

    /// No role record with that name
    #[error("Unknown role: {0}")]
    RoleNotFound(String),

    /// Deleting the user would leave the system without an admin
    #[error("cannot delete the last admin user")]
    LastAdmin,

    /// Demoting or deactivating the user would leave no active admin
    #[error("cannot demote or deactivate the last admin user")]
    LastAdminDemotion,

    #[error("User not found")]
    UserNotFound,

    #[error("Workspace not found")]
    WorkspaceNotFound,

    /// Workspace slug collides with an existing one
    #[error("Workspace slug is already taken")]
    SlugTaken,

    /// Membership row already exists
    #[error("User is already a member of this workspace")]
    AlreadyMember,

    #[error("User is not in this workspace")]
    NotMember,

    // ==================
    // Internal Errors
    // ==================

    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,

    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            AuthError::WeakPassword(_) => 400,
            AuthError::InvalidEmail => 400,
            AuthError::Validation(_) => 400,
            AuthError::RoleNotFound(_) => 400,
            AuthError::LastAdmin => 400,
            AuthError::LastAdminDemotion => 400,

            // 401 Unauthorized
            AuthError::InvalidCredentials => 401,
            AuthError::AccountDeactivated => 401,
            AuthError::InvalidCurrentPassword => 401,
            AuthError::AuthenticationRequired => 401,
            AuthError::InvalidAuthorizationHeader => 401,
            AuthError::InvalidToken => 401,
            AuthError::InvalidRefreshToken => 401,

            // 403 Forbidden
            AuthError::Forbidden(_) => 403,
            AuthError::WorkspaceAccessDenied => 403,

            // 404 Not Found
            AuthError::TokenNotFound => 404,
            AuthError::UserNotFound => 404,
            AuthError::WorkspaceNotFound => 404,
            AuthError::NotMember => 404,

            // 409 Conflict
            AuthError::EmailAlreadyExists => 409,
            AuthError::SlugTaken => 409,
            AuthError::AlreadyMember => 409,

            // 429 Too Many Requests
            AuthError::RateLimited => 429,

            // 500 Internal Server Error
            AuthError::HashingFailed => 500,
            AuthError::TokenGenerationFailed => 500,
            AuthError::StorageError(_) => 500,
        }
    }

    /// Returns whether this error was caused by the caller
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Message safe to hand back to a client
    ///
    /// Internal failures collapse to a generic message so storage details
    /// never reach the response body.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "Internal server error".to_string()
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::StorageError(err.to_string())
    }
}

//! Auth HTTP Routes
//!
//! Login, token refresh and logout.

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::errors::AuthError;

use super::extract::{ApiJson, AuthUser};
use super::response::{ApiResponse, ApiResult, Message};
use super::state::AppState;

/// Auth routes with shared state
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
        .route("/logout", post(logout_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn require_refresh_token(token: &str) -> Result<(), AuthError> {
    if token.is_empty() {
        return Err(AuthError::Validation("Refresh token is required".to_string()));
    }
    Ok(())
}

// ==================
// Handlers
// ==================

async fn login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(AuthError::Validation("Email and password are required".to_string()).into());
    }

    let tokens = state.sessions.login(&request.email, &request.password).await?;

    Ok(ApiResponse::ok(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens.expires_at,
    }))
}

async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<RefreshResponse>>> {
    require_refresh_token(&request.refresh_token)?;

    let refreshed = state.sessions.refresh_token(&request.refresh_token).await?;

    Ok(ApiResponse::ok(RefreshResponse {
        access_token: refreshed.access_token,
        expires_at: refreshed.expires_at,
        refresh_token: refreshed.refresh_token,
    }))
}

async fn logout_handler(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<Message>>> {
    require_refresh_token(&request.refresh_token)?;

    state.sessions.revoke_token(&request.refresh_token).await?;
    tracing::info!(user_id = claims.user_id, "user logged out");

    Ok(ApiResponse::ok(Message::new("Logged out successfully")))
}

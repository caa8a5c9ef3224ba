//! User HTTP Routes
//!
//! Self-service endpoints under `/me` for any authenticated caller and
//! administrative user management under `/users`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::accounts::{CreateUser, ProfileUpdate, UserPage, UserUpdate};
use crate::auth::workspace::Workspace;
use crate::auth::{Role, User};

use super::extract::{AdminUser, ApiJson, ApiPath, AuthUser};
use super::response::{ApiResponse, ApiResult, Message};
use super::state::AppState;

/// User routes with shared state
pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/me", get(me_handler).put(update_me_handler))
        .route("/me/password", put(change_password_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub workspaces: Vec<Workspace>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub role: Option<String>,
}

// ==================
// Self-service Handlers
// ==================

async fn me_handler(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<ApiResponse<MeResponse>>> {
    let user = state.accounts.get_user(claims.user_id).await?;
    let workspaces = state.accounts.user_workspaces(claims.user_id).await?;

    Ok(ApiResponse::ok(MeResponse { user, workspaces }))
}

async fn update_me_handler(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.accounts.update_profile(claims.user_id, update).await?;
    Ok(ApiResponse::ok(user))
}

async fn change_password_handler(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<Message>>> {
    state
        .accounts
        .change_password(claims.user_id, &request.old_password, &request.new_password)
        .await?;

    Ok(ApiResponse::ok(Message::new("Password changed successfully")))
}

// ==================
// Admin Handlers
// ==================

async fn list_users_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<ApiResponse<UserPage>>> {
    let role = match query.role.as_deref().filter(|r| !r.is_empty()) {
        Some(name) => Some(name.parse::<Role>()?),
        None => None,
    };

    let page = state.accounts.list_users(role, query.limit, query.offset).await?;
    Ok(ApiResponse::ok(page))
}

async fn create_user_handler(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    ApiJson(request): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    let user = state.accounts.create_user(request).await?;
    tracing::debug!(admin_id = claims.user_id, user_id = user.id, "admin created user");

    Ok((StatusCode::CREATED, ApiResponse::ok(user)))
}

async fn get_user_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.accounts.get_user(id).await?;
    Ok(ApiResponse::ok(user))
}

async fn update_user_handler(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.accounts.update_user(id, update).await?;
    tracing::debug!(admin_id = claims.user_id, user_id = id, "admin updated user");

    Ok(ApiResponse::ok(user))
}

async fn delete_user_handler(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Message>>> {
    state.accounts.delete_user(id).await?;
    tracing::debug!(admin_id = claims.user_id, user_id = id, "admin deleted user");

    Ok(ApiResponse::ok(Message::new("User deleted successfully")))
}

//! Workspace HTTP Routes
//!
//! Workspace and membership administration, plus the workspace-scoped
//! member listing gated by [`require_workspace`].

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::accounts::{CreateWorkspace, WorkspaceUpdate};
use crate::auth::workspace::{Membership, Workspace};

use super::extract::{require_workspace, AdminUser, ApiJson, ApiPath, WorkspaceScope};
use super::response::{ApiResponse, ApiResult, Message};
use super::state::AppState;

/// Workspace routes with shared state
pub fn workspace_routes(state: AppState) -> Router {
    let scoped = Router::new()
        .route("/members", get(scoped_members_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_workspace));

    Router::new()
        .route("/workspaces", post(create_workspace_handler).get(list_workspaces_handler))
        .route(
            "/workspaces/:id",
            get(get_workspace_handler)
                .put(update_workspace_handler)
                .delete(delete_workspace_handler),
        )
        .route("/workspaces/:id/users", post(add_member_handler))
        .route("/workspaces/:id/users/:user_id", delete(remove_member_handler))
        .merge(scoped)
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub workspace_id: i64,
    pub members: Vec<Membership>,
}

// ==================
// Handlers
// ==================

async fn create_workspace_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(request): ApiJson<CreateWorkspace>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Workspace>>)> {
    let workspace = state.accounts.create_workspace(request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(workspace)))
}

async fn list_workspaces_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<ApiResponse<Vec<Workspace>>>> {
    let workspaces = state.accounts.list_workspaces().await?;
    Ok(ApiResponse::ok(workspaces))
}

async fn get_workspace_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Workspace>>> {
    let workspace = state.accounts.get_workspace(id).await?;
    Ok(ApiResponse::ok(workspace))
}

async fn update_workspace_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<WorkspaceUpdate>,
) -> ApiResult<Json<ApiResponse<Workspace>>> {
    let workspace = state.accounts.update_workspace(id, update).await?;
    Ok(ApiResponse::ok(workspace))
}

async fn delete_workspace_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<Message>>> {
    state.accounts.delete_workspace(id).await?;
    Ok(ApiResponse::ok(Message::new("Workspace deleted successfully")))
}

async fn add_member_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Message>>)> {
    state.accounts.add_member(id, request.user_id).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(Message::new("User added to workspace successfully")),
    ))
}

async fn remove_member_handler(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath((id, user_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<ApiResponse<Message>>> {
    state.accounts.remove_member(id, user_id).await?;

    Ok(ApiResponse::ok(Message::new("User removed from workspace successfully")))
}

async fn scoped_members_handler(
    State(state): State<AppState>,
    Extension(WorkspaceScope(workspace_id)): Extension<WorkspaceScope>,
) -> ApiResult<Json<ApiResponse<MembersResponse>>> {
    let members = state.accounts.workspace_members(workspace_id).await?;
    Ok(ApiResponse::ok(MembersResponse {
        workspace_id,
        members,
    }))
}

//! Request extractors and gates
//!
//! `AuthUser` validates the bearer token; `AdminUser` additionally requires
//! the admin role. `require_workspace` guards workspace-scoped routes.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::auth::errors::AuthError;
use crate::auth::jwt::Claims;

use super::response::ApiError;
use super::state::AppState;

/// JSON body whose rejections render as error envelopes
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections render as error envelopes
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Claims of an authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Claims of an authenticated admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

/// Workspace a request was authorized for by [`require_workspace`]
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceScope(pub i64);

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::AuthenticationRequired)?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidAuthorizationHeader)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.sessions.validate_token(token)?;
        Ok(AuthUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        state.policy.require_admin(&claims)?;
        Ok(AdminUser(claims))
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    pub workspace_id: Option<String>,
}

/// Gate for routes scoped by `?workspace_id=`
///
/// Missing or malformed ids are rejected with 400; callers without access
/// with 403. On success the id is available as a [`WorkspaceScope`]
/// extension.
pub async fn require_workspace(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<WorkspaceQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    let workspace_id = match query.workspace_id.as_deref().filter(|id| !id.is_empty()) {
        None => {
            return ApiError(AuthError::Validation("Workspace ID required".to_string()))
                .into_response()
        }
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                return ApiError(AuthError::Validation("Invalid workspace ID".to_string()))
                    .into_response()
            }
        },
    };

    if let Err(err) = state.policy.authorize_workspace(&claims, workspace_id).await {
        return ApiError(err).into_response();
    }

    request.extensions_mut().insert(WorkspaceScope(workspace_id));
    next.run(request).await
}

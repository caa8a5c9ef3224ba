//! # Access Policy
//!
//! Role and workspace checks applied to validated claims. This is the only
//! place that interprets [`Role`] values.

use std::sync::Arc;

use super::errors::{AuthError, AuthResult};
use super::jwt::Claims;
use super::role::Role;
use super::workspace::WorkspaceRepository;

/// Access policy evaluator
#[derive(Clone)]
pub struct AccessPolicy {
    workspaces: Arc<dyn WorkspaceRepository>,
}

impl AccessPolicy {
    pub fn new(workspaces: Arc<dyn WorkspaceRepository>) -> Self {
        Self { workspaces }
    }

    /// Admin-only operations
    pub fn require_admin(&self, claims: &Claims) -> AuthResult<()> {
        if claims.role_name == Role::Admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Operations open to editors and admins
    pub fn require_editor(&self, claims: &Claims) -> AuthResult<()> {
        match claims.role_name {
            Role::Admin | Role::Editor => Ok(()),
            Role::Viewer => Err(AuthError::Forbidden(
                "Editor or admin access required".to_string(),
            )),
        }
    }

    /// Workspace-scoped access
    ///
    /// Admins reach every workspace. Everyone else needs a membership row at
    /// the time of the request, so revoking a membership takes effect
    /// immediately.
    pub async fn authorize_workspace(&self, claims: &Claims, workspace_id: i64) -> AuthResult<()> {
        if claims.role_name == Role::Admin {
            return Ok(());
        }

        if self.workspaces.is_member(claims.user_id, workspace_id).await? {
            Ok(())
        } else {
            tracing::debug!(user_id = claims.user_id, workspace_id, "workspace access denied");
            Err(AuthError::WorkspaceAccessDenied)
        }
    }

    /// Mutations on authored resources
    pub fn require_author_or_admin(&self, claims: &Claims, author_id: i64) -> AuthResult<()> {
        if claims.role_name == Role::Admin || claims.user_id == author_id {
            Ok(())
        } else {
            Err(AuthError::Forbidden(
                "You can only modify your own content".to_string(),
            ))
        }
    }
}

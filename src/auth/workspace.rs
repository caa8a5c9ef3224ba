//! # Workspaces and Memberships
//!
//! Tenant boundaries and the user/workspace join used for workspace-scoped
//! authorization.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::{AuthError, AuthResult};

/// Workspace model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    /// Unique, URL-safe
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a workspace
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// Membership row, unique per (user, workspace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub user_id: i64,
    pub workspace_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Workspace repository trait
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Workspace>>;

    async fn find_by_slug(&self, slug: &str) -> AuthResult<Option<Workspace>>;

    /// Insert a workspace; `SlugTaken` if the slug exists
    async fn create(&self, workspace: NewWorkspace) -> AuthResult<Workspace>;

    async fn list(&self) -> AuthResult<Vec<Workspace>>;

    /// Persist name, slug and description; `SlugTaken` if another workspace
    /// holds the slug, `WorkspaceNotFound` if the row is gone
    async fn update(&self, workspace: &Workspace) -> AuthResult<()>;

    /// Delete a workspace together with its memberships; returns whether
    /// it existed
    async fn delete(&self, id: i64) -> AuthResult<bool>;

    /// Insert a membership; `AlreadyMember` if the pair exists
    async fn add_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<Membership>;

    /// Remove a membership; returns whether a row was removed
    async fn remove_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool>;

    async fn is_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool>;

    async fn workspaces_for_user(&self, user_id: i64) -> AuthResult<Vec<Workspace>>;

    async fn members_of(&self, workspace_id: i64) -> AuthResult<Vec<Membership>>;
}

/// Lowercase, hyphen-separated slug built from a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == ' ' || c == '-' {
            pending_hyphen = true;
        }
    }

    slug
}

/// In-memory workspace repository for testing
#[derive(Debug, Default)]
pub struct InMemoryWorkspaceRepository {
    workspaces: RwLock<Vec<Workspace>>,
    memberships: RwLock<Vec<Membership>>,
}

impl InMemoryWorkspaceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StorageError("Lock poisoned".to_string())
}

#[async_trait]
impl WorkspaceRepository for InMemoryWorkspaceRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Workspace>> {
        let workspaces = self.workspaces.read().map_err(poisoned)?;
        Ok(workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> AuthResult<Option<Workspace>> {
        let workspaces = self.workspaces.read().map_err(poisoned)?;
        Ok(workspaces.iter().find(|w| w.slug == slug).cloned())
    }

    async fn create(&self, new: NewWorkspace) -> AuthResult<Workspace> {
        let mut workspaces = self.workspaces.write().map_err(poisoned)?;

        if workspaces.iter().any(|w| w.slug == new.slug) {
            return Err(AuthError::SlugTaken);
        }

        let workspace = Workspace {
            id: workspaces.iter().map(|w| w.id).max().unwrap_or(0) + 1,
            name: new.name,
            slug: new.slug,
            description: new.description,
            created_at: Utc::now(),
        };
        workspaces.push(workspace.clone());
        Ok(workspace)
    }

    async fn list(&self) -> AuthResult<Vec<Workspace>> {
        let workspaces = self.workspaces.read().map_err(poisoned)?;
        Ok(workspaces.clone())
    }

    async fn update(&self, workspace: &Workspace) -> AuthResult<()> {
        let mut workspaces = self.workspaces.write().map_err(poisoned)?;

        if workspaces
            .iter()
            .any(|w| w.id != workspace.id && w.slug == workspace.slug)
        {
            return Err(AuthError::SlugTaken);
        }

        let existing = workspaces
            .iter_mut()
            .find(|w| w.id == workspace.id)
            .ok_or(AuthError::WorkspaceNotFound)?;
        existing.name = workspace.name.clone();
        existing.slug = workspace.slug.clone();
        existing.description = workspace.description.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> AuthResult<bool> {
        let mut workspaces = self.workspaces.write().map_err(poisoned)?;
        let len_before = workspaces.len();
        workspaces.retain(|w| w.id != id);
        if workspaces.len() == len_before {
            return Ok(false);
        }

        let mut memberships = self.memberships.write().map_err(poisoned)?;
        memberships.retain(|m| m.workspace_id != id);
        Ok(true)
    }

    async fn add_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<Membership> {
        let mut memberships = self.memberships.write().map_err(poisoned)?;

        if memberships
            .iter()
            .any(|m| m.user_id == user_id && m.workspace_id == workspace_id)
        {
            return Err(AuthError::AlreadyMember);
        }

        let membership = Membership {
            user_id,
            workspace_id,
            created_at: Utc::now(),
        };
        memberships.push(membership.clone());
        Ok(membership)
    }

    async fn remove_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool> {
        let mut memberships = self.memberships.write().map_err(poisoned)?;
        let len_before = memberships.len();
        memberships.retain(|m| !(m.user_id == user_id && m.workspace_id == workspace_id));
        Ok(memberships.len() != len_before)
    }

    async fn is_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool> {
        let memberships = self.memberships.read().map_err(poisoned)?;
        Ok(memberships
            .iter()
            .any(|m| m.user_id == user_id && m.workspace_id == workspace_id))
    }

    async fn workspaces_for_user(&self, user_id: i64) -> AuthResult<Vec<Workspace>> {
        let ids: Vec<i64> = {
            let memberships = self.memberships.read().map_err(poisoned)?;
            memberships
                .iter()
                .filter(|m| m.user_id == user_id)
                .map(|m| m.workspace_id)
                .collect()
        };

        let workspaces = self.workspaces.read().map_err(poisoned)?;
        Ok(workspaces
            .iter()
            .filter(|w| ids.contains(&w.id))
            .cloned()
            .collect())
    }

    async fn members_of(&self, workspace_id: i64) -> AuthResult<Vec<Membership>> {
        let memberships = self.memberships.read().map_err(poisoned)?;
        Ok(memberships
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}

//! # Account Administration
//!
//! User lifecycle and workspace membership management on top of the
//! repositories. A delete that would remove the last active administrator
//! is refused with [`AuthError::LastAdmin`]; a demotion or deactivation
//! with [`AuthError::LastAdminDemotion`].

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::crypto::{hash_password_blocking, verify_password_blocking, PasswordPolicy};
use super::errors::{AuthError, AuthResult};
use super::role::{Role, RoleRecord};
use super::store::Repositories;
use super::user::{NewUser, User};
use super::workspace::{slugify, Membership, NewWorkspace, Workspace};

/// Default page size for user listings
pub const DEFAULT_PAGE_SIZE: i64 = 10;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

/// Check an address against the accepted email shape
pub fn validate_email(email: &str) -> AuthResult<()> {
    match email_regex() {
        Some(re) if re.is_match(email) => Ok(()),
        _ => Err(AuthError::InvalidEmail),
    }
}

/// Request to create a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Viewer
}

/// Administrative user update; absent or empty fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Self-service profile update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request to create a workspace; the slug defaults to one derived from the name
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Workspace update; absent or empty fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// One page of users
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    repos: Repositories,
    policy: PasswordPolicy,
}

impl AccountService {
    pub fn new(repos: Repositories, policy: PasswordPolicy) -> Self {
        Self { repos, policy }
    }

    // ==================
    // Users
    // ==================

    pub async fn create_user(&self, request: CreateUser) -> AuthResult<User> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        validate_email(&request.email)?;
        self.policy.validate(&request.password)?;

        if self.repos.users.email_exists(&request.email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let role = self.role_record(request.role).await?;
        let password_hash = hash_password_blocking(&request.password).await?;

        let user = self
            .repos
            .users
            .create(NewUser {
                email: request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                role_id: role.id,
                active: true,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %role.name, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> AuthResult<User> {
        self.repos
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// List users, optionally filtered by role
    ///
    /// Non-positive limits fall back to the default page size and negative
    /// offsets to zero.
    pub async fn list_users(
        &self,
        role: Option<Role>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AuthResult<UserPage> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = offset.filter(|o| *o >= 0).unwrap_or(0);

        let role_id = match role {
            Some(role) => Some(self.role_record(role).await?.id),
            None => None,
        };

        let (users, total) = self.repos.users.list(role_id, limit, offset).await?;

        Ok(UserPage {
            users,
            total,
            limit,
            offset,
        })
    }

    pub async fn update_user(&self, id: i64, update: UserUpdate) -> AuthResult<User> {
        let mut user = self.get_user(id).await?;
        let admin = self.role_record(Role::Admin).await?;

        let new_role = match update.role {
            Some(role) => Some(self.role_record(role).await?),
            None => None,
        };

        self.apply_email(&mut user, update.email).await?;
        apply_name(&mut user.first_name, update.first_name);
        apply_name(&mut user.last_name, update.last_name);
        if let Some(role) = new_role {
            user.role_id = role.id;
        }
        if let Some(active) = update.active {
            user.active = active;
        }

        self.repos.users.update_guarded(&user, admin.id).await?;
        tracing::info!(user_id = user.id, "user updated");

        self.get_user(id).await
    }

    pub async fn update_profile(&self, id: i64, update: ProfileUpdate) -> AuthResult<User> {
        let mut user = self.get_user(id).await?;

        self.apply_email(&mut user, update.email).await?;
        apply_name(&mut user.first_name, update.first_name);
        apply_name(&mut user.last_name, update.last_name);

        self.repos.users.update(&user).await?;
        self.get_user(id).await
    }

    /// Change a user's own password
    ///
    /// The stored hash is untouched unless `current` verifies.
    pub async fn change_password(&self, id: i64, current: &str, new: &str) -> AuthResult<()> {
        if current.is_empty() || new.is_empty() {
            return Err(AuthError::Validation(
                "Old password and new password are required".to_string(),
            ));
        }
        self.policy.validate(new)?;

        let mut user = self.get_user(id).await?;

        if !verify_password_blocking(current, &user.password_hash).await? {
            tracing::warn!(user_id = id, "password change refused: wrong current password");
            return Err(AuthError::InvalidCurrentPassword);
        }

        user.password_hash = hash_password_blocking(new).await?;
        self.repos.users.update(&user).await?;

        tracing::info!(user_id = id, "password changed");
        Ok(())
    }

    /// Soft-delete a user and revoke all of their refresh tokens
    ///
    /// The last active admin cannot be deleted.
    pub async fn delete_user(&self, id: i64) -> AuthResult<()> {
        let admin = self.role_record(Role::Admin).await?;

        self.repos.users.soft_delete(id, admin.id).await?;
        let revoked = self.repos.refresh_tokens.revoke_all_for_user(id).await?;

        tracing::info!(user_id = id, revoked_tokens = revoked, "user deleted");
        Ok(())
    }

    pub async fn user_workspaces(&self, id: i64) -> AuthResult<Vec<Workspace>> {
        self.repos.workspaces.workspaces_for_user(id).await
    }

    // ==================
    // Workspaces
    // ==================

    pub async fn create_workspace(&self, request: CreateWorkspace) -> AuthResult<Workspace> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }

        let slug = match request.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slugify(slug),
            _ => slugify(name),
        };
        if slug.is_empty() {
            return Err(AuthError::Validation(
                "Slug must contain letters or digits".to_string(),
            ));
        }

        let workspace = self
            .repos
            .workspaces
            .create(NewWorkspace {
                name: name.to_string(),
                slug,
                description: request.description,
            })
            .await?;

        tracing::info!(workspace_id = workspace.id, slug = %workspace.slug, "workspace created");
        Ok(workspace)
    }

    pub async fn get_workspace(&self, id: i64) -> AuthResult<Workspace> {
        self.repos
            .workspaces
            .find_by_id(id)
            .await?
            .ok_or(AuthError::WorkspaceNotFound)
    }

    pub async fn list_workspaces(&self) -> AuthResult<Vec<Workspace>> {
        self.repos.workspaces.list().await
    }

    pub async fn update_workspace(&self, id: i64, update: WorkspaceUpdate) -> AuthResult<Workspace> {
        let mut workspace = self.get_workspace(id).await?;

        if let Some(name) = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            workspace.name = name.to_string();
        }
        if let Some(slug) = update.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let slug = slugify(slug);
            if slug.is_empty() {
                return Err(AuthError::Validation(
                    "Slug must contain letters or digits".to_string(),
                ));
            }
            workspace.slug = slug;
        }
        apply_name(&mut workspace.description, update.description);

        self.repos.workspaces.update(&workspace).await?;
        tracing::info!(workspace_id = id, slug = %workspace.slug, "workspace updated");

        self.get_workspace(id).await
    }

    /// Delete a workspace and every membership in it
    pub async fn delete_workspace(&self, id: i64) -> AuthResult<()> {
        if !self.repos.workspaces.delete(id).await? {
            return Err(AuthError::WorkspaceNotFound);
        }
        tracing::info!(workspace_id = id, "workspace deleted");
        Ok(())
    }

    pub async fn add_member(&self, workspace_id: i64, user_id: i64) -> AuthResult<Membership> {
        self.get_workspace(workspace_id).await?;
        self.get_user(user_id).await?;

        let membership = self.repos.workspaces.add_member(user_id, workspace_id).await?;
        tracing::info!(workspace_id, user_id, "member added");
        Ok(membership)
    }

    pub async fn remove_member(&self, workspace_id: i64, user_id: i64) -> AuthResult<()> {
        if !self.repos.workspaces.remove_member(user_id, workspace_id).await? {
            return Err(AuthError::NotMember);
        }
        tracing::info!(workspace_id, user_id, "member removed");
        Ok(())
    }

    pub async fn workspace_members(&self, workspace_id: i64) -> AuthResult<Vec<Membership>> {
        self.get_workspace(workspace_id).await?;
        self.repos.workspaces.members_of(workspace_id).await
    }

    async fn role_record(&self, role: Role) -> AuthResult<RoleRecord> {
        self.repos
            .roles
            .find_by_name(role)
            .await?
            .ok_or_else(|| AuthError::RoleNotFound(role.to_string()))
    }

    async fn apply_email(&self, user: &mut User, email: Option<String>) -> AuthResult<()> {
        let Some(email) = email.filter(|e| !e.is_empty() && *e != user.email) else {
            return Ok(());
        };

        validate_email(&email)?;
        if self.repos.users.email_exists(&email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        user.email = email;
        Ok(())
    }
}

fn apply_name(field: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *field = value;
    }
}

//! # Bootstrap
//!
//! Seeds roles, the initial administrator and the default workspace.
//! Every step checks for an existing row first, so running it on every
//! start is safe.

use super::crypto::hash_password_blocking;
use super::errors::{AuthError, AuthResult};
use super::role::{Role, RoleRecord};
use super::store::Repositories;
use super::user::{NewUser, User};
use super::workspace::{NewWorkspace, Workspace};

pub const DEFAULT_WORKSPACE_SLUG: &str = "default";

/// What a bootstrap run found or created
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// The configured admin, or the first active admin when that account
    /// has been deleted
    pub admin: User,
    pub workspace: Workspace,
    pub created_admin: bool,
}

/// Ensure the role set, the admin account and the default workspace exist
///
/// An existing admin account is left untouched, including its password.
/// A deleted one is not recreated: its email stays reserved, so the run
/// reports another active admin instead.
pub async fn ensure_admin_exists(
    repos: &Repositories,
    email: &str,
    password: &str,
) -> AuthResult<BootstrapReport> {
    let mut admin_role = None;
    for role in Role::ALL {
        let record = ensure_role(repos, role).await?;
        if role == Role::Admin {
            admin_role = Some(record);
        }
    }
    let admin_role = admin_role.ok_or_else(|| AuthError::RoleNotFound(Role::Admin.to_string()))?;

    let (admin, created_admin) = match repos.users.find_by_email(email).await? {
        Some(user) => (user, false),
        None if repos.users.email_exists(email).await? => {
            tracing::warn!(email, "configured admin account was deleted, not recreating it");
            (first_active_admin(repos, admin_role.id).await?, false)
        }
        None => {
            let password_hash = hash_password_blocking(password).await?;
            let user = repos
                .users
                .create(NewUser {
                    email: email.to_string(),
                    password_hash,
                    first_name: "Admin".to_string(),
                    last_name: "User".to_string(),
                    role_id: admin_role.id,
                    active: true,
                })
                .await?;
            tracing::info!(user_id = user.id, email, "created admin user");
            (user, true)
        }
    };

    let workspace = match repos.workspaces.find_by_slug(DEFAULT_WORKSPACE_SLUG).await? {
        Some(workspace) => workspace,
        None => {
            let workspace = repos
                .workspaces
                .create(NewWorkspace {
                    name: "Default".to_string(),
                    slug: DEFAULT_WORKSPACE_SLUG.to_string(),
                    description: "Default workspace".to_string(),
                })
                .await?;
            tracing::info!(workspace_id = workspace.id, "created default workspace");
            workspace
        }
    };

    if admin.email == email && !repos.workspaces.is_member(admin.id, workspace.id).await? {
        repos.workspaces.add_member(admin.id, workspace.id).await?;
    }

    Ok(BootstrapReport {
        admin,
        workspace,
        created_admin,
    })
}

/// Re-hash the admin password and re-activate the account
pub async fn reset_admin_user(repos: &Repositories, email: &str, password: &str) -> AuthResult<User> {
    let mut user = repos
        .users
        .find_by_email(email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    user.password_hash = hash_password_blocking(password).await?;
    user.active = true;
    repos.users.update(&user).await?;

    tracing::info!(user_id = user.id, email, "admin user reset");
    Ok(user)
}

async fn first_active_admin(repos: &Repositories, admin_role_id: i64) -> AuthResult<User> {
    const PAGE: i64 = 50;
    let mut offset = 0;
    loop {
        let (page, _) = repos.users.list(Some(admin_role_id), PAGE, offset).await?;
        if page.is_empty() {
            return Err(AuthError::UserNotFound);
        }
        if let Some(user) = page.iter().find(|u| u.active) {
            return Ok(user.clone());
        }
        offset += page.len() as i64;
    }
}

async fn ensure_role(repos: &Repositories, role: Role) -> AuthResult<RoleRecord> {
    match repos.roles.find_by_name(role).await? {
        Some(record) => Ok(record),
        None => {
            let record = repos.roles.create(role).await?;
            tracing::info!(role = %role, role_id = record.id, "created role");
            Ok(record)
        }
    }
}

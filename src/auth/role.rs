//! # Roles
//!
//! The fixed role set and its persisted record.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// Global role carried by every user and embedded in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Editor, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Description stored alongside the role record
    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator with full access",
            Role::Editor => "Editor with content management access",
            Role::Viewer => "Viewer with read-only access",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(AuthError::RoleNotFound(other.to_string())),
        }
    }
}

/// Persisted role row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: Role,
    pub description: String,
}

/// Role repository trait
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<RoleRecord>>;

    async fn find_by_name(&self, role: Role) -> AuthResult<Option<RoleRecord>>;

    /// Insert a role row; fails if the name already exists
    async fn create(&self, role: Role) -> AuthResult<RoleRecord>;
}

/// In-memory role repository for testing
#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    roles: RwLock<Vec<RoleRecord>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<RoleRecord>> {
        let roles = self.roles.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        Ok(roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_name(&self, role: Role) -> AuthResult<Option<RoleRecord>> {
        let roles = self.roles.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        Ok(roles.iter().find(|r| r.name == role).cloned())
    }

    async fn create(&self, role: Role) -> AuthResult<RoleRecord> {
        let mut roles = self.roles.write().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;

        if roles.iter().any(|r| r.name == role) {
            return Err(AuthError::StorageError(format!(
                "UNIQUE constraint failed: roles.name ({role})"
            )));
        }

        let record = RoleRecord {
            id: roles.len() as i64 + 1,
            name: role,
            description: role.description().to_string(),
        };
        roles.push(record.clone());
        Ok(record)
    }
}

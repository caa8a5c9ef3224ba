//! Store handles shared by the session manager, bootstrap and account service.

use std::sync::Arc;

use super::refresh::{InMemoryRefreshTokenRepository, RefreshTokenRepository};
use super::role::{InMemoryRoleRepository, RoleRepository};
use super::user::{InMemoryUserRepository, UserRepository};
use super::workspace::{InMemoryWorkspaceRepository, WorkspaceRepository};

/// Bundle of repository trait objects backed by one store
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub workspaces: Arc<dyn WorkspaceRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl Repositories {
    /// Fresh, empty in-memory store
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            roles: Arc::new(InMemoryRoleRepository::new()),
            workspaces: Arc::new(InMemoryWorkspaceRepository::new()),
            refresh_tokens: Arc::new(InMemoryRefreshTokenRepository::new()),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

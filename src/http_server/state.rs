//! Shared handler state

use crate::auth::crypto::PasswordPolicy;
use crate::auth::{AccessPolicy, AccountService, Repositories, SessionConfig, SessionManager};

/// State shared by every route; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub accounts: AccountService,
    pub policy: AccessPolicy,
}

impl AppState {
    /// Wire the session manager, account service and policy to one store
    pub fn new(repos: Repositories, session: SessionConfig, password_policy: PasswordPolicy) -> Self {
        Self {
            policy: AccessPolicy::new(repos.workspaces.clone()),
            accounts: AccountService::new(repos.clone(), password_policy),
            sessions: SessionManager::new(session, repos),
        }
    }
}

//! # User Management
//!
//! User model and repository for authentication.
//! Users are soft-deleted: a deleted row keeps its id and email and stays
//! out of every lookup.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::{AuthError, AuthResult};

/// User model
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user identifier
    pub id: i64,

    /// Email address, unique, compared literally
    pub email: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    /// Foreign key into the roles table
    pub role_id: i64,

    /// Inactive users cannot log in or refresh
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: i64,
    pub active: bool,
}

/// User repository trait
///
/// Abstracts storage operations for users. Lookups ignore soft-deleted
/// rows; email uniqueness does not.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their ID
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<User>>;

    /// Find a user by their email (exact match)
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Check if an email is already registered, deleted accounts included
    async fn email_exists(&self, email: &str) -> AuthResult<bool>;

    /// Create a new user
    async fn create(&self, user: NewUser) -> AuthResult<User>;

    /// Persist every mutable column of an existing user
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Like `update`, but fails with `LastAdminDemotion` when the write
    /// would leave no active, live user holding `admin_role_id`.
    ///
    /// The check and the write happen as one atomic step.
    async fn update_guarded(&self, user: &User, admin_role_id: i64) -> AuthResult<()>;

    /// Mark a user deleted
    ///
    /// Fails with `LastAdmin`, without writing, when the user is the only
    /// active, live holder of `admin_role_id`.
    async fn soft_delete(&self, id: i64, admin_role_id: i64) -> AuthResult<()>;

    /// Page through users, optionally filtered by role; returns (page, total)
    async fn list(
        &self,
        role_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AuthResult<(Vec<User>, i64)>;
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    deleted: bool,
}

impl StoredUser {
    fn holds_active(&self, role_id: i64) -> bool {
        !self.deleted && self.user.active && self.user.role_id == role_id
    }
}

/// True when `id` is the only active, live holder of `role_id`
fn is_sole_holder(users: &[StoredUser], id: i64, role_id: i64) -> bool {
    let mut holders = users.iter().filter(|u| u.holds_active(role_id));
    match (holders.next(), holders.next()) {
        (Some(only), None) => only.user.id == id,
        _ => false,
    }
}

/// In-memory user repository for testing
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<StoredUser>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        Ok(users
            .iter()
            .find(|u| !u.deleted && u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        Ok(users
            .iter()
            .find(|u| !u.deleted && u.user.email == email)
            .map(|u| u.user.clone()))
    }

    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        let users = self.users.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        // Deleted rows keep their address
        Ok(users.iter().any(|u| u.user.email == email))
    }

    async fn create(&self, new_user: NewUser) -> AuthResult<User> {
        let mut users = self.users.write().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;

        // The unique index covers deleted rows too
        if users.iter().any(|u| u.user.email == new_user.email) {
            return Err(AuthError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = User {
            id: users.len() as i64 + 1,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role_id: new_user.role_id,
            active: new_user.active,
            created_at: now,
            updated_at: now,
        };
        users.push(StoredUser {
            user: user.clone(),
            deleted: false,
        });
        Ok(user)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let mut users = self.users.write().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;
        write_user(&mut users, user)
    }

    async fn update_guarded(&self, user: &User, admin_role_id: i64) -> AuthResult<()> {
        let mut users = self.users.write().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;

        let keeps_admin = user.active && user.role_id == admin_role_id;
        if !keeps_admin && is_sole_holder(&users, user.id, admin_role_id) {
            return Err(AuthError::LastAdminDemotion);
        }
        write_user(&mut users, user)
    }

    async fn soft_delete(&self, id: i64, admin_role_id: i64) -> AuthResult<()> {
        let mut users = self.users.write().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;

        if is_sole_holder(&users, id, admin_role_id) {
            return Err(AuthError::LastAdmin);
        }

        match users.iter_mut().find(|u| !u.deleted && u.user.id == id) {
            Some(existing) => {
                existing.deleted = true;
                Ok(())
            }
            None => Err(AuthError::UserNotFound),
        }
    }

    async fn list(
        &self,
        role_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AuthResult<(Vec<User>, i64)> {
        let users = self.users.read().map_err(|_| {
            AuthError::StorageError("Lock poisoned".to_string())
        })?;

        let matching: Vec<&User> = users
            .iter()
            .filter(|u| !u.deleted && role_id.map_or(true, |r| u.user.role_id == r))
            .map(|u| &u.user)
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }
}

fn write_user(users: &mut [StoredUser], user: &User) -> AuthResult<()> {
    if users
        .iter()
        .any(|u| u.user.id != user.id && u.user.email == user.email)
    {
        return Err(AuthError::EmailAlreadyExists);
    }

    match users.iter_mut().find(|u| !u.deleted && u.user.id == user.id) {
        Some(existing) => {
            existing.user = user.clone();
            existing.user.updated_at = Utc::now();
            Ok(())
        }
        None => Err(AuthError::UserNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_ROLE: i64 = 1;

    fn new_user(email: &str, role_id: i64) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role_id,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryUserRepository::new();

        let user = repo.create(new_user("test@example.com", 1)).await.unwrap();

        let found = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "test@example.com");
        assert!(repo.find_by_email("test@example.com").await.unwrap().is_some());

        // Exact match only
        assert!(repo.find_by_email("TEST@example.com").await.unwrap().is_none());

        assert!(repo.email_exists("test@example.com").await.unwrap());
        assert!(!repo.email_exists("other@example.com").await.unwrap());

        assert!(matches!(
            repo.create(new_user("test@example.com", 2)).await,
            Err(AuthError::EmailAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_user() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("gone@example.com", 2)).await.unwrap();

        repo.soft_delete(user.id, ADMIN_ROLE).await.unwrap();

        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
        assert!(repo.find_by_email("gone@example.com").await.unwrap().is_none());
        assert!(matches!(
            repo.soft_delete(user.id, ADMIN_ROLE).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_sole_active_admin_cannot_be_removed() {
        let repo = InMemoryUserRepository::new();
        let first = repo.create(new_user("a@example.com", ADMIN_ROLE)).await.unwrap();
        let mut second = repo.create(new_user("b@example.com", ADMIN_ROLE)).await.unwrap();

        // A deactivated admin does not count
        second.active = false;
        repo.update_guarded(&second, ADMIN_ROLE).await.unwrap();

        assert!(matches!(
            repo.soft_delete(first.id, ADMIN_ROLE).await,
            Err(AuthError::LastAdmin)
        ));

        let mut demoted = first.clone();
        demoted.role_id = 2;
        assert!(matches!(
            repo.update_guarded(&demoted, ADMIN_ROLE).await,
            Err(AuthError::LastAdminDemotion)
        ));
        assert_eq!(
            repo.find_by_id(first.id).await.unwrap().unwrap().role_id,
            ADMIN_ROLE
        );

        // Edits that keep the role go through
        let mut renamed = first.clone();
        renamed.first_name = "Renamed".to_string();
        repo.update_guarded(&renamed, ADMIN_ROLE).await.unwrap();

        repo.soft_delete(second.id, ADMIN_ROLE).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.create(new_user(&format!("u{i}@example.com"), 1 + i % 2))
                .await
                .unwrap();
        }

        let (page, total) = repo.list(None, 2, 0).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (page, total) = repo.list(Some(2), 10, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_user_serialization_omits_password() {
        let now = Utc::now();
        let user = User {
            id: 1,
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role_id: 1,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$argon2id$secret"));
    }
}

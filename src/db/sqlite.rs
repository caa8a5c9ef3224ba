//! SQLite store
//!
//! Timestamps are persisted as Unix seconds so expiry comparisons happen in
//! SQL. Users are soft-deleted through `deleted_at`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;

use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::refresh::{RefreshToken, RefreshTokenRepository};
use crate::auth::role::{Role, RoleRecord, RoleRepository};
use crate::auth::store::Repositories;
use crate::auth::user::{NewUser, User, UserRepository};
use crate::auth::workspace::{Membership, NewWorkspace, Workspace, WorkspaceRepository};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name    TEXT NOT NULL DEFAULT '',
        last_name     TEXT NOT NULL DEFAULT '',
        role_id       INTEGER NOT NULL REFERENCES roles(id),
        active        INTEGER NOT NULL DEFAULT 1,
        created_at    INTEGER NOT NULL,
        updated_at    INTEGER NOT NULL,
        deleted_at    INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workspaces (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        slug        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at  INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_workspaces (
        user_id      INTEGER NOT NULL REFERENCES users(id),
        workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
        created_at   INTEGER NOT NULL,
        PRIMARY KEY (user_id, workspace_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    INTEGER NOT NULL REFERENCES users(id),
        token      TEXT NOT NULL UNIQUE,
        expires_at INTEGER NOT NULL,
        revoked    INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id)",
];

/// Connection pool plus schema management
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a pool, creating the database file if needed
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(url, max_connections, "database pool opened");
        Ok(Self { pool })
    }

    /// Create missing tables; safe to run on every start
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(statements = SCHEMA.len(), "schema migrated");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repository handles sharing this pool
    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: Arc::new(SqliteUserRepository::new(self.pool.clone())),
            roles: Arc::new(SqliteRoleRepository::new(self.pool.clone())),
            workspaces: Arc::new(SqliteWorkspaceRepository::new(self.pool.clone())),
            refresh_tokens: Arc::new(SqliteRefreshTokenRepository::new(self.pool.clone())),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_unix(secs: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::StorageError(format!("invalid timestamp {secs}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ==================
// Users
// ==================

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role_id, active, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> AuthResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role_id: row.try_get("role_id")?,
        active: row.try_get("active")?,
        created_at: from_unix(row.try_get("created_at")?)?,
        updated_at: from_unix(row.try_get("updated_at")?)?,
    })
}

/// Active, live users holding the bound role
const ACTIVE_HOLDERS: &str =
    "(SELECT COUNT(*) FROM users WHERE role_id = ? AND active = 1 AND deleted_at IS NULL)";

impl SqliteUserRepository {
    /// Single-statement write; with `guard` set, a row that is the last
    /// active holder of that role is left alone unless it keeps the role.
    async fn write_user(&self, user: &User, guard: Option<i64>) -> AuthResult<u64> {
        let mut sql = String::from(
            "UPDATE users SET email = ?, password_hash = ?, first_name = ?, last_name = ?, \
             role_id = ?, active = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        );
        if guard.is_some() {
            sql.push_str(&format!(
                " AND NOT (role_id = ? AND active = 1 AND ? = 0 AND {ACTIVE_HOLDERS} <= 1)"
            ));
        }

        let mut query = sqlx::query(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role_id)
            .bind(user.active)
            .bind(Utc::now().timestamp())
            .bind(user.id);
        if let Some(admin_role_id) = guard {
            let keeps_role = user.active && user.role_id == admin_role_id;
            query = query.bind(admin_role_id).bind(keeps_role).bind(admin_role_id);
        }

        let result = query.execute(&self.pool).await.map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailAlreadyExists
            } else {
                e.into()
            }
        })?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? AND deleted_at IS NULL");
        sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let now = Utc::now().timestamp();
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, role_id, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role_id)
            .bind(user.active)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::EmailAlreadyExists
                } else {
                    e.into()
                }
            })?;

        user_from_row(&row)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let affected = self.write_user(user, None).await?;
        if affected == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn update_guarded(&self, user: &User, admin_role_id: i64) -> AuthResult<()> {
        let affected = self.write_user(user, Some(admin_role_id)).await?;
        if affected == 0 {
            return match self.find_by_id(user.id).await? {
                Some(_) => Err(AuthError::LastAdminDemotion),
                None => Err(AuthError::UserNotFound),
            };
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64, admin_role_id: i64) -> AuthResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE users SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL \
             AND NOT (role_id = ? AND active = 1 AND {ACTIVE_HOLDERS} <= 1)"
        ))
        .bind(Utc::now().timestamp())
        .bind(id)
        .bind(admin_role_id)
        .bind(admin_role_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(id).await? {
                Some(_) => Err(AuthError::LastAdmin),
                None => Err(AuthError::UserNotFound),
            };
        }
        Ok(())
    }

    async fn list(
        &self,
        role_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AuthResult<(Vec<User>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND (? IS NULL OR role_id = ?)",
        )
        .bind(role_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL AND (? IS NULL OR role_id = ?) \
             ORDER BY id LIMIT ? OFFSET ?"
        );
        let users = sqlx::query(&sql)
            .bind(role_id)
            .bind(role_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect::<AuthResult<Vec<_>>>()?;

        Ok((users, total))
    }
}

// ==================
// Roles
// ==================

pub struct SqliteRoleRepository {
    pool: SqlitePool,
}

impl SqliteRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn role_from_row(row: &SqliteRow) -> AuthResult<RoleRecord> {
    let name: String = row.try_get("name")?;
    Ok(RoleRecord {
        id: row.try_get("id")?,
        name: name.parse::<Role>()?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl RoleRepository for SqliteRoleRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<RoleRecord>> {
        sqlx::query("SELECT id, name, description FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    async fn find_by_name(&self, role: Role) -> AuthResult<Option<RoleRecord>> {
        sqlx::query("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    async fn create(&self, role: Role) -> AuthResult<RoleRecord> {
        let row = sqlx::query(
            "INSERT INTO roles (name, description) VALUES (?, ?) RETURNING id, name, description",
        )
        .bind(role.as_str())
        .bind(role.description())
        .fetch_one(&self.pool)
        .await?;

        role_from_row(&row)
    }
}

// ==================
// Workspaces
// ==================

pub struct SqliteWorkspaceRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn workspace_from_row(row: &SqliteRow) -> AuthResult<Workspace> {
    Ok(Workspace {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        created_at: from_unix(row.try_get("created_at")?)?,
    })
}

fn membership_from_row(row: &SqliteRow) -> AuthResult<Membership> {
    Ok(Membership {
        user_id: row.try_get("user_id")?,
        workspace_id: row.try_get("workspace_id")?,
        created_at: from_unix(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Workspace>> {
        sqlx::query("SELECT id, name, slug, description, created_at FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(workspace_from_row)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> AuthResult<Option<Workspace>> {
        sqlx::query(
            "SELECT id, name, slug, description, created_at FROM workspaces WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(workspace_from_row)
        .transpose()
    }

    async fn create(&self, workspace: NewWorkspace) -> AuthResult<Workspace> {
        let row = sqlx::query(
            "INSERT INTO workspaces (name, slug, description, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, name, slug, description, created_at",
        )
        .bind(&workspace.name)
        .bind(&workspace.slug)
        .bind(&workspace.description)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::SlugTaken
            } else {
                e.into()
            }
        })?;

        workspace_from_row(&row)
    }

    async fn list(&self) -> AuthResult<Vec<Workspace>> {
        sqlx::query("SELECT id, name, slug, description, created_at FROM workspaces ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(workspace_from_row)
            .collect()
    }

    async fn update(&self, workspace: &Workspace) -> AuthResult<()> {
        let result =
            sqlx::query("UPDATE workspaces SET name = ?, slug = ?, description = ? WHERE id = ?")
                .bind(&workspace.name)
                .bind(&workspace.slug)
                .bind(&workspace.description)
                .bind(workspace.id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        AuthError::SlugTaken
                    } else {
                        e.into()
                    }
                })?;

        if result.rows_affected() == 0 {
            return Err(AuthError::WorkspaceNotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> AuthResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_workspaces WHERE workspace_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<Membership> {
        let row = sqlx::query(
            "INSERT INTO user_workspaces (user_id, workspace_id, created_at) VALUES (?, ?, ?) \
             RETURNING user_id, workspace_id, created_at",
        )
        .bind(user_id)
        .bind(workspace_id)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::AlreadyMember
            } else {
                e.into()
            }
        })?;

        membership_from_row(&row)
    }

    async fn remove_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool> {
        let result =
            sqlx::query("DELETE FROM user_workspaces WHERE user_id = ? AND workspace_id = ?")
                .bind(user_id)
                .bind(workspace_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_member(&self, user_id: i64, workspace_id: i64) -> AuthResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_workspaces WHERE user_id = ? AND workspace_id = ?",
        )
        .bind(user_id)
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn workspaces_for_user(&self, user_id: i64) -> AuthResult<Vec<Workspace>> {
        sqlx::query(
            "SELECT w.id, w.name, w.slug, w.description, w.created_at FROM workspaces w \
             JOIN user_workspaces uw ON uw.workspace_id = w.id \
             WHERE uw.user_id = ? ORDER BY w.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(workspace_from_row)
        .collect()
    }

    async fn members_of(&self, workspace_id: i64) -> AuthResult<Vec<Membership>> {
        sqlx::query(
            "SELECT user_id, workspace_id, created_at FROM user_workspaces \
             WHERE workspace_id = ? ORDER BY user_id",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(membership_from_row)
        .collect()
    }
}

// ==================
// Refresh tokens
// ==================

pub struct SqliteRefreshTokenRepository {
    pool: SqlitePool,
}

impl SqliteRefreshTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn refresh_token_from_row(row: &SqliteRow) -> AuthResult<RefreshToken> {
    Ok(RefreshToken {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token")?,
        expires_at: from_unix(row.try_get("expires_at")?)?,
        revoked: row.try_get("revoked")?,
        created_at: from_unix(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl RefreshTokenRepository for SqliteRefreshTokenRepository {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshToken> {
        let row = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at, revoked, created_at) \
             VALUES (?, ?, ?, 0, ?) \
             RETURNING id, user_id, token, expires_at, revoked, created_at",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at.timestamp())
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await?;

        refresh_token_from_row(&row)
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>> {
        sqlx::query(
            "SELECT id, user_id, token, expires_at, revoked, created_at FROM refresh_tokens \
             WHERE token = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(refresh_token_from_row)
        .transpose()
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE token = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_if_active(&self, token_hash: &str, now: DateTime<Utc>) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 \
             WHERE token = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> AuthResult<u64> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

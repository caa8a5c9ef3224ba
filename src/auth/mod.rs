//! # Floe Auth Module
//!
//! Session and token lifecycle plus access control for the CMS backend.
//!
//! This module provides password hashing, JWT access tokens, persisted
//! refresh tokens, the user/role/workspace stores they depend on, and the
//! policy checks applied to every protected request.

pub mod errors;
pub mod crypto;
pub mod role;
pub mod user;
pub mod workspace;
pub mod refresh;
pub mod store;
pub mod jwt;
pub mod session;
pub mod bootstrap;
pub mod accounts;
pub mod policy;

pub use accounts::AccountService;
pub use errors::{AuthError, AuthResult};
pub use jwt::{Claims, JwtConfig, JwtManager};
pub use policy::AccessPolicy;
pub use role::Role;
pub use session::{SessionConfig, SessionManager, TokenPair, TokenRefresh};
pub use store::Repositories;
pub use user::{User, UserRepository};

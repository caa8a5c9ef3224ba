//! # Floe CMS HTTP Server Module
//!
//! Axum routers, extractors, per-client rate limiting and the server
//! wrapper.
//!
//! # Endpoints
//!
//! Everything is mounted under `/api`:
//!
//! - `/health` - Liveness text
//! - `/auth/*` - Login, refresh and logout
//! - `/me`, `/users/*` - Current user and user administration
//! - `/workspaces/*`, `/members` - Workspaces and membership

pub mod auth_routes;
pub mod config;
pub mod extract;
pub mod rate_limit;
pub mod response;
pub mod server;
pub mod state;
pub mod user_routes;
pub mod workspace_routes;

pub use config::HttpServerConfig;
pub use rate_limit::RateLimit;
pub use server::HttpServer;
pub use state::AppState;

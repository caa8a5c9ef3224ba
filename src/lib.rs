//! floe-cms - session, token and access-control core of a multi-tenant CMS
//!
//! - [`auth`]: token lifecycle, refresh-token store, access policy and
//!   account administration over repository traits
//! - [`db`]: SQLite implementations of the repositories
//! - [`http_server`]: axum API exercising the core
//! - [`config`], [`cli`]: configuration loading and the binary's commands

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod http_server;

//! # Relational Store
//!
//! SQLite-backed implementations of the auth repositories.

pub mod sqlite;

pub use sqlite::SqliteStore;

//! Piazza Admin Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod admin_store;
pub mod config;
pub mod forum_store;
pub mod maintenance;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use admin_store::{AdminStore, SqliteAdminStore};
pub use forum_store::{ForumStore, SqliteForumStore};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{hash_password, verify_password, Permission};

pub mod auth;
pub mod permissions;

pub use auth::{hash_password, verify_password, SessionTokenValue};
pub use permissions::{role_has_permission, role_permissions, Permission};

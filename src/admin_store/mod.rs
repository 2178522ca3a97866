mod models;
mod schema;
mod store;

pub use models::*;
pub use schema::ADMIN_VERSIONED_SCHEMAS;
pub use store::SqliteAdminStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub trait AdminStore: Send + Sync {
    // Auth tokens
    fn insert_auth_token(&self, token: &str, member_id: i64) -> Result<()>;
    fn get_auth_token(&self, token: &str) -> Result<Option<AuthTokenRow>>;
    fn touch_auth_token(&self, token: &str) -> Result<()>;
    fn delete_auth_token(&self, token: &str) -> Result<()>;
    fn cleanup_stale_auth_tokens(&self, last_used_before: DateTime<Utc>) -> Result<usize>;

    // Session-scoped maintenance state
    fn get_session_state(&self, session_id: &str, state_key: &str)
        -> Result<Option<StoredState>>;
    fn put_session_state(&self, session_id: &str, state_key: &str, payload: &str) -> Result<()>;
    fn delete_session_state(&self, session_id: &str, state_key: &str) -> Result<()>;
    fn purge_session_state_updated_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    // Maintenance audit log
    fn log_maintenance_event(
        &self,
        job: &str,
        event: MaintenanceEventType,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<i64>;
    fn get_maintenance_log(&self, limit: usize, offset: usize) -> Result<Vec<MaintenanceLogEntry>>;
}

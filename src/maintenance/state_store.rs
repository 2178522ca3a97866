//! Session-scoped parking space for suspended job state.
//!
//! Entries live in the admin database keyed by (session, key) and decay
//! after a fixed time without updates, so an operator who abandons a
//! half-finished job does not leave state behind forever. Expiry is
//! enforced on read; a background sweep clears what nobody reads.

use crate::admin_store::AdminStore;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

pub trait JobStateStore: Send + Sync {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>>;
    fn put(&self, session_id: &str, key: &str, payload: &str) -> Result<()>;
    fn delete(&self, session_id: &str, key: &str) -> Result<()>;
    /// Remove every entry past its lifetime, returns how many went.
    fn purge_expired(&self) -> Result<usize>;
}

pub struct AdminJobStateStore {
    store: Arc<dyn AdminStore>,
    ttl: Duration,
}

impl AdminJobStateStore {
    pub fn new(store: Arc<dyn AdminStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn is_expired(&self, updated_at: chrono::DateTime<Utc>) -> bool {
        match (Utc::now() - updated_at).to_std() {
            Ok(age) => age >= self.ttl,
            // Timestamp in the future, clock skew. Treat as live.
            Err(_) => false,
        }
    }
}

impl JobStateStore for AdminJobStateStore {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        match self.store.get_session_state(session_id, key)? {
            Some(state) if self.is_expired(state.updated_at) => {
                self.store.delete_session_state(session_id, key)?;
                Ok(None)
            }
            Some(state) => Ok(Some(state.payload)),
            None => Ok(None),
        }
    }

    fn put(&self, session_id: &str, key: &str, payload: &str) -> Result<()> {
        self.store.put_session_state(session_id, key, payload)
    }

    fn delete(&self, session_id: &str, key: &str) -> Result<()> {
        self.store.delete_session_state(session_id, key)
    }

    fn purge_expired(&self) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(6));
        self.store.purge_session_state_updated_before(cutoff)
    }
}

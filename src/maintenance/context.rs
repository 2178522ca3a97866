use crate::forum_store::ForumStore;
use crate::maintenance::budget::DEFAULT_BUDGET_MILLIS;
use crate::maintenance::fs::AttachmentFs;
use crate::maintenance::state_store::{JobStateStore, DEFAULT_STATE_TTL};
use std::sync::Arc;
use std::time::Duration;

/// Knobs for how hard a run works and when folders are considered full.
/// Resolved from config at startup, constant for the process lifetime.
#[derive(Debug, Clone)]
pub struct MaintenanceSettings {
    /// Wall-clock allowance per request before the job suspends.
    pub budget: Duration,
    /// Rows per chunk for plain row scans and recounts.
    pub row_chunk_size: u64,
    /// Rows per chunk when each row also costs a disk probe.
    pub attachment_chunk_size: u64,
    /// Directory entries per chunk during folder walks.
    pub walk_chunk_size: u64,
    /// Max files per attachment folder, 0 means unlimited.
    pub folder_file_limit: u64,
    /// Max bytes per attachment folder, 0 means unlimited.
    pub folder_byte_limit: u64,
    /// Age after which an orphaned upload temp file is deleted.
    pub temp_file_ttl: Duration,
    /// Lifetime of suspended job state without updates.
    pub state_ttl: Duration,
    /// Pause the client is told to take between continuation requests.
    pub suggested_delay_seconds: u64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(DEFAULT_BUDGET_MILLIS),
            row_chunk_size: 500,
            attachment_chunk_size: 250,
            walk_chunk_size: 400,
            folder_file_limit: 0,
            folder_byte_limit: 0,
            temp_file_ttl: Duration::from_secs(5 * 60 * 60),
            state_ttl: DEFAULT_STATE_TTL,
            suggested_delay_seconds: 2,
        }
    }
}

/// Hook for asking the host environment for more execution headroom
/// before a heavy phase. Everything here is best effort; failures are
/// swallowed because the engine must work identically without help.
pub trait HostHints: Send + Sync {
    fn request_headroom(&self, duration: Duration);
}

/// Default hint sink for hosts with nothing to offer.
pub struct NullHostHints;

impl HostHints for NullHostHints {
    fn request_headroom(&self, _duration: Duration) {}
}

/// Everything a stage gets to see while it works. One context is
/// assembled per request and borrowed down the pipeline.
pub struct MaintenanceContext {
    pub forum_store: Arc<dyn ForumStore>,
    pub attachment_fs: Arc<dyn AttachmentFs>,
    pub state: Arc<dyn JobStateStore>,
    pub host: Arc<dyn HostHints>,
    pub session_id: String,
    pub settings: MaintenanceSettings,
}

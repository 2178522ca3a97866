use axum::extract::FromRef;

use crate::admin_store::AdminStore;
use crate::forum_store::ForumStore;
use crate::maintenance::{
    AttachmentFs, HostHints, JobRunner, JobStateStore, MaintenanceSettings,
};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedForumStore = Arc<dyn ForumStore>;
pub type GuardedAdminStore = Arc<dyn AdminStore>;
pub type GuardedAttachmentFs = Arc<dyn AttachmentFs>;
pub type GuardedJobStateStore = Arc<dyn JobStateStore>;
pub type GuardedHostHints = Arc<dyn HostHints>;
pub type GuardedJobRunner = Arc<JobRunner>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub forum_store: GuardedForumStore,
    pub admin_store: GuardedAdminStore,
    pub attachment_fs: GuardedAttachmentFs,
    pub job_state: GuardedJobStateStore,
    pub host_hints: GuardedHostHints,
    pub job_runner: GuardedJobRunner,
    pub maintenance: MaintenanceSettings,
}

impl FromRef<ServerState> for GuardedForumStore {
    fn from_ref(input: &ServerState) -> Self {
        input.forum_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAdminStore {
    fn from_ref(input: &ServerState) -> Self {
        input.admin_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAttachmentFs {
    fn from_ref(input: &ServerState) -> Self {
        input.attachment_fs.clone()
    }
}

impl FromRef<ServerState> for GuardedJobStateStore {
    fn from_ref(input: &ServerState) -> Self {
        input.job_state.clone()
    }
}

impl FromRef<ServerState> for GuardedHostHints {
    fn from_ref(input: &ServerState) -> Self {
        input.host_hints.clone()
    }
}

impl FromRef<ServerState> for GuardedJobRunner {
    fn from_ref(input: &ServerState) -> Self {
        input.job_runner.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for MaintenanceSettings {
    fn from_ref(input: &ServerState) -> Self {
        input.maintenance.clone()
    }
}

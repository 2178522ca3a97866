//! The maintenance job families.
//!
//! Each submodule owns one job: its stages, its accumulator keys, and
//! the summary it produces on completion. The engine only ever sees the
//! `Stage` objects; everything job-specific stays behind `pipeline()`
//! and `finish()`.

pub mod convert;
pub mod move_topics;
pub mod recount;
pub mod repair;
pub mod transfer;

use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::registry::JobSpec;
use repair::ProblemCategory;
use serde::Serialize;
use std::collections::BTreeMap;

/// Terminal payload of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobSummary {
    Recount {
        topics: u64,
        boards: u64,
        members: u64,
        messages_repointed: u64,
    },
    /// Detection pass: what is wrong, nothing touched yet.
    RepairReport {
        problems: BTreeMap<ProblemCategory, u64>,
        temp_files_removed: u64,
    },
    /// Fix pass over previously reported findings.
    RepairFixed {
        fixed: BTreeMap<ProblemCategory, u64>,
        failed: u64,
    },
    /// Transfer found an empty source folder. Distinct from a transfer
    /// that moved zero files because every move failed.
    NothingToTransfer,
    Transfer {
        moved: u64,
        failed: u64,
        rollovers: u64,
        final_folder: i64,
    },
    TopicsMoved {
        moved: u64,
        from_board: i64,
        to_board: i64,
    },
    BodiesRebuilt {
        examined: u64,
        rewritten: u64,
    },
}

/// Build the terminal summary once every stage has finished. For repair
/// detection this is also the moment the findings are parked for a
/// later fix pass.
pub fn finish(
    ctx: &MaintenanceContext,
    spec: &JobSpec,
    cursor: &mut Cursor,
) -> Result<JobSummary, JobError> {
    match spec {
        JobSpec::RecountTotals => recount::finish(ctx, cursor),
        JobSpec::RepairAttachments { fix } => repair::finish(ctx, fix, cursor),
        JobSpec::TransferAttachments { .. } => Ok(transfer::finish(cursor)),
        JobSpec::MoveTopics {
            from_board,
            to_board,
        } => Ok(move_topics::finish(cursor, *from_board, *to_board)),
        JobSpec::RebuildBodies => Ok(convert::finish(cursor)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::admin_store::SqliteAdminStore;
    use crate::forum_store::{
        AttachmentFolder, AttachmentKind, ForumStore, NewAttachment, SqliteForumStore,
    };
    use crate::maintenance::budget::TimeBudget;
    use crate::maintenance::context::{MaintenanceContext, MaintenanceSettings, NullHostHints};
    use crate::maintenance::cursor::Cursor;
    use crate::maintenance::fs::DiskAttachmentFs;
    use crate::maintenance::pipeline::{Pipeline, RunOutcome};
    use crate::maintenance::state_store::AdminJobStateStore;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    /// In-memory stores plus a throwaway media directory.
    pub struct JobTestEnv {
        pub ctx: MaintenanceContext,
        pub admin: Arc<SqliteAdminStore>,
        pub media: tempfile::TempDir,
    }

    pub fn env() -> JobTestEnv {
        env_with(MaintenanceSettings::default())
    }

    pub fn env_with(settings: MaintenanceSettings) -> JobTestEnv {
        let admin = Arc::new(SqliteAdminStore::new_in_memory().unwrap());
        let ctx = MaintenanceContext {
            forum_store: Arc::new(SqliteForumStore::new_in_memory().unwrap()),
            attachment_fs: Arc::new(DiskAttachmentFs),
            state: Arc::new(AdminJobStateStore::new(
                admin.clone(),
                Duration::from_secs(3600),
            )),
            host: Arc::new(NullHostHints),
            session_id: "job-test-session".to_string(),
            settings,
        };
        let media = tempfile::tempdir().unwrap();
        JobTestEnv { ctx, admin, media }
    }

    impl JobTestEnv {
        pub fn store(&self) -> &dyn ForumStore {
            self.ctx.forum_store.as_ref()
        }

        /// Create a folder row plus the matching directory on disk.
        pub fn create_folder(&self, name: &str) -> AttachmentFolder {
            let dir = self.media.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            self.store()
                .create_attachment_folder(dir.to_str().unwrap())
                .unwrap()
        }

        pub fn folder_dir(&self, folder: &AttachmentFolder) -> PathBuf {
            PathBuf::from(&folder.path)
        }

        /// Attachment row plus its backing file, sized to match.
        pub fn seed_attachment_with_file(
            &self,
            folder: &AttachmentFolder,
            message_id: i64,
            content: &[u8],
        ) -> crate::forum_store::Attachment {
            let attachment = self
                .store()
                .create_attachment(&NewAttachment {
                    message_id,
                    member_id: 0,
                    folder_id: folder.id,
                    thumbnail_id: 0,
                    kind: AttachmentKind::File,
                    filename: "upload.bin".to_string(),
                    file_ext: "bin".to_string(),
                    file_hash: "cafe".to_string(),
                    size: content.len() as i64,
                })
                .unwrap();
            std::fs::write(
                self.folder_dir(folder).join(attachment.disk_name()),
                content,
            )
            .unwrap();
            attachment
        }
    }

    /// Drive a pipeline to its end with an open budget.
    pub fn run_to_completion(ctx: &MaintenanceContext, pipeline: &Pipeline) -> Cursor {
        let mut cursor = Cursor::fresh();
        let outcome = pipeline
            .run(ctx, &mut cursor, &TimeBudget::unlimited())
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        cursor
    }
}

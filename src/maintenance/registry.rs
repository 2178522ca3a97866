//! The catalogue of maintenance jobs.
//!
//! `JobKind` is the stable wire name of each job, `JobSpec` the full
//! request including operator options. A spec resolves into a pipeline
//! exactly once per request; precondition failures surface here, before
//! any stage has touched data.

use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::repair::ProblemCategory;
use crate::maintenance::jobs::transfer::TransferMode;
use crate::maintenance::jobs::{convert, move_topics, recount, repair, transfer};
use crate::maintenance::pipeline::Pipeline;
use crate::user::Permission;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    RecountTotals,
    RepairAttachments,
    TransferAttachments,
    MoveTopics,
    RebuildBodies,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::RecountTotals,
        JobKind::RepairAttachments,
        JobKind::TransferAttachments,
        JobKind::MoveTopics,
        JobKind::RebuildBodies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::RecountTotals => "recount_totals",
            JobKind::RepairAttachments => "repair_attachments",
            JobKind::TransferAttachments => "transfer_attachments",
            JobKind::MoveTopics => "move_topics",
            JobKind::RebuildBodies => "rebuild_bodies",
        }
    }

    pub fn parse(value: &str) -> Result<Self, JobError> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| JobError::UnknownJob(value.to_string()))
    }

    /// Every job is gated on its own permission so a moderator who can
    /// manage boards cannot, say, delete attachment files.
    pub fn required_permission(&self) -> Permission {
        match self {
            JobKind::RecountTotals => Permission::AdminForum,
            JobKind::RepairAttachments => Permission::ManageAttachments,
            JobKind::TransferAttachments => Permission::ManageAttachments,
            JobKind::MoveTopics => Permission::ManageBoards,
            JobKind::RebuildBodies => Permission::AdminForum,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            JobKind::RecountTotals => "Recount board, topic and member totals",
            JobKind::RepairAttachments => "Detect and repair attachment inconsistencies",
            JobKind::TransferAttachments => "Move attachment files between folders",
            JobKind::MoveTopics => "Move every topic of one board to another",
            JobKind::RebuildBodies => "Rewrite message texts from legacy entity encoding",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job plus its operator-chosen options, as posted to the start
/// endpoint. The spec is persisted next to the cursor so continuation
/// requests cannot alter what the job does midway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobSpec {
    RecountTotals,
    RepairAttachments {
        /// Categories to fix. Empty means detect only.
        #[serde(default)]
        fix: Vec<ProblemCategory>,
    },
    TransferAttachments {
        source: i64,
        destination: i64,
        #[serde(default)]
        mode: TransferMode,
    },
    MoveTopics {
        from_board: i64,
        to_board: i64,
    },
    RebuildBodies,
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::RecountTotals => JobKind::RecountTotals,
            JobSpec::RepairAttachments { .. } => JobKind::RepairAttachments,
            JobSpec::TransferAttachments { .. } => JobKind::TransferAttachments,
            JobSpec::MoveTopics { .. } => JobKind::MoveTopics,
            JobSpec::RebuildBodies => JobKind::RebuildBodies,
        }
    }
}

/// Resolve a spec into its stage pipeline. Job preconditions (folders
/// and boards that must exist, findings that must be stored) are
/// checked here so a bad request fails before any work happens.
pub fn build_pipeline(ctx: &MaintenanceContext, spec: &JobSpec) -> Result<Pipeline, JobError> {
    match spec {
        JobSpec::RecountTotals => Ok(recount::pipeline()),
        JobSpec::RepairAttachments { fix } => repair::pipeline(ctx, fix),
        JobSpec::TransferAttachments {
            source,
            destination,
            mode,
        } => transfer::pipeline(ctx, *source, *destination, *mode),
        JobSpec::MoveTopics {
            from_board,
            to_board,
        } => move_topics::pipeline(ctx, *from_board, *to_board),
        JobSpec::RebuildBodies => Ok(convert::pipeline()),
    }
}

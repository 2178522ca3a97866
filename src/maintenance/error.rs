use thiserror::Error;

/// Terminal failures of a maintenance run.
///
/// Anything that surfaces as a `JobError` ends the job: the parked
/// state is discarded and the operator has to start over. Recoverable
/// per-item trouble (a file that will not move, a row that no longer
/// matches) is counted inside the job instead and never reaches this
/// type.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("continuation token is invalid, expired, or already used")]
    StaleContinuation,

    #[error("no suspended run of this job to continue")]
    NothingToResume,

    #[error("action token is invalid or already used")]
    BadActionToken,

    #[error("invalid job options: {0}")]
    BadOptions(String),

    #[error("attachment folder {folder_id} does not exist")]
    FolderNotFound { folder_id: i64 },

    #[error("board {board_id} does not exist")]
    BoardNotFound { board_id: i64 },

    #[error("destination folder {folder_id} is full ({detail})")]
    CapacityExceeded { folder_id: i64, detail: String },

    #[error("no repair findings stored for this session, run a detection pass first")]
    MissingFindings,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

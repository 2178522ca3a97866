//! Resumable, time-boxed maintenance jobs.
//!
//! Long-running administrative work (recounts, attachment repair and
//! relocation, mass topic moves, body rewrites) runs in short slices:
//! each HTTP request drives the job until a wall-clock budget expires,
//! then suspends into a continuation the client echoes back. Progress
//! always lands in whole chunks, so a lost continuation costs at most
//! the tail of the current request.

mod budget;
mod context;
mod continuation;
mod cursor;
mod error;
mod fs;
mod jobs;
mod pipeline;
mod registry;
mod runner;
mod state_store;

pub use budget::{TimeBudget, DEFAULT_BUDGET_MILLIS};
pub use context::{HostHints, MaintenanceContext, MaintenanceSettings, NullHostHints};
pub use continuation::{ContinuationChannel, ContinuationDescriptor, ContinuationRequest};
pub use error::JobError;
pub use fs::{AttachmentFs, DiskAttachmentFs};
pub use jobs::JobSummary;
pub use registry::{JobKind, JobSpec};
pub use runner::{JobResponse, JobRunner};
pub use state_store::{AdminJobStateStore, JobStateStore, DEFAULT_STATE_TTL};

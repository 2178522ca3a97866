//! One request's worth of job execution.
//!
//! The runner is the seam between the HTTP layer and the engine: it
//! admits the request (action token for starts, continuation echo for
//! resumes), drives the pipeline under a fresh budget, and settles the
//! outcome. A suspended run hands back a continuation descriptor; a
//! finished run hands back the terminal summary and an audit row. Any
//! fatal error of an admitted run discards the parked state, so the
//! operator has to start the job over.

use crate::admin_store::{AdminStore, MaintenanceEventType};
use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::continuation::{
    ContinuationChannel, ContinuationDescriptor, ContinuationRequest,
};
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::{self, JobSummary};
use crate::maintenance::pipeline::RunOutcome;
use crate::maintenance::registry::{build_pipeline, JobKind, JobSpec};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a maintenance request gets back.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResponse {
    InProgress {
        #[serde(flatten)]
        continuation: ContinuationDescriptor,
    },
    Completed {
        job: JobKind,
        summary: JobSummary,
    },
}

pub struct JobRunner {
    channel: ContinuationChannel,
    audit: Arc<dyn AdminStore>,
}

impl JobRunner {
    pub fn new(channel: ContinuationChannel, audit: Arc<dyn AdminStore>) -> Self {
        Self { channel, audit }
    }

    /// One-time token the job listing hands out; `start` consumes it.
    pub fn mint_action_token(&self, session_id: &str) -> Result<String, JobError> {
        self.channel.mint_action_token(session_id)
    }

    pub fn is_suspended(&self, session_id: &str, job: JobKind) -> Result<bool, JobError> {
        self.channel.is_suspended(session_id, job)
    }

    /// Run a job from scratch. A suspended earlier run of the same job
    /// in this session is abandoned.
    pub fn start(
        &self,
        ctx: &MaintenanceContext,
        spec: &JobSpec,
        action_token: &str,
    ) -> Result<JobResponse, JobError> {
        self.channel
            .consume_action_token(&ctx.session_id, action_token)?;
        let mut cursor = self.channel.begin(&ctx.session_id, spec.kind())?;
        info!(job = spec.kind().as_str(), "Starting maintenance job");
        self.drive(ctx, spec, &mut cursor)
    }

    /// Pick a suspended job up where it stopped. The echoed token and
    /// scalars must match the parked state.
    pub fn resume(
        &self,
        ctx: &MaintenanceContext,
        job: JobKind,
        request: &ContinuationRequest,
    ) -> Result<JobResponse, JobError> {
        let (spec, mut cursor) = self.channel.resume(&ctx.session_id, job, request)?;
        self.drive(ctx, &spec, &mut cursor)
    }

    fn drive(
        &self,
        ctx: &MaintenanceContext,
        spec: &JobSpec,
        cursor: &mut Cursor,
    ) -> Result<JobResponse, JobError> {
        match self.drive_inner(ctx, spec, cursor) {
            Ok(response) => Ok(response),
            Err(err) => {
                let job = spec.kind();
                warn!(job = job.as_str(), error = %err, "Maintenance job aborted");
                if let Err(cleanup) = self.channel.complete(&ctx.session_id, job) {
                    warn!(job = job.as_str(), error = %cleanup, "Failed to discard state after abort");
                }
                self.log_event(job, MaintenanceEventType::Failed, None, Some(&err.to_string()));
                Err(err)
            }
        }
    }

    fn drive_inner(
        &self,
        ctx: &MaintenanceContext,
        spec: &JobSpec,
        cursor: &mut Cursor,
    ) -> Result<JobResponse, JobError> {
        let job = spec.kind();
        ctx.host.request_headroom(ctx.settings.budget);
        let budget = TimeBudget::start(ctx.settings.budget);
        let pipeline = build_pipeline(ctx, spec)?;
        match pipeline.run(ctx, cursor, &budget)? {
            RunOutcome::Completed => {
                let summary = jobs::finish(ctx, spec, cursor)?;
                self.channel.complete(&ctx.session_id, job)?;
                self.log_completion(job, &summary);
                info!(
                    job = job.as_str(),
                    elapsed_millis = budget.elapsed().as_millis() as u64,
                    "Maintenance job completed"
                );
                Ok(JobResponse::Completed { job, summary })
            }
            RunOutcome::Suspended => {
                let percent = pipeline.percent_complete(ctx, cursor)?;
                let continuation = self.channel.suspend(&ctx.session_id, spec, cursor, percent)?;
                debug!(
                    job = job.as_str(),
                    percent,
                    step = cursor.step,
                    offset = cursor.offset,
                    "Maintenance job suspended"
                );
                Ok(JobResponse::InProgress { continuation })
            }
        }
    }

    fn log_completion(&self, job: JobKind, summary: &JobSummary) {
        if let JobSummary::Transfer {
            rollovers,
            final_folder,
            ..
        } = summary
        {
            if *rollovers > 0 {
                let details =
                    serde_json::json!({ "rollovers": rollovers, "final_folder": final_folder });
                self.log_event(job, MaintenanceEventType::RolledOver, Some(details), None);
            }
        }
        let details = match serde_json::to_value(summary) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(job = job.as_str(), error = %err, "Failed to serialize job summary");
                None
            }
        };
        self.log_event(job, MaintenanceEventType::Completed, details, None);
    }

    /// Audit rows are best effort; losing one must not fail the job.
    fn log_event(
        &self,
        job: JobKind,
        event: MaintenanceEventType,
        details: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        if let Err(err) =
            self.audit
                .log_maintenance_event(job.as_str(), event, details.as_ref(), error)
        {
            warn!(job = job.as_str(), error = %err, "Failed to write audit entry");
        }
    }
}

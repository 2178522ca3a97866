//! HTTP surface of the maintenance engine.
//!
//! Four endpoints: the job listing (which also mints the one-time
//! action token), start, continue, and the audit log. Start and
//! continue share the response shape: 200 with a terminal summary or
//! 202 with a continuation descriptor the client echoes back.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::metrics;
use super::session::Session;
use super::state::ServerState;
use crate::maintenance::{
    ContinuationRequest, JobError, JobKind, JobResponse, JobSpec, JobSummary, MaintenanceContext,
};
use crate::user::Permission;

const MAX_AUDIT_PAGE: usize = 500;

#[derive(Serialize)]
struct JobListing {
    job: JobKind,
    description: &'static str,
    permission: Permission,
    allowed: bool,
    in_progress: bool,
}

#[derive(Serialize)]
struct JobsIndex {
    action_token: String,
    jobs: Vec<JobListing>,
}

#[derive(Deserialize, Debug)]
struct StartJobBody {
    action_token: String,
    #[serde(flatten)]
    spec: JobSpec,
}

#[derive(Deserialize, Debug)]
struct ContinueJobBody {
    job: String,
    #[serde(flatten)]
    request: ContinuationRequest,
}

#[derive(Deserialize, Debug)]
struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_audit_limit() -> usize {
    50
}

fn maintenance_context(state: &ServerState, session: &Session) -> MaintenanceContext {
    MaintenanceContext {
        forum_store: state.forum_store.clone(),
        attachment_fs: state.attachment_fs.clone(),
        state: state.job_state.clone(),
        host: state.host_hints.clone(),
        session_id: session.token.clone(),
        settings: state.maintenance.clone(),
    }
}

fn error_status(err: &JobError) -> StatusCode {
    match err {
        JobError::UnknownJob(_) | JobError::BadOptions(_) => StatusCode::BAD_REQUEST,
        JobError::BadActionToken | JobError::StaleContinuation => StatusCode::FORBIDDEN,
        JobError::NothingToResume
        | JobError::FolderNotFound { .. }
        | JobError::BoardNotFound { .. } => StatusCode::NOT_FOUND,
        JobError::CapacityExceeded { .. } | JobError::MissingFindings => StatusCode::CONFLICT,
        JobError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &JobError) -> Response {
    (error_status(err), Json(json!({ "error": err.to_string() }))).into_response()
}

fn forbidden(detail: String) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": detail }))).into_response()
}

/// Admission failures happen before any work runs; they are neither
/// audited nor counted as failed runs.
fn is_admission_failure(err: &JobError) -> bool {
    matches!(
        err,
        JobError::BadActionToken | JobError::StaleContinuation | JobError::NothingToResume
    )
}

/// How much work a completed run represents, for the rows counter.
fn summary_rows(summary: &JobSummary) -> u64 {
    match summary {
        JobSummary::Recount {
            topics,
            boards,
            members,
            messages_repointed,
        } => topics + boards + members + messages_repointed,
        JobSummary::RepairReport {
            problems,
            temp_files_removed,
        } => problems.values().sum::<u64>() + temp_files_removed,
        JobSummary::RepairFixed { fixed, failed } => fixed.values().sum::<u64>() + failed,
        JobSummary::NothingToTransfer => 0,
        JobSummary::Transfer { moved, failed, .. } => moved + failed,
        JobSummary::TopicsMoved { moved, .. } => *moved,
        JobSummary::BodiesRebuilt { examined, .. } => *examined,
    }
}

fn job_outcome_response(job: JobKind, outcome: Result<JobResponse, JobError>) -> Response {
    match outcome {
        Ok(response) => {
            let status = match &response {
                JobResponse::Completed { summary, .. } => {
                    metrics::record_maintenance_run(job.as_str(), "completed");
                    metrics::record_maintenance_rows(job.as_str(), summary_rows(summary));
                    StatusCode::OK
                }
                JobResponse::InProgress { .. } => {
                    metrics::record_maintenance_continuation(job.as_str());
                    StatusCode::ACCEPTED
                }
            };
            (status, Json(response)).into_response()
        }
        Err(err) => {
            if !is_admission_failure(&err) {
                metrics::record_maintenance_run(job.as_str(), "failed");
            }
            error_response(&err)
        }
    }
}

async fn list_jobs(session: Session, State(state): State<ServerState>) -> Response {
    let mut jobs = Vec::with_capacity(JobKind::ALL.len());
    for kind in JobKind::ALL {
        let in_progress = match state.job_runner.is_suspended(&session.token, kind) {
            Ok(flag) => flag,
            Err(err) => return error_response(&err),
        };
        jobs.push(JobListing {
            job: kind,
            description: kind.description(),
            permission: kind.required_permission(),
            allowed: session.has_permission(kind.required_permission()),
            in_progress,
        });
    }

    match state.job_runner.mint_action_token(&session.token) {
        Ok(action_token) => Json(JobsIndex { action_token, jobs }).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn start_job(
    session: Session,
    State(state): State<ServerState>,
    Json(value): Json<serde_json::Value>,
) -> Response {
    // Resolve the job name first so an unknown job reads as such
    // instead of as a generic deserialization failure.
    let Some(job_name) = value.get("job").and_then(|v| v.as_str()) else {
        return error_response(&JobError::BadOptions("missing 'job' field".to_string()));
    };
    let job = match JobKind::parse(job_name) {
        Ok(x) => x,
        Err(err) => return error_response(&err),
    };
    let body: StartJobBody = match serde_json::from_value(value) {
        Ok(x) => x,
        Err(err) => return error_response(&JobError::BadOptions(err.to_string())),
    };

    if !session.has_permission(job.required_permission()) {
        return forbidden(format!(
            "starting {} requires {:?}",
            job,
            job.required_permission()
        ));
    }

    let ctx = maintenance_context(&state, &session);
    job_outcome_response(
        job,
        state.job_runner.start(&ctx, &body.spec, &body.action_token),
    )
}

async fn continue_job(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<ContinueJobBody>,
) -> Response {
    let job = match JobKind::parse(&body.job) {
        Ok(x) => x,
        Err(err) => return error_response(&err),
    };

    if !session.has_permission(job.required_permission()) {
        return forbidden(format!(
            "continuing {} requires {:?}",
            job,
            job.required_permission()
        ));
    }

    let ctx = maintenance_context(&state, &session);
    job_outcome_response(job, state.job_runner.resume(&ctx, job, &body.request))
}

async fn get_audit(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<AuditQuery>,
) -> Response {
    if !session.has_permission(Permission::AdminForum) {
        return forbidden("viewing the maintenance audit log requires AdminForum".to_string());
    }

    match state
        .admin_store
        .get_maintenance_log(query.limit.min(MAX_AUDIT_PAGE), query.offset)
    {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            error!("Failed to read maintenance log: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_maintenance_routes(state: ServerState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/start", post(start_job))
        .route("/continue", post(continue_job))
        .route("/audit", get(get_audit))
        .with_state(state)
}

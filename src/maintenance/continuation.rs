//! The pause/resume protocol between engine and client.
//!
//! A suspended job hands the client an opaque one-time token plus the
//! cursor scalars. The client echoes all of it back; the server-side
//! copy of the cursor is what actually drives the resumed run, so a
//! tampered echo can only fail the match, never move the job. A token
//! is good for one admission: the next suspend stores a fresh one, and
//! completion or failure clears the state entirely. If the process dies
//! mid-run the stored state still carries the token that admitted the
//! run, so the same request can simply be retried.

use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::registry::{JobKind, JobSpec};
use crate::maintenance::state_store::JobStateStore;
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TOKEN_LEN: usize = 32;
const ACTION_TOKEN_KEY: &str = "action_token";

/// What the client must echo back to continue a suspended job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationRequest {
    pub step: usize,
    pub offset: u64,
    pub token: String,
}

/// What the client is handed when a job suspends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationDescriptor {
    pub job: JobKind,
    pub percent_complete: u8,
    pub step: usize,
    pub offset: u64,
    pub token: String,
    pub suggested_delay_seconds: u64,
}

/// Server-side record of a suspended job.
#[derive(Debug, Serialize, Deserialize)]
struct StoredJobState {
    spec: JobSpec,
    cursor: Cursor,
    token: String,
}

pub struct ContinuationChannel {
    state: Arc<dyn JobStateStore>,
    suggested_delay_seconds: u64,
}

impl ContinuationChannel {
    pub fn new(state: Arc<dyn JobStateStore>, suggested_delay_seconds: u64) -> Self {
        Self {
            state,
            suggested_delay_seconds,
        }
    }

    fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    /// Start a job from scratch. Any suspended run of the same job in
    /// this session is abandoned.
    pub fn begin(&self, session_id: &str, job: JobKind) -> Result<Cursor, JobError> {
        self.state.delete(session_id, job.as_str())?;
        Ok(Cursor::fresh())
    }

    /// Admit a continuation request. The echoed token and cursor
    /// scalars must match the stored state exactly.
    pub fn resume(
        &self,
        session_id: &str,
        job: JobKind,
        request: &ContinuationRequest,
    ) -> Result<(JobSpec, Cursor), JobError> {
        let raw = self
            .state
            .get(session_id, job.as_str())?
            .ok_or(JobError::NothingToResume)?;
        let stored: StoredJobState = serde_json::from_str(&raw)
            .map_err(|err| JobError::Internal(anyhow::Error::new(err)))?;
        if stored.token != request.token
            || stored.cursor.step != request.step
            || stored.cursor.offset != request.offset
        {
            return Err(JobError::StaleContinuation);
        }
        Ok((stored.spec, stored.cursor))
    }

    /// Park the job state and mint the token for the next request. This
    /// is also what consumes the previous token.
    pub fn suspend(
        &self,
        session_id: &str,
        spec: &JobSpec,
        cursor: &Cursor,
        percent_complete: u8,
    ) -> Result<ContinuationDescriptor, JobError> {
        let job = spec.kind();
        let token = Self::generate_token();
        let stored = StoredJobState {
            spec: spec.clone(),
            cursor: cursor.clone(),
            token: token.clone(),
        };
        let payload = serde_json::to_string(&stored)
            .map_err(|err| JobError::Internal(anyhow::Error::new(err)))?;
        self.state.put(session_id, job.as_str(), &payload)?;
        Ok(ContinuationDescriptor {
            job,
            percent_complete,
            step: cursor.step,
            offset: cursor.offset,
            token,
            suggested_delay_seconds: self.suggested_delay_seconds,
        })
    }

    /// Drop the parked state after a terminal response, success or not.
    pub fn complete(&self, session_id: &str, job: JobKind) -> Result<(), JobError> {
        self.state.delete(session_id, job.as_str())?;
        Ok(())
    }

    /// Whether this session has a suspended run of the job parked.
    pub fn is_suspended(&self, session_id: &str, job: JobKind) -> Result<bool, JobError> {
        Ok(self.state.get(session_id, job.as_str())?.is_some())
    }

    /// One-time token a client must present to start any job, minted
    /// when the job listing is served. Keeps a stray link or stale form
    /// from kicking off work.
    pub fn mint_action_token(&self, session_id: &str) -> Result<String, JobError> {
        let token = Self::generate_token();
        self.state.put(session_id, ACTION_TOKEN_KEY, &token)?;
        Ok(token)
    }

    pub fn consume_action_token(&self, session_id: &str, presented: &str) -> Result<(), JobError> {
        match self.state.get(session_id, ACTION_TOKEN_KEY)? {
            Some(stored) if stored == presented => {
                self.state.delete(session_id, ACTION_TOKEN_KEY)?;
                Ok(())
            }
            _ => Err(JobError::BadActionToken),
        }
    }
}

//! Stage sequencing and progress math.
//!
//! A pipeline is an ordered list of stages. Each request drives the
//! pipeline from wherever the cursor points until either every stage
//! reports finished or a stage yields on budget. Stage boundaries are
//! invisible to the client: finishing one stage rolls straight into the
//! next inside the same request.

use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::registry::JobKind;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage has no work left; the cursor may advance past it.
    Finished,
    /// Budget ran out mid-stage; the cursor points at the resume spot.
    Yielded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Suspended,
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best known size of this stage's workload, for progress reporting
    /// only. May be estimated or cached in the cursor; must never be
    /// used for loop bounds.
    fn total(&self, ctx: &MaintenanceContext, cursor: &Cursor) -> Result<u64, JobError>;

    /// Perform chunks of work until done or out of budget. The budget
    /// is consulted after each chunk, so a started chunk always commits
    /// whole and a call that finds work always commits at least one
    /// chunk, even on an already-expired budget.
    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError>;
}

pub struct Pipeline {
    job: JobKind,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(job: JobKind, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { job, stages }
    }

    pub fn job(&self) -> JobKind {
        self.job
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn run(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<RunOutcome, JobError> {
        while cursor.step < self.stages.len() {
            let stage = &self.stages[cursor.step];
            debug!(
                job = self.job.as_str(),
                stage = stage.name(),
                offset = cursor.offset,
                "Running stage"
            );
            match stage.process(ctx, cursor, budget)? {
                StageStatus::Finished => cursor.advance_step(),
                StageStatus::Yielded => return Ok(RunOutcome::Suspended),
            }
        }
        Ok(RunOutcome::Completed)
    }

    /// Whole-job progress for a suspended cursor. Stages weigh equally;
    /// the active stage contributes its offset against its total. Capped
    /// at 99 because 100 is reserved for the terminal response.
    pub fn percent_complete(
        &self,
        ctx: &MaintenanceContext,
        cursor: &Cursor,
    ) -> Result<u8, JobError> {
        if cursor.step >= self.stages.len() {
            return Ok(100);
        }
        let total = self.stages[cursor.step].total(ctx, cursor)?;
        let stage_fraction = if total == 0 {
            1.0
        } else {
            cursor.offset.min(total) as f64 / total as f64
        };
        let percent =
            ((cursor.step as f64 + stage_fraction) / self.stages.len() as f64 * 100.0).round();
        Ok((percent as u8).min(99))
    }
}

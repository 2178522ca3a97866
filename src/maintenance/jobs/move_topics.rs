//! Bulk topic move: drain every topic off one board onto another.
//!
//! The scan is a drain, not an offset walk: each chunk takes whatever
//! topics are still on the source board, so a resumed run never has to
//! reconcile offsets against rows that already moved. The cursor offset
//! only tracks how many topics went, for progress reporting.

use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::JobSummary;
use crate::maintenance::pipeline::{Pipeline, Stage, StageStatus};
use crate::maintenance::registry::JobKind;

const TOPICS_MOVED: &str = "topics_moved";
const TOPICS_TO_MOVE: &str = "topics_to_move";

struct MoveTopicRows {
    from_board: i64,
    to_board: i64,
}

impl Stage for MoveTopicRows {
    fn name(&self) -> &'static str {
        "move_topic_rows"
    }

    fn total(&self, ctx: &MaintenanceContext, cursor: &Cursor) -> Result<u64, JobError> {
        if cursor.accumulators.has_count(TOPICS_TO_MOVE) {
            return Ok(cursor.accumulators.count(TOPICS_TO_MOVE) as u64);
        }
        Ok(ctx.forum_store.count_topics_on_board(self.from_board)?)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let store = ctx.forum_store.as_ref();
        // The source count shrinks as topics move, so the workload size
        // is pinned on first entry.
        if !cursor.accumulators.has_count(TOPICS_TO_MOVE) {
            let total = store.count_topics_on_board(self.from_board)?;
            cursor.accumulators.set_count(TOPICS_TO_MOVE, total as i64);
        }
        loop {
            let ids = store.topics_on_board(self.from_board, ctx.settings.row_chunk_size)?;
            if ids.is_empty() {
                return Ok(StageStatus::Finished);
            }
            let moved = store.move_topics_to_board(&ids, self.to_board)?;
            cursor.accumulators.add(TOPICS_MOVED, moved as i64);
            cursor.offset += ids.len() as u64;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

/// Refresh the counters of the two boards involved. One chunk of work.
struct RecountMovedBoards {
    from_board: i64,
    to_board: i64,
}

impl Stage for RecountMovedBoards {
    fn name(&self) -> &'static str {
        "recount_moved_boards"
    }

    fn total(&self, _ctx: &MaintenanceContext, _cursor: &Cursor) -> Result<u64, JobError> {
        Ok(1)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        _budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let boards = [self.from_board, self.to_board];
        let store = ctx.forum_store.as_ref();
        store.recount_board_topics(&boards)?;
        store.recount_board_posts(&boards)?;
        store.recount_board_unapproved(&boards)?;
        cursor.offset = 1;
        Ok(StageStatus::Finished)
    }
}

pub fn pipeline(
    ctx: &MaintenanceContext,
    from_board: i64,
    to_board: i64,
) -> Result<Pipeline, JobError> {
    if from_board == to_board {
        return Err(JobError::BadOptions(
            "source and destination board are the same".to_string(),
        ));
    }
    for board_id in [from_board, to_board] {
        if ctx.forum_store.board(board_id)?.is_none() {
            return Err(JobError::BoardNotFound { board_id });
        }
    }
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(MoveTopicRows {
            from_board,
            to_board,
        }),
        Box::new(RecountMovedBoards {
            from_board,
            to_board,
        }),
    ];
    Ok(Pipeline::new(JobKind::MoveTopics, stages))
}

pub fn finish(cursor: &mut Cursor, from_board: i64, to_board: i64) -> JobSummary {
    JobSummary::TopicsMoved {
        moved: cursor.accumulators.count(TOPICS_MOVED) as u64,
        from_board,
        to_board,
    }
}

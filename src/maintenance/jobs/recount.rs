//! Recount job: rebuild every derived counter from the source rows.
//!
//! The recomputations are set-based UPDATEs over id chunks, so a chunk
//! that runs twice lands on the same values. That is what makes it safe
//! to redo work after a crash between a chunk and its suspend point.

use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::JobSummary;
use crate::maintenance::pipeline::{Pipeline, Stage, StageStatus};
use crate::maintenance::registry::JobKind;

const MESSAGES_REPOINTED: &str = "messages_repointed";

#[derive(Clone, Copy)]
enum Target {
    TopicMessages,
    BoardPosts,
    BoardTopics,
    BoardUnapproved,
    MessageBoards,
    MemberPosts,
}

struct RecountStage {
    target: Target,
}

impl RecountStage {
    fn page(&self, ctx: &MaintenanceContext, offset: u64) -> Result<Vec<i64>, JobError> {
        let chunk = ctx.settings.row_chunk_size;
        let ids = match self.target {
            Target::TopicMessages | Target::MessageBoards => {
                ctx.forum_store.topic_ids_page(chunk, offset)?
            }
            Target::BoardPosts | Target::BoardTopics | Target::BoardUnapproved => {
                ctx.forum_store.board_ids_page(chunk, offset)?
            }
            Target::MemberPosts => ctx.forum_store.member_ids_page(chunk, offset)?,
        };
        Ok(ids)
    }
}

impl Stage for RecountStage {
    fn name(&self) -> &'static str {
        match self.target {
            Target::TopicMessages => "topic_message_counts",
            Target::BoardPosts => "board_post_counts",
            Target::BoardTopics => "board_topic_counts",
            Target::BoardUnapproved => "board_unapproved_counts",
            Target::MessageBoards => "message_board_repair",
            Target::MemberPosts => "member_post_counts",
        }
    }

    fn total(&self, ctx: &MaintenanceContext, _cursor: &Cursor) -> Result<u64, JobError> {
        let total = match self.target {
            Target::TopicMessages | Target::MessageBoards => ctx.forum_store.count_topics()?,
            Target::BoardPosts | Target::BoardTopics | Target::BoardUnapproved => {
                ctx.forum_store.count_boards()?
            }
            Target::MemberPosts => ctx.forum_store.count_members()?,
        };
        Ok(total)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let store = ctx.forum_store.as_ref();
        loop {
            let ids = self.page(ctx, cursor.offset)?;
            if ids.is_empty() {
                return Ok(StageStatus::Finished);
            }
            match self.target {
                Target::TopicMessages => {
                    store.recount_topic_messages(&ids)?;
                }
                Target::BoardPosts => {
                    store.recount_board_posts(&ids)?;
                }
                Target::BoardTopics => {
                    store.recount_board_topics(&ids)?;
                }
                Target::BoardUnapproved => {
                    store.recount_board_unapproved(&ids)?;
                }
                Target::MessageBoards => {
                    let repointed = store.repoint_messages_to_topic_board(&ids)?;
                    cursor
                        .accumulators
                        .add(MESSAGES_REPOINTED, repointed as i64);
                }
                Target::MemberPosts => {
                    store.recount_member_posts(&ids)?;
                }
            }
            cursor.offset += ids.len() as u64;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

pub fn pipeline() -> Pipeline {
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(RecountStage {
            target: Target::TopicMessages,
        }),
        Box::new(RecountStage {
            target: Target::BoardPosts,
        }),
        Box::new(RecountStage {
            target: Target::BoardTopics,
        }),
        Box::new(RecountStage {
            target: Target::BoardUnapproved,
        }),
        Box::new(RecountStage {
            target: Target::MessageBoards,
        }),
        Box::new(RecountStage {
            target: Target::MemberPosts,
        }),
    ];
    Pipeline::new(JobKind::RecountTotals, stages)
}

pub fn finish(ctx: &MaintenanceContext, cursor: &mut Cursor) -> Result<JobSummary, JobError> {
    Ok(JobSummary::Recount {
        topics: ctx.forum_store.count_topics()?,
        boards: ctx.forum_store.count_boards()?,
        members: ctx.forum_store.count_members()?,
        messages_repointed: cursor.accumulators.count(MESSAGES_REPOINTED) as u64,
    })
}

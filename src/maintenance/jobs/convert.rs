//! Rebuild job: rewrite message texts out of legacy entity encoding.
//!
//! Older imports stored subjects and bodies with HTML entities baked
//! in. This walks every message once, decodes named and numeric
//! entities, and only writes rows that actually change. Unknown
//! entities and invalid codepoints are left untouched rather than
//! guessed at.

use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::JobSummary;
use crate::maintenance::pipeline::{Pipeline, Stage, StageStatus};
use crate::maintenance::registry::JobKind;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;

const EXAMINED: &str = "examined";
const REWRITTEN: &str = "rewritten";

lazy_static! {
    static ref ENTITY_RE: Regex =
        Regex::new("&(?:#(?P<dec>[0-9]{1,7})|#[xX](?P<hex>[0-9a-fA-F]{1,6})|(?P<named>[a-zA-Z]{2,8}));")
            .unwrap();
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// One decoding pass. Double-encoded text sheds one layer per job run,
/// which matches how the encoding was stacked up in the first place.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(input, |caps: &Captures| {
        let decoded = if let Some(dec) = caps.name("dec") {
            dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
        } else if let Some(hex) = caps.name("hex") {
            u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            caps.name("named").and_then(|m| named_entity(m.as_str()))
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
}

struct RebuildMessageTexts;

impl Stage for RebuildMessageTexts {
    fn name(&self) -> &'static str {
        "rebuild_message_texts"
    }

    fn total(&self, ctx: &MaintenanceContext, _cursor: &Cursor) -> Result<u64, JobError> {
        Ok(ctx.forum_store.count_messages()?)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let store = ctx.forum_store.as_ref();
        let chunk = ctx.settings.row_chunk_size;
        loop {
            let messages = store.messages_page(chunk, cursor.offset)?;
            if messages.is_empty() {
                return Ok(StageStatus::Finished);
            }
            for message in &messages {
                let subject = decode_entities(&message.subject);
                let body = decode_entities(&message.body);
                let changed = matches!(subject, Cow::Owned(_)) || matches!(body, Cow::Owned(_));
                if changed {
                    store.update_message_text(message.id, &subject, &body)?;
                    cursor.accumulators.add(REWRITTEN, 1);
                }
                cursor.accumulators.add(EXAMINED, 1);
            }
            cursor.offset += messages.len() as u64;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

pub fn pipeline() -> Pipeline {
    Pipeline::new(JobKind::RebuildBodies, vec![Box::new(RebuildMessageTexts)])
}

pub fn finish(cursor: &mut Cursor) -> JobSummary {
    JobSummary::BodiesRebuilt {
        examined: cursor.accumulators.count(EXAMINED) as u64,
        rewritten: cursor.accumulators.count(REWRITTEN) as u64,
    }
}

//! Transfer job: move attachment files from one folder to another.
//!
//! Every chunk is two-phase: files move on disk first, then the chunk's
//! rows repoint in one transaction. A crash between the phases leaves
//! files at the destination with rows still naming the source, which
//! the retry detects and counts as moved instead of failed.
//!
//! Progress through the source is tracked by an id watermark rather
//! than an offset, because the set of rows in the source folder shrinks
//! as chunks commit.

use crate::forum_store::AttachmentFolder;
use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::jobs::JobSummary;
use crate::maintenance::pipeline::{Pipeline, Stage, StageStatus};
use crate::maintenance::registry::JobKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MOVED: &str = "moved";
const MOVE_FAILED: &str = "move_failed";
const ROLLOVERS: &str = "rollovers";
const LAST_ID: &str = "last_id";
const DEST_FOLDER: &str = "dest_folder";
const DEST_FILES: &str = "dest_files";
const DEST_BYTES: &str = "dest_bytes";
const TOTAL_TO_MOVE: &str = "total_to_move";
const NOTHING_TO_MOVE: &str = "nothing_to_move";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Stop with an error when the destination fills up.
    #[default]
    Manual,
    /// Create numbered sibling folders and keep going.
    AutoRollover,
}

/// Running occupancy of the active destination folder. A limit of zero
/// means unlimited. A folder always accepts at least one file, so a
/// file bigger than the byte limit cannot roll over forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityLedger {
    files: u64,
    bytes: u64,
    file_limit: u64,
    byte_limit: u64,
}

impl CapacityLedger {
    pub fn new(files: u64, bytes: u64, file_limit: u64, byte_limit: u64) -> Self {
        Self {
            files,
            bytes,
            file_limit,
            byte_limit,
        }
    }

    pub fn occupied(&self) -> bool {
        self.files > 0
    }

    pub fn would_exceed(&self, size: u64) -> bool {
        (self.file_limit > 0 && self.files + 1 > self.file_limit)
            || (self.byte_limit > 0 && self.bytes + size > self.byte_limit)
    }

    pub fn record(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }

    pub fn reset(&mut self) {
        self.files = 0;
        self.bytes = 0;
    }

    pub fn files(&self) -> u64 {
        self.files
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn describe(&self) -> String {
        format!(
            "{} files, {:#}",
            self.files,
            byte_unit::Byte::from(self.bytes)
        )
    }
}

/// "attachments_3" rolls over to "attachments_4", not "attachments_3_1".
fn rollover_base(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

fn allocate_rollover_folder(
    ctx: &MaintenanceContext,
    current: &AttachmentFolder,
) -> Result<AttachmentFolder, JobError> {
    let current_path = Path::new(&current.path);
    let parent = current_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = current_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachments".to_string());
    let base = rollover_base(&name);
    let taken: HashSet<String> = ctx
        .forum_store
        .attachment_folders()?
        .into_iter()
        .map(|folder| folder.path)
        .collect();
    for n in 1..=9999 {
        let candidate = parent.join(format!("{base}_{n}"));
        let candidate_str = candidate.to_string_lossy().into_owned();
        if taken.contains(&candidate_str) || ctx.attachment_fs.folder_exists(&candidate) {
            continue;
        }
        ctx.attachment_fs.create_folder(&candidate)?;
        let folder = ctx.forum_store.create_attachment_folder(&candidate_str)?;
        info!(
            folder = folder.id,
            path = %candidate_str,
            "Rolled over to a new attachment folder"
        );
        return Ok(folder);
    }
    Err(JobError::Internal(anyhow::anyhow!(
        "No free rollover folder name next to {}",
        current.path
    )))
}

struct MoveAttachments {
    source: i64,
    destination: i64,
    mode: TransferMode,
}

impl Stage for MoveAttachments {
    fn name(&self) -> &'static str {
        "move_attachment_files"
    }

    fn total(&self, ctx: &MaintenanceContext, cursor: &Cursor) -> Result<u64, JobError> {
        if cursor.accumulators.has_count(TOTAL_TO_MOVE) {
            return Ok(cursor.accumulators.count(TOTAL_TO_MOVE) as u64);
        }
        Ok(ctx.forum_store.count_attachments_in_folder(self.source)?)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let store = ctx.forum_store.as_ref();
        let fs = ctx.attachment_fs.as_ref();

        let source_folder =
            store
                .attachment_folder(self.source)?
                .ok_or(JobError::FolderNotFound {
                    folder_id: self.source,
                })?;
        let source_dir = PathBuf::from(&source_folder.path);

        if !cursor.accumulators.has_count(TOTAL_TO_MOVE) {
            let total = store.count_attachments_in_folder(self.source)?;
            cursor.accumulators.set_count(TOTAL_TO_MOVE, total as i64);
            if total == 0 {
                cursor.accumulators.set_count(NOTHING_TO_MOVE, 1);
                return Ok(StageStatus::Finished);
            }
            // The ledger starts from what the destination already holds.
            let (files, bytes) = store.folder_usage(self.destination)?;
            cursor.accumulators.set_count(DEST_FOLDER, self.destination);
            cursor.accumulators.set_count(DEST_FILES, files as i64);
            cursor.accumulators.set_count(DEST_BYTES, bytes as i64);
        }

        let mut dest_id = cursor.accumulators.count(DEST_FOLDER);
        let mut dest_folder =
            store
                .attachment_folder(dest_id)?
                .ok_or(JobError::FolderNotFound {
                    folder_id: dest_id,
                })?;
        let mut dest_dir = PathBuf::from(&dest_folder.path);
        let mut ledger = CapacityLedger::new(
            cursor.accumulators.count(DEST_FILES) as u64,
            cursor.accumulators.count(DEST_BYTES) as u64,
            ctx.settings.folder_file_limit,
            ctx.settings.folder_byte_limit,
        );

        loop {
            let after_id = cursor.accumulators.count(LAST_ID);
            let chunk = ctx.settings.attachment_chunk_size;
            // One row past the chunk size is the sentinel: it tells a
            // full chunk with work remaining from the final one without
            // an extra query, and is not processed itself.
            let mut batch =
                store.attachments_in_folder_above(self.source, after_id, chunk + 1)?;
            if batch.is_empty() {
                return Ok(StageStatus::Finished);
            }
            let more_after = batch.len() as u64 > chunk;
            batch.truncate(chunk as usize);
            let mut repoint: Vec<i64> = Vec::new();
            for attachment in &batch {
                let size = attachment.size.max(0) as u64;
                if ledger.occupied() && ledger.would_exceed(size) {
                    // Flush what already moved into the folder we are
                    // about to leave behind.
                    if !repoint.is_empty() {
                        store.repoint_attachments_folder(&repoint, dest_id)?;
                        repoint.clear();
                    }
                    match self.mode {
                        TransferMode::Manual => {
                            return Err(JobError::CapacityExceeded {
                                folder_id: dest_id,
                                detail: ledger.describe(),
                            });
                        }
                        TransferMode::AutoRollover => {
                            dest_folder = allocate_rollover_folder(ctx, &dest_folder)?;
                            dest_id = dest_folder.id;
                            dest_dir = PathBuf::from(&dest_folder.path);
                            ledger.reset();
                            cursor.accumulators.add(ROLLOVERS, 1);
                        }
                    }
                }
                let name = attachment.disk_name();
                match fs.move_file(&source_dir, &dest_dir, &name) {
                    Ok(()) => {
                        repoint.push(attachment.id);
                        ledger.record(size);
                        cursor.accumulators.add(MOVED, 1);
                    }
                    Err(err) => {
                        // A crash between a file landing and its chunk
                        // repoint leaves the file at the destination;
                        // the retry finds it there and keeps going.
                        let already_there = matches!(fs.file_size(&dest_dir, &name), Ok(Some(_)))
                            && matches!(fs.file_size(&source_dir, &name), Ok(None));
                        if already_there {
                            repoint.push(attachment.id);
                            ledger.record(size);
                            cursor.accumulators.add(MOVED, 1);
                        } else {
                            warn!(
                                attachment = attachment.id,
                                error = %err,
                                "Failed to move attachment file"
                            );
                            cursor.accumulators.add(MOVE_FAILED, 1);
                        }
                    }
                }
                cursor.accumulators.set_count(LAST_ID, attachment.id);
            }
            if !repoint.is_empty() {
                store.repoint_attachments_folder(&repoint, dest_id)?;
            }
            cursor.accumulators.set_count(DEST_FOLDER, dest_id);
            cursor.accumulators.set_count(DEST_FILES, ledger.files() as i64);
            cursor.accumulators.set_count(DEST_BYTES, ledger.bytes() as i64);
            cursor.offset += batch.len() as u64;
            if !more_after {
                return Ok(StageStatus::Finished);
            }
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

pub fn pipeline(
    ctx: &MaintenanceContext,
    source: i64,
    destination: i64,
    mode: TransferMode,
) -> Result<Pipeline, JobError> {
    if source == destination {
        return Err(JobError::BadOptions(
            "source and destination are the same folder".to_string(),
        ));
    }
    for folder_id in [source, destination] {
        if ctx.forum_store.attachment_folder(folder_id)?.is_none() {
            return Err(JobError::FolderNotFound { folder_id });
        }
    }
    Ok(Pipeline::new(
        JobKind::TransferAttachments,
        vec![Box::new(MoveAttachments {
            source,
            destination,
            mode,
        })],
    ))
}

pub fn finish(cursor: &mut Cursor) -> JobSummary {
    if cursor.accumulators.count(NOTHING_TO_MOVE) != 0 {
        return JobSummary::NothingToTransfer;
    }
    JobSummary::Transfer {
        moved: cursor.accumulators.count(MOVED) as u64,
        failed: cursor.accumulators.count(MOVE_FAILED) as u64,
        rollovers: cursor.accumulators.count(ROLLOVERS) as u64,
        final_folder: cursor.accumulators.count(DEST_FOLDER),
    }
}

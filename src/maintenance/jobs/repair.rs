//! Repair job: find and fix attachment inconsistencies.
//!
//! The job runs in two modes. With no categories selected it is a pure
//! detection pass: six scans that flag problems into a findings record
//! without touching a single row (stale upload temp files are the one
//! exception, they are deleted on sight). With categories selected it
//! is a fix pass over a previously stored findings record; every item
//! is re-verified against the live database before anything is changed,
//! so findings that reality has since resolved are skipped, not
//! re-broken.

use crate::forum_store::{Attachment, AttachmentKind, ForumStore};
use crate::maintenance::budget::TimeBudget;
use crate::maintenance::context::MaintenanceContext;
use crate::maintenance::cursor::Cursor;
use crate::maintenance::error::JobError;
use crate::maintenance::fs::AttachmentFs;
use crate::maintenance::jobs::JobSummary;
use crate::maintenance::pipeline::{Pipeline, Stage, StageStatus};
use crate::maintenance::registry::JobKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

pub const FINDINGS_KEY: &str = "repair_findings";

const TEMP_REMOVED: &str = "temp_files_removed";
const FIX_FAILED: &str = "fix_failed";
const WALK_TOTAL: &str = "walk_total";
const TEMP_PREFIX: &str = "post_tmp_";
const SENTINEL_FILES: [&str; 2] = ["index.html", ".htaccess"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCategory {
    /// Thumbnail row no parent attachment points at.
    ThumbWithoutParent,
    /// Parent row whose thumbnail reference points at nothing.
    ParentMissingThumb,
    /// Backing file missing, empty, or sized differently than the row.
    FileMismatch,
    /// Avatar row whose owning member is gone.
    AvatarWithoutMember,
    /// Attachment row whose message is gone.
    AttachmentWithoutMessage,
    /// Backing file found in a different folder than the row names.
    WrongFolder,
    /// Row without a recorded extension although the filename has one.
    MissingExtension,
    /// Disk file no attachment row accounts for.
    UntrackedOnDisk,
}

impl ProblemCategory {
    pub const ALL: [ProblemCategory; 8] = [
        ProblemCategory::ThumbWithoutParent,
        ProblemCategory::ParentMissingThumb,
        ProblemCategory::FileMismatch,
        ProblemCategory::AvatarWithoutMember,
        ProblemCategory::AttachmentWithoutMessage,
        ProblemCategory::WrongFolder,
        ProblemCategory::MissingExtension,
        ProblemCategory::UntrackedOnDisk,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProblemCategory::ThumbWithoutParent => "thumb_without_parent",
            ProblemCategory::ParentMissingThumb => "parent_missing_thumb",
            ProblemCategory::FileMismatch => "file_mismatch",
            ProblemCategory::AvatarWithoutMember => "avatar_without_member",
            ProblemCategory::AttachmentWithoutMessage => "attachment_without_message",
            ProblemCategory::WrongFolder => "wrong_folder",
            ProblemCategory::MissingExtension => "missing_extension",
            ProblemCategory::UntrackedOnDisk => "untracked_on_disk",
        }
    }

    fn fix_stage_name(&self) -> &'static str {
        match self {
            ProblemCategory::ThumbWithoutParent => "fix_thumb_without_parent",
            ProblemCategory::ParentMissingThumb => "fix_parent_missing_thumb",
            ProblemCategory::FileMismatch => "fix_file_mismatch",
            ProblemCategory::AvatarWithoutMember => "fix_avatar_without_member",
            ProblemCategory::AttachmentWithoutMessage => "fix_attachment_without_message",
            ProblemCategory::WrongFolder => "fix_wrong_folder",
            ProblemCategory::MissingExtension => "fix_missing_extension",
            ProblemCategory::UntrackedOnDisk => "fix_untracked_on_disk",
        }
    }
}

/// What a detection pass leaves behind for a later fix pass. Untracked
/// files have no row ids, so they are recorded as "folder_id/name".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairFindings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<ProblemCategory, u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ids: BTreeMap<ProblemCategory, Vec<i64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

pub fn load_findings(ctx: &MaintenanceContext) -> Result<Option<RepairFindings>, JobError> {
    match ctx.state.get(&ctx.session_id, FINDINGS_KEY)? {
        Some(raw) => {
            let findings = serde_json::from_str(&raw)
                .map_err(|err| JobError::Internal(anyhow::Error::new(err)))?;
            Ok(Some(findings))
        }
        None => Ok(None),
    }
}

fn folder_dirs(ctx: &MaintenanceContext) -> Result<BTreeMap<i64, PathBuf>, JobError> {
    let dirs = ctx
        .forum_store
        .attachment_folders()?
        .into_iter()
        .map(|folder| (folder.id, PathBuf::from(folder.path)))
        .collect();
    Ok(dirs)
}

fn extension_of(filename: &str) -> Option<&str> {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Lowest-id folder other than `own` that holds the named file.
fn find_in_folders(
    fs: &dyn AttachmentFs,
    dirs: &BTreeMap<i64, PathBuf>,
    own: i64,
    name: &str,
) -> Result<Option<i64>, JobError> {
    for (folder_id, dir) in dirs {
        if *folder_id == own {
            continue;
        }
        if fs.file_size(dir, name)?.is_some() {
            return Ok(Some(*folder_id));
        }
    }
    Ok(None)
}

fn flag(cursor: &mut Cursor, category: ProblemCategory, id: i64) {
    cursor.accumulators.add(category.key(), 1);
    cursor.accumulators.push_id(category.key(), id);
}

// =========================================================================
// Detection stages
// =========================================================================

#[derive(Clone, Copy)]
enum ScanKind {
    OrphanedThumbnails,
    MissingThumbnails,
    FileProblems,
    OrphanedAvatars,
    OrphanedAttachments,
}

struct DetectStage {
    scan: ScanKind,
}

fn inspect_file_row(
    fs: &dyn AttachmentFs,
    dirs: &BTreeMap<i64, PathBuf>,
    row: &Attachment,
    cursor: &mut Cursor,
) -> Result<(), JobError> {
    if row.file_ext.is_empty() && extension_of(&row.filename).is_some() {
        flag(cursor, ProblemCategory::MissingExtension, row.id);
    }
    let name = row.disk_name();
    let on_disk = match dirs.get(&row.folder_id) {
        Some(dir) => fs.file_size(dir, &name)?,
        None => None,
    };
    match on_disk {
        Some(0) => flag(cursor, ProblemCategory::FileMismatch, row.id),
        Some(size) if size as i64 != row.size => {
            flag(cursor, ProblemCategory::FileMismatch, row.id)
        }
        Some(_) => {}
        None => match find_in_folders(fs, dirs, row.folder_id, &name)? {
            Some(_) => flag(cursor, ProblemCategory::WrongFolder, row.id),
            None => flag(cursor, ProblemCategory::FileMismatch, row.id),
        },
    }
    Ok(())
}

impl Stage for DetectStage {
    fn name(&self) -> &'static str {
        match self.scan {
            ScanKind::OrphanedThumbnails => "detect_orphaned_thumbnails",
            ScanKind::MissingThumbnails => "detect_missing_thumbnails",
            ScanKind::FileProblems => "detect_file_problems",
            ScanKind::OrphanedAvatars => "detect_orphaned_avatars",
            ScanKind::OrphanedAttachments => "detect_orphaned_attachments",
        }
    }

    fn total(&self, ctx: &MaintenanceContext, _cursor: &Cursor) -> Result<u64, JobError> {
        let store = ctx.forum_store.as_ref();
        let total = match self.scan {
            ScanKind::OrphanedThumbnails => store.count_orphaned_thumbnails()?,
            ScanKind::MissingThumbnails => store.count_parents_missing_thumbnail()?,
            ScanKind::FileProblems => store.count_attachments()?,
            ScanKind::OrphanedAvatars => store.count_orphaned_avatars()?,
            ScanKind::OrphanedAttachments => store.count_orphaned_attachments()?,
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
        let fs = ctx.attachment_fs.as_ref();
        let chunk = ctx.settings.attachment_chunk_size;
        loop {
            let rows = match self.scan {
                ScanKind::OrphanedThumbnails => {
                    store.orphaned_thumbnails_page(chunk, cursor.offset)?
                }
                ScanKind::MissingThumbnails => {
                    store.parents_missing_thumbnail_page(chunk, cursor.offset)?
                }
                ScanKind::FileProblems => store.attachments_page(chunk, cursor.offset)?,
                ScanKind::OrphanedAvatars => store.orphaned_avatars_page(chunk, cursor.offset)?,
                ScanKind::OrphanedAttachments => {
                    store.orphaned_attachments_page(chunk, cursor.offset)?
                }
            };
            if rows.is_empty() {
                return Ok(StageStatus::Finished);
            }
            match self.scan {
                ScanKind::OrphanedThumbnails => {
                    for row in &rows {
                        flag(cursor, ProblemCategory::ThumbWithoutParent, row.id);
                    }
                }
                ScanKind::MissingThumbnails => {
                    for row in &rows {
                        flag(cursor, ProblemCategory::ParentMissingThumb, row.id);
                    }
                }
                ScanKind::OrphanedAvatars => {
                    for row in &rows {
                        flag(cursor, ProblemCategory::AvatarWithoutMember, row.id);
                    }
                }
                ScanKind::OrphanedAttachments => {
                    for row in &rows {
                        flag(cursor, ProblemCategory::AttachmentWithoutMessage, row.id);
                    }
                }
                ScanKind::FileProblems => {
                    let dirs = folder_dirs(ctx)?;
                    for row in &rows {
                        inspect_file_row(fs, &dirs, row, cursor)?;
                    }
                }
            }
            cursor.offset += rows.len() as u64;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

/// Walk every attachment folder for files the database knows nothing
/// about. Stale upload temp files are deleted as they are met; sentinel
/// files that belong in every folder are skipped.
struct DetectUntrackedFiles;

impl DetectUntrackedFiles {
    fn snapshot(
        &self,
        ctx: &MaintenanceContext,
    ) -> Result<(BTreeMap<i64, PathBuf>, Vec<(i64, crate::maintenance::fs::FolderEntry)>), JobError>
    {
        let fs = ctx.attachment_fs.as_ref();
        let mut folders = ctx.forum_store.attachment_folders()?;
        folders.sort_by_key(|folder| folder.id);
        let mut dirs = BTreeMap::new();
        let mut entries = Vec::new();
        for folder in folders {
            let dir = PathBuf::from(&folder.path);
            if !fs.folder_exists(&dir) {
                continue;
            }
            for entry in fs.list_folder(&dir)? {
                entries.push((folder.id, entry));
            }
            dirs.insert(folder.id, dir);
        }
        Ok((dirs, entries))
    }
}

impl Stage for DetectUntrackedFiles {
    fn name(&self) -> &'static str {
        "detect_untracked_files"
    }

    fn total(&self, ctx: &MaintenanceContext, cursor: &Cursor) -> Result<u64, JobError> {
        if cursor.accumulators.has_count(WALK_TOTAL) {
            return Ok(cursor.accumulators.count(WALK_TOTAL) as u64);
        }
        let (_, entries) = self.snapshot(ctx)?;
        Ok(entries.len() as u64)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let store = ctx.forum_store.as_ref();
        let fs = ctx.attachment_fs.as_ref();
        let (dirs, entries) = self.snapshot(ctx)?;
        if !cursor.accumulators.has_count(WALK_TOTAL) {
            cursor
                .accumulators
                .set_count(WALK_TOTAL, entries.len() as i64);
        }
        // Deleted temp files shrink later snapshots, so the resume
        // index is the offset minus everything removed so far.
        let removed = cursor.accumulators.count(TEMP_REMOVED).max(0) as u64;
        let mut index = cursor.offset.saturating_sub(removed) as usize;
        let chunk = ctx.settings.walk_chunk_size as usize;
        let ttl = ctx.settings.temp_file_ttl;
        loop {
            if index >= entries.len() {
                return Ok(StageStatus::Finished);
            }
            let end = (index + chunk).min(entries.len());
            for (folder_id, entry) in &entries[index..end] {
                if SENTINEL_FILES.contains(&entry.name.as_str()) {
                    cursor.offset += 1;
                    continue;
                }
                if entry.name.starts_with(TEMP_PREFIX) {
                    let stale = SystemTime::now()
                        .duration_since(entry.modified)
                        .map(|age| age >= ttl)
                        .unwrap_or(false);
                    if stale {
                        if let Some(dir) = dirs.get(folder_id) {
                            match fs.remove_file(dir, &entry.name) {
                                Ok(()) => {
                                    cursor.accumulators.add(TEMP_REMOVED, 1);
                                }
                                Err(err) => warn!(
                                    file = %entry.name,
                                    error = %err,
                                    "Failed to remove stale upload temp file"
                                ),
                            }
                        }
                    }
                    cursor.offset += 1;
                    continue;
                }
                if !store.is_tracked_file(&entry.name)? {
                    let key = ProblemCategory::UntrackedOnDisk.key();
                    cursor.accumulators.add(key, 1);
                    cursor
                        .accumulators
                        .push_name(key, format!("{folder_id}/{}", entry.name));
                }
                cursor.offset += 1;
            }
            index = end;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

// =========================================================================
// Fix stages
// =========================================================================

enum FixOutcome {
    Fixed,
    Skipped,
    Failed,
}

/// Remove a row together with its backing file and, for parents, the
/// thumbnail row and file hanging off it. Files go first so a crash in
/// between leaves a detectable mismatch rather than an untracked file.
fn delete_attachment_and_file(
    store: &dyn ForumStore,
    fs: &dyn AttachmentFs,
    dirs: &BTreeMap<i64, PathBuf>,
    attachment: &Attachment,
) -> Result<FixOutcome, JobError> {
    if let Some(dir) = dirs.get(&attachment.folder_id) {
        let name = attachment.disk_name();
        if matches!(fs.file_size(dir, &name), Ok(Some(_))) {
            if let Err(err) = fs.remove_file(dir, &name) {
                warn!(attachment = attachment.id, error = %err, "Failed to remove attachment file");
                return Ok(FixOutcome::Failed);
            }
        }
    }
    if attachment.thumbnail_id != 0 {
        if let Some(thumb) = store.attachment(attachment.thumbnail_id)? {
            if let Some(dir) = dirs.get(&thumb.folder_id) {
                let name = thumb.disk_name();
                if matches!(fs.file_size(dir, &name), Ok(Some(_))) {
                    if let Err(err) = fs.remove_file(dir, &name) {
                        // The thumbnail file lingers as untracked; the
                        // rows still have to go.
                        warn!(attachment = thumb.id, error = %err, "Failed to remove thumbnail file");
                    }
                }
            }
            store.delete_attachment(thumb.id)?;
        }
    }
    store.delete_attachment(attachment.id)?;
    Ok(FixOutcome::Fixed)
}

fn apply_row_fix(
    store: &dyn ForumStore,
    fs: &dyn AttachmentFs,
    dirs: &BTreeMap<i64, PathBuf>,
    category: ProblemCategory,
    id: i64,
) -> Result<FixOutcome, JobError> {
    let Some(attachment) = store.attachment(id)? else {
        return Ok(FixOutcome::Skipped);
    };
    match category {
        ProblemCategory::ThumbWithoutParent => {
            if attachment.kind == AttachmentKind::Thumbnail
                && !store.thumbnail_has_parent(attachment.id)?
            {
                delete_attachment_and_file(store, fs, dirs, &attachment)
            } else {
                Ok(FixOutcome::Skipped)
            }
        }
        ProblemCategory::ParentMissingThumb => {
            if attachment.thumbnail_id != 0 && !store.attachment_exists(attachment.thumbnail_id)? {
                store.clear_attachment_thumbnail(attachment.id)?;
                Ok(FixOutcome::Fixed)
            } else {
                Ok(FixOutcome::Skipped)
            }
        }
        ProblemCategory::FileMismatch => {
            let name = attachment.disk_name();
            let on_disk = match dirs.get(&attachment.folder_id) {
                Some(dir) => match fs.file_size(dir, &name) {
                    Ok(size) => size,
                    Err(err) => {
                        warn!(attachment = id, error = %err, "Failed to stat attachment file");
                        return Ok(FixOutcome::Failed);
                    }
                },
                None => None,
            };
            match on_disk {
                None | Some(0) => delete_attachment_and_file(store, fs, dirs, &attachment),
                Some(size) if size as i64 != attachment.size => {
                    store.update_attachment_size(attachment.id, size as i64)?;
                    Ok(FixOutcome::Fixed)
                }
                Some(_) => Ok(FixOutcome::Skipped),
            }
        }
        ProblemCategory::AvatarWithoutMember => {
            if attachment.member_id != 0 && store.member(attachment.member_id)?.is_none() {
                delete_attachment_and_file(store, fs, dirs, &attachment)
            } else {
                Ok(FixOutcome::Skipped)
            }
        }
        ProblemCategory::AttachmentWithoutMessage => {
            if attachment.message_id != 0 && store.message(attachment.message_id)?.is_none() {
                delete_attachment_and_file(store, fs, dirs, &attachment)
            } else {
                Ok(FixOutcome::Skipped)
            }
        }
        ProblemCategory::WrongFolder => {
            let name = attachment.disk_name();
            let in_own = match dirs.get(&attachment.folder_id) {
                Some(dir) => fs.file_size(dir, &name)?.is_some(),
                None => false,
            };
            if in_own {
                return Ok(FixOutcome::Skipped);
            }
            match find_in_folders(fs, dirs, attachment.folder_id, &name)? {
                Some(folder_id) => {
                    store.repoint_attachment_folder(attachment.id, folder_id)?;
                    Ok(FixOutcome::Fixed)
                }
                None => Ok(FixOutcome::Skipped),
            }
        }
        ProblemCategory::MissingExtension => {
            if !attachment.file_ext.is_empty() {
                return Ok(FixOutcome::Skipped);
            }
            match extension_of(&attachment.filename) {
                Some(ext) => {
                    store.update_attachment_ext(attachment.id, ext)?;
                    Ok(FixOutcome::Fixed)
                }
                None => Ok(FixOutcome::Skipped),
            }
        }
        ProblemCategory::UntrackedOnDisk => Ok(FixOutcome::Skipped),
    }
}

fn apply_untracked_fix(
    store: &dyn ForumStore,
    fs: &dyn AttachmentFs,
    dirs: &BTreeMap<i64, PathBuf>,
    item: &str,
) -> Result<FixOutcome, JobError> {
    let Some((folder_str, name)) = item.split_once('/') else {
        return Ok(FixOutcome::Skipped);
    };
    let Ok(folder_id) = folder_str.parse::<i64>() else {
        return Ok(FixOutcome::Skipped);
    };
    // A row may have appeared for this file since the detection pass.
    if store.is_tracked_file(name)? {
        return Ok(FixOutcome::Skipped);
    }
    let Some(dir) = dirs.get(&folder_id) else {
        return Ok(FixOutcome::Skipped);
    };
    match fs.file_size(dir, name) {
        Ok(Some(_)) => match fs.remove_file(dir, name) {
            Ok(()) => Ok(FixOutcome::Fixed),
            Err(err) => {
                warn!(file = %name, error = %err, "Failed to remove untracked file");
                Ok(FixOutcome::Failed)
            }
        },
        Ok(None) => Ok(FixOutcome::Skipped),
        Err(err) => {
            warn!(file = %name, error = %err, "Failed to stat untracked file");
            Ok(FixOutcome::Failed)
        }
    }
}

struct ApplyFix {
    category: ProblemCategory,
}

impl Stage for ApplyFix {
    fn name(&self) -> &'static str {
        self.category.fix_stage_name()
    }

    fn total(&self, ctx: &MaintenanceContext, _cursor: &Cursor) -> Result<u64, JobError> {
        let findings = load_findings(ctx)?.ok_or(JobError::MissingFindings)?;
        let total = match self.category {
            ProblemCategory::UntrackedOnDisk => findings.files.len(),
            category => findings.ids.get(&category).map_or(0, Vec::len),
        };
        Ok(total as u64)
    }

    fn process(
        &self,
        ctx: &MaintenanceContext,
        cursor: &mut Cursor,
        budget: &TimeBudget,
    ) -> Result<StageStatus, JobError> {
        let findings = load_findings(ctx)?.ok_or(JobError::MissingFindings)?;
        let store = ctx.forum_store.as_ref();
        let fs = ctx.attachment_fs.as_ref();
        let dirs = folder_dirs(ctx)?;

        enum Items<'a> {
            Rows(&'a [i64]),
            Files(&'a [String]),
        }
        let items = match self.category {
            ProblemCategory::UntrackedOnDisk => Items::Files(&findings.files),
            category => Items::Rows(findings.ids.get(&category).map_or(&[][..], Vec::as_slice)),
        };
        let total = match &items {
            Items::Rows(ids) => ids.len(),
            Items::Files(files) => files.len(),
        } as u64;

        let chunk = ctx.settings.attachment_chunk_size;
        loop {
            if cursor.offset >= total {
                return Ok(StageStatus::Finished);
            }
            let start = cursor.offset as usize;
            let end = (cursor.offset + chunk).min(total) as usize;
            for index in start..end {
                let outcome = match &items {
                    Items::Rows(ids) => apply_row_fix(store, fs, &dirs, self.category, ids[index])?,
                    Items::Files(files) => apply_untracked_fix(store, fs, &dirs, &files[index])?,
                };
                match outcome {
                    FixOutcome::Fixed => {
                        cursor.accumulators.add(self.category.key(), 1);
                    }
                    FixOutcome::Skipped => {}
                    FixOutcome::Failed => {
                        cursor.accumulators.add(FIX_FAILED, 1);
                    }
                }
            }
            cursor.offset = end as u64;
            if budget.exceeded() {
                return Ok(StageStatus::Yielded);
            }
        }
    }
}

// =========================================================================
// Pipeline assembly
// =========================================================================

/// The selected categories in canonical order, duplicates dropped.
fn chosen_categories(fix: &[ProblemCategory]) -> Vec<ProblemCategory> {
    ProblemCategory::ALL
        .iter()
        .copied()
        .filter(|category| fix.contains(category))
        .collect()
}

pub fn pipeline(ctx: &MaintenanceContext, fix: &[ProblemCategory]) -> Result<Pipeline, JobError> {
    if fix.is_empty() {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DetectStage {
                scan: ScanKind::OrphanedThumbnails,
            }),
            Box::new(DetectStage {
                scan: ScanKind::MissingThumbnails,
            }),
            Box::new(DetectStage {
                scan: ScanKind::FileProblems,
            }),
            Box::new(DetectStage {
                scan: ScanKind::OrphanedAvatars,
            }),
            Box::new(DetectStage {
                scan: ScanKind::OrphanedAttachments,
            }),
            Box::new(DetectUntrackedFiles),
        ];
        return Ok(Pipeline::new(JobKind::RepairAttachments, stages));
    }
    if load_findings(ctx)?.is_none() {
        return Err(JobError::MissingFindings);
    }
    let stages: Vec<Box<dyn Stage>> = chosen_categories(fix)
        .into_iter()
        .map(|category| Box::new(ApplyFix { category }) as Box<dyn Stage>)
        .collect();
    Ok(Pipeline::new(JobKind::RepairAttachments, stages))
}

pub fn finish(
    ctx: &MaintenanceContext,
    fix: &[ProblemCategory],
    cursor: &mut Cursor,
) -> Result<JobSummary, JobError> {
    if fix.is_empty() {
        let mut findings = RepairFindings::default();
        for category in ProblemCategory::ALL {
            let count = cursor.accumulators.count(category.key());
            if count > 0 {
                findings.counts.insert(category, count as u64);
            }
            if category == ProblemCategory::UntrackedOnDisk {
                findings.files = cursor.accumulators.take_names(category.key());
            } else {
                let ids = cursor.accumulators.take_ids(category.key());
                if !ids.is_empty() {
                    findings.ids.insert(category, ids);
                }
            }
        }
        let payload = serde_json::to_string(&findings)
            .map_err(|err| JobError::Internal(anyhow::Error::new(err)))?;
        ctx.state.put(&ctx.session_id, FINDINGS_KEY, &payload)?;
        return Ok(JobSummary::RepairReport {
            problems: findings.counts,
            temp_files_removed: cursor.accumulators.count(TEMP_REMOVED) as u64,
        });
    }
    let mut fixed = BTreeMap::new();
    for category in chosen_categories(fix) {
        fixed.insert(category, cursor.accumulators.count(category.key()) as u64);
    }
    // The findings are spent; a new fix pass needs a new detection.
    ctx.state.delete(&ctx.session_id, FINDINGS_KEY)?;
    Ok(JobSummary::RepairFixed {
        fixed,
        failed: cursor.accumulators.count(FIX_FAILED) as u64,
    })
}

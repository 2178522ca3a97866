//! ForumStore trait definition.
//!
//! Abstracts the forum database so the maintenance engine and the HTTP
//! layer never touch SQLite directly. The chunked scan methods are all
//! ordered by row id, which is what makes offset-based resumption
//! deterministic.

use super::models::{
    Attachment, AttachmentFolder, Board, Member, MemberRole, Message, NewAttachment, NewMessage,
    NewTopic, Topic,
};
use anyhow::Result;

pub trait ForumStore: Send + Sync {
    // =========================================================================
    // Entity Retrieval
    // =========================================================================

    fn board(&self, id: i64) -> Result<Option<Board>>;

    fn topic(&self, id: i64) -> Result<Option<Topic>>;

    fn message(&self, id: i64) -> Result<Option<Message>>;

    fn member(&self, id: i64) -> Result<Option<Member>>;

    fn member_by_name(&self, name: &str) -> Result<Option<Member>>;

    fn attachment(&self, id: i64) -> Result<Option<Attachment>>;

    fn attachment_folder(&self, id: i64) -> Result<Option<AttachmentFolder>>;

    fn attachment_folders(&self) -> Result<Vec<AttachmentFolder>>;

    // =========================================================================
    // Entity Counts
    // =========================================================================

    fn count_boards(&self) -> Result<u64>;

    fn count_topics(&self) -> Result<u64>;

    fn count_messages(&self) -> Result<u64>;

    fn count_members(&self) -> Result<u64>;

    fn count_attachments(&self) -> Result<u64>;

    fn count_topics_on_board(&self, board_id: i64) -> Result<u64>;

    fn count_attachments_in_folder(&self, folder_id: i64) -> Result<u64>;

    /// File count and byte total currently recorded for a folder.
    fn folder_usage(&self, folder_id: i64) -> Result<(u64, u64)>;

    // =========================================================================
    // Chunked Scans (ordered by id)
    // =========================================================================

    fn topic_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>>;

    fn board_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>>;

    fn member_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>>;

    fn attachments_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>>;

    fn messages_page(&self, limit: u64, offset: u64) -> Result<Vec<Message>>;

    /// Next batch of topics still sitting on a board, lowest ids first.
    fn topics_on_board(&self, board_id: i64, limit: u64) -> Result<Vec<i64>>;

    /// Attachments in a folder with id strictly above the watermark.
    fn attachments_in_folder_above(
        &self,
        folder_id: i64,
        after_id: i64,
        limit: u64,
    ) -> Result<Vec<Attachment>>;

    // =========================================================================
    // Integrity Scans (repair detect pass)
    // =========================================================================

    /// Thumbnail rows no parent attachment points at.
    fn orphaned_thumbnails_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>>;

    fn count_orphaned_thumbnails(&self) -> Result<u64>;

    /// Parent rows whose thumbnail reference points at nothing.
    fn parents_missing_thumbnail_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>>;

    fn count_parents_missing_thumbnail(&self) -> Result<u64>;

    /// Avatar rows whose owning member is gone.
    fn orphaned_avatars_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>>;

    fn count_orphaned_avatars(&self) -> Result<u64>;

    /// Attachment rows whose message is gone.
    fn orphaned_attachments_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>>;

    fn count_orphaned_attachments(&self) -> Result<u64>;

    fn attachment_exists(&self, id: i64) -> Result<bool>;

    /// Whether any parent attachment still points at this thumbnail.
    fn thumbnail_has_parent(&self, thumbnail_id: i64) -> Result<bool>;

    /// Whether a disk file name belongs to any attachment row, under
    /// either the hashed or the legacy naming scheme. Deliberately not
    /// folder-scoped; a file sitting in the wrong folder is mis-located
    /// rather than untracked.
    fn is_tracked_file(&self, disk_name: &str) -> Result<bool>;

    // =========================================================================
    // Aggregate Recomputation
    // =========================================================================
    //
    // Each of these recomputes derived counters from the source rows for
    // the given ids. They are set-based UPDATEs, so re-running any of
    // them is a no-op once the counters are correct.

    fn recount_topic_messages(&self, topic_ids: &[i64]) -> Result<usize>;

    fn recount_board_posts(&self, board_ids: &[i64]) -> Result<usize>;

    fn recount_board_topics(&self, board_ids: &[i64]) -> Result<usize>;

    fn recount_board_unapproved(&self, board_ids: &[i64]) -> Result<usize>;

    /// Repoint messages whose board disagrees with their topic's board.
    /// Returns the number of rows that were actually mis-pointed.
    fn repoint_messages_to_topic_board(&self, topic_ids: &[i64]) -> Result<usize>;

    fn recount_member_posts(&self, member_ids: &[i64]) -> Result<usize>;

    // =========================================================================
    // Attachment Mutation (repair apply / transfer)
    // =========================================================================

    fn delete_attachment(&self, id: i64) -> Result<()>;

    fn clear_attachment_thumbnail(&self, id: i64) -> Result<()>;

    fn update_attachment_size(&self, id: i64, size: i64) -> Result<()>;

    fn update_attachment_ext(&self, id: i64, file_ext: &str) -> Result<()>;

    fn repoint_attachment_folder(&self, id: i64, folder_id: i64) -> Result<()>;

    /// Batch folder repoint for a chunk of moved files, in one transaction.
    fn repoint_attachments_folder(&self, ids: &[i64], folder_id: i64) -> Result<usize>;

    fn create_attachment_folder(&self, path: &str) -> Result<AttachmentFolder>;

    // =========================================================================
    // Topic / Message Mutation
    // =========================================================================

    /// Move topics and every message under them to another board.
    fn move_topics_to_board(&self, topic_ids: &[i64], board_id: i64) -> Result<usize>;

    fn update_message_text(&self, id: i64, subject: &str, body: &str) -> Result<()>;

    // =========================================================================
    // Row Creation
    // =========================================================================

    fn create_board(&self, name: &str, count_posts: bool) -> Result<Board>;

    fn create_topic(&self, topic: &NewTopic) -> Result<Topic>;

    fn create_message(&self, message: &NewMessage) -> Result<Message>;

    fn create_member(&self, name: &str, password_hash: &str, role: MemberRole) -> Result<Member>;

    fn create_attachment(&self, attachment: &NewAttachment) -> Result<Attachment>;
}

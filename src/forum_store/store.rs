use super::models::{
    Attachment, AttachmentFolder, AttachmentKind, Board, Member, MemberRole, Message,
    NewAttachment, NewMessage, NewTopic, Topic,
};
use super::schema::FORUM_VERSIONED_SCHEMAS;
use super::trait_def::ForumStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteForumStore {
    conn: Arc<Mutex<Connection>>,
}

/// Inline an id list into a query. Ids come from our own row scans, so
/// they are plain integers and chunk sizes stay well under SQLite's
/// bound-parameter limit anyway.
fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl SqliteForumStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open forum database")?;
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;

        if is_new_db {
            info!("Creating new forum database at {:?}", path);
            FORUM_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                anyhow::bail!(
                    "Forum database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = FORUM_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown forum database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Forum database schema validation failed for version {}",
                    db_version
                )
            })?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store with the latest schema, for tests and fixtures.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        FORUM_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_board(row: &rusqlite::Row) -> rusqlite::Result<Board> {
        Ok(Board {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            num_topics: row.get("num_topics")?,
            num_posts: row.get("num_posts")?,
            unapproved_topics: row.get("unapproved_topics")?,
            unapproved_posts: row.get("unapproved_posts")?,
            count_posts: row.get::<_, i64>("count_posts")? == 1,
        })
    }

    fn row_to_topic(row: &rusqlite::Row) -> rusqlite::Result<Topic> {
        Ok(Topic {
            id: row.get("id")?,
            board_id: row.get("board_id")?,
            first_message_id: row.get("first_message_id")?,
            last_message_id: row.get("last_message_id")?,
            num_replies: row.get("num_replies")?,
            unapproved_posts: row.get("unapproved_posts")?,
            approved: row.get::<_, i64>("approved")? == 1,
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get("id")?,
            topic_id: row.get("topic_id")?,
            board_id: row.get("board_id")?,
            member_id: row.get("member_id")?,
            subject: row.get("subject")?,
            body: row.get("body")?,
            approved: row.get::<_, i64>("approved")? == 1,
            posted_at: row.get("posted_at")?,
        })
    }

    fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
        let role_str: String = row.get("role")?;
        Ok(Member {
            id: row.get("id")?,
            name: row.get("name")?,
            password_hash: row.get("password_hash")?,
            role: MemberRole::parse(&role_str).unwrap_or(MemberRole::Regular),
            posts: row.get("posts")?,
        })
    }

    fn row_to_attachment(row: &rusqlite::Row) -> rusqlite::Result<Attachment> {
        let kind_int: i64 = row.get("kind")?;
        Ok(Attachment {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            member_id: row.get("member_id")?,
            folder_id: row.get("folder_id")?,
            thumbnail_id: row.get("thumbnail_id")?,
            kind: AttachmentKind::from_int(kind_int).unwrap_or(AttachmentKind::File),
            filename: row.get("filename")?,
            file_ext: row.get("file_ext")?,
            file_hash: row.get("file_hash")?,
            size: row.get("size")?,
        })
    }

    fn row_to_folder(row: &rusqlite::Row) -> rusqlite::Result<AttachmentFolder> {
        Ok(AttachmentFolder {
            id: row.get("id")?,
            path: row.get("path")?,
        })
    }

    fn count_query(&self, sql: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn attachments_query(&self, sql: &str, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_attachment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

const ORPHANED_THUMBNAILS_WHERE: &str = "kind = 3 \
     AND NOT EXISTS (SELECT 1 FROM attachments p WHERE p.thumbnail_id = attachments.id)";

const PARENTS_MISSING_THUMBNAIL_WHERE: &str = "kind = 0 AND thumbnail_id != 0 \
     AND NOT EXISTS (SELECT 1 FROM attachments t WHERE t.id = attachments.thumbnail_id)";

const ORPHANED_AVATARS_WHERE: &str = "member_id != 0 \
     AND NOT EXISTS (SELECT 1 FROM members m WHERE m.id = attachments.member_id)";

const ORPHANED_ATTACHMENTS_WHERE: &str = "message_id != 0 \
     AND NOT EXISTS (SELECT 1 FROM messages m WHERE m.id = attachments.message_id)";

impl ForumStore for SqliteForumStore {
    // =========================================================================
    // Entity Retrieval
    // =========================================================================

    fn board(&self, id: i64) -> Result<Option<Board>> {
        let conn = self.conn.lock().unwrap();
        let board = conn
            .query_row(
                "SELECT * FROM boards WHERE id = ?1",
                params![id],
                Self::row_to_board,
            )
            .optional()?;
        Ok(board)
    }

    fn topic(&self, id: i64) -> Result<Option<Topic>> {
        let conn = self.conn.lock().unwrap();
        let topic = conn
            .query_row(
                "SELECT * FROM topics WHERE id = ?1",
                params![id],
                Self::row_to_topic,
            )
            .optional()?;
        Ok(topic)
    }

    fn message(&self, id: i64) -> Result<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let message = conn
            .query_row(
                "SELECT * FROM messages WHERE id = ?1",
                params![id],
                Self::row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    fn member(&self, id: i64) -> Result<Option<Member>> {
        let conn = self.conn.lock().unwrap();
        let member = conn
            .query_row(
                "SELECT * FROM members WHERE id = ?1",
                params![id],
                Self::row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    fn member_by_name(&self, name: &str) -> Result<Option<Member>> {
        let conn = self.conn.lock().unwrap();
        let member = conn
            .query_row(
                "SELECT * FROM members WHERE name = ?1",
                params![name],
                Self::row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    fn attachment(&self, id: i64) -> Result<Option<Attachment>> {
        let conn = self.conn.lock().unwrap();
        let attachment = conn
            .query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                Self::row_to_attachment,
            )
            .optional()?;
        Ok(attachment)
    }

    fn attachment_folder(&self, id: i64) -> Result<Option<AttachmentFolder>> {
        let conn = self.conn.lock().unwrap();
        let folder = conn
            .query_row(
                "SELECT * FROM attachment_folders WHERE id = ?1",
                params![id],
                Self::row_to_folder,
            )
            .optional()?;
        Ok(folder)
    }

    fn attachment_folders(&self) -> Result<Vec<AttachmentFolder>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM attachment_folders ORDER BY id")?;
        let folders = stmt
            .query_map([], Self::row_to_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    // =========================================================================
    // Entity Counts
    // =========================================================================

    fn count_boards(&self) -> Result<u64> {
        self.count_query("SELECT COUNT(*) FROM boards")
    }

    fn count_topics(&self) -> Result<u64> {
        self.count_query("SELECT COUNT(*) FROM topics")
    }

    fn count_messages(&self) -> Result<u64> {
        self.count_query("SELECT COUNT(*) FROM messages")
    }

    fn count_members(&self) -> Result<u64> {
        self.count_query("SELECT COUNT(*) FROM members")
    }

    fn count_attachments(&self) -> Result<u64> {
        self.count_query("SELECT COUNT(*) FROM attachments")
    }

    fn count_topics_on_board(&self, board_id: i64) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM topics WHERE board_id = ?1",
            params![board_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_attachments_in_folder(&self, folder_id: i64) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE folder_id = ?1",
            params![folder_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn folder_usage(&self, folder_id: i64) -> Result<(u64, u64)> {
        let conn = self.conn.lock().unwrap();
        let (files, bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(MAX(size, 0)), 0) FROM attachments WHERE folder_id = ?1",
            params![folder_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((files as u64, bytes as u64))
    }

    // =========================================================================
    // Chunked Scans
    // =========================================================================

    fn topic_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM topics ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let ids = stmt
            .query_map(params![limit as i64, offset as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn board_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM boards ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let ids = stmt
            .query_map(params![limit as i64, offset as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn member_ids_page(&self, limit: u64, offset: u64) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM members ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let ids = stmt
            .query_map(params![limit as i64, offset as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn attachments_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        self.attachments_query(
            "SELECT * FROM attachments ORDER BY id LIMIT ?1 OFFSET ?2",
            limit,
            offset,
        )
    }

    fn messages_page(&self, limit: u64, offset: u64) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM messages ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let messages = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    fn topics_on_board(&self, board_id: i64, limit: u64) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id FROM topics WHERE board_id = ?1 ORDER BY id LIMIT ?2")?;
        let ids = stmt
            .query_map(params![board_id, limit as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn attachments_in_folder_above(
        &self,
        folder_id: i64,
        after_id: i64,
        limit: u64,
    ) -> Result<Vec<Attachment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM attachments WHERE folder_id = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![folder_id, after_id, limit as i64],
                Self::row_to_attachment,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // =========================================================================
    // Integrity Scans
    // =========================================================================

    fn orphaned_thumbnails_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        self.attachments_query(
            &format!(
                "SELECT * FROM attachments WHERE {} ORDER BY id LIMIT ?1 OFFSET ?2",
                ORPHANED_THUMBNAILS_WHERE
            ),
            limit,
            offset,
        )
    }

    fn count_orphaned_thumbnails(&self) -> Result<u64> {
        self.count_query(&format!(
            "SELECT COUNT(*) FROM attachments WHERE {}",
            ORPHANED_THUMBNAILS_WHERE
        ))
    }

    fn parents_missing_thumbnail_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        self.attachments_query(
            &format!(
                "SELECT * FROM attachments WHERE {} ORDER BY id LIMIT ?1 OFFSET ?2",
                PARENTS_MISSING_THUMBNAIL_WHERE
            ),
            limit,
            offset,
        )
    }

    fn count_parents_missing_thumbnail(&self) -> Result<u64> {
        self.count_query(&format!(
            "SELECT COUNT(*) FROM attachments WHERE {}",
            PARENTS_MISSING_THUMBNAIL_WHERE
        ))
    }

    fn orphaned_avatars_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        self.attachments_query(
            &format!(
                "SELECT * FROM attachments WHERE {} ORDER BY id LIMIT ?1 OFFSET ?2",
                ORPHANED_AVATARS_WHERE
            ),
            limit,
            offset,
        )
    }

    fn count_orphaned_avatars(&self) -> Result<u64> {
        self.count_query(&format!(
            "SELECT COUNT(*) FROM attachments WHERE {}",
            ORPHANED_AVATARS_WHERE
        ))
    }

    fn orphaned_attachments_page(&self, limit: u64, offset: u64) -> Result<Vec<Attachment>> {
        self.attachments_query(
            &format!(
                "SELECT * FROM attachments WHERE {} ORDER BY id LIMIT ?1 OFFSET ?2",
                ORPHANED_ATTACHMENTS_WHERE
            ),
            limit,
            offset,
        )
    }

    fn count_orphaned_attachments(&self) -> Result<u64> {
        self.count_query(&format!(
            "SELECT COUNT(*) FROM attachments WHERE {}",
            ORPHANED_ATTACHMENTS_WHERE
        ))
    }

    fn attachment_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT 1 FROM attachments WHERE id = ?1",
                params![id],
                |_| Ok(true),
            )
            .optional()?;
        Ok(exists.unwrap_or(false))
    }

    fn thumbnail_has_parent(&self, thumbnail_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT 1 FROM attachments WHERE thumbnail_id = ?1",
                params![thumbnail_id],
                |_| Ok(true),
            )
            .optional()?;
        Ok(exists.unwrap_or(false))
    }

    fn is_tracked_file(&self, disk_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row(
                "SELECT 1 FROM attachments \
                 WHERE (file_hash != '' AND (CAST(id AS TEXT) || '_' || file_hash || '.dat') = ?1) \
                    OR (file_hash = '' AND filename = ?1)",
                params![disk_name],
                |_| Ok(true),
            )
            .optional()?;
        Ok(exists.unwrap_or(false))
    }

    // =========================================================================
    // Aggregate Recomputation
    // =========================================================================

    fn recount_topic_messages(&self, topic_ids: &[i64]) -> Result<usize> {
        if topic_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE topics SET \
                 num_replies = MAX((SELECT COUNT(*) FROM messages \
                     WHERE messages.topic_id = topics.id AND messages.approved = 1) - 1, 0), \
                 unapproved_posts = (SELECT COUNT(*) FROM messages \
                     WHERE messages.topic_id = topics.id AND messages.approved = 0) \
                 WHERE topics.id IN ({})",
                id_list(topic_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    fn recount_board_posts(&self, board_ids: &[i64]) -> Result<usize> {
        if board_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE boards SET num_posts = (SELECT COUNT(*) FROM messages \
                     WHERE messages.board_id = boards.id AND messages.approved = 1) \
                 WHERE boards.id IN ({})",
                id_list(board_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    fn recount_board_topics(&self, board_ids: &[i64]) -> Result<usize> {
        if board_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE boards SET num_topics = (SELECT COUNT(*) FROM topics \
                     WHERE topics.board_id = boards.id AND topics.approved = 1) \
                 WHERE boards.id IN ({})",
                id_list(board_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    fn recount_board_unapproved(&self, board_ids: &[i64]) -> Result<usize> {
        if board_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE boards SET \
                 unapproved_posts = (SELECT COUNT(*) FROM messages \
                     WHERE messages.board_id = boards.id AND messages.approved = 0), \
                 unapproved_topics = (SELECT COUNT(*) FROM topics \
                     WHERE topics.board_id = boards.id AND topics.approved = 0) \
                 WHERE boards.id IN ({})",
                id_list(board_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    fn repoint_messages_to_topic_board(&self, topic_ids: &[i64]) -> Result<usize> {
        if topic_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE messages SET board_id = \
                     (SELECT board_id FROM topics WHERE topics.id = messages.topic_id) \
                 WHERE messages.topic_id IN ({}) \
                 AND messages.board_id != \
                     (SELECT board_id FROM topics WHERE topics.id = messages.topic_id)",
                id_list(topic_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    fn recount_member_posts(&self, member_ids: &[i64]) -> Result<usize> {
        if member_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE members SET posts = (SELECT COUNT(*) FROM messages \
                     JOIN boards ON boards.id = messages.board_id \
                     WHERE messages.member_id = members.id \
                     AND messages.approved = 1 AND boards.count_posts = 1) \
                 WHERE members.id IN ({})",
                id_list(member_ids)
            ),
            [],
        )?;
        Ok(changed)
    }

    // =========================================================================
    // Attachment Mutation
    // =========================================================================

    fn delete_attachment(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM attachments WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear_attachment_thumbnail(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE attachments SET thumbnail_id = 0 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn update_attachment_size(&self, id: i64, size: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE attachments SET size = ?2 WHERE id = ?1",
            params![id, size],
        )?;
        Ok(())
    }

    fn update_attachment_ext(&self, id: i64, file_ext: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE attachments SET file_ext = ?2 WHERE id = ?1",
            params![id, file_ext],
        )?;
        Ok(())
    }

    fn repoint_attachment_folder(&self, id: i64, folder_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE attachments SET folder_id = ?2 WHERE id = ?1",
            params![id, folder_id],
        )?;
        Ok(())
    }

    fn repoint_attachments_folder(&self, ids: &[i64], folder_id: i64) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE attachments SET folder_id = ?1 WHERE id IN ({})",
                id_list(ids)
            ),
            params![folder_id],
        )?;
        Ok(changed)
    }

    fn create_attachment_folder(&self, path: &str) -> Result<AttachmentFolder> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO attachment_folders (path) VALUES (?1)",
            params![path],
        )?;
        Ok(AttachmentFolder {
            id: conn.last_insert_rowid(),
            path: path.to_string(),
        })
    }

    // =========================================================================
    // Topic / Message Mutation
    // =========================================================================

    fn move_topics_to_board(&self, topic_ids: &[i64], board_id: i64) -> Result<usize> {
        if topic_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let moved = tx.execute(
            &format!(
                "UPDATE topics SET board_id = ?1 WHERE id IN ({})",
                id_list(topic_ids)
            ),
            params![board_id],
        )?;
        tx.execute(
            &format!(
                "UPDATE messages SET board_id = ?1 WHERE topic_id IN ({})",
                id_list(topic_ids)
            ),
            params![board_id],
        )?;
        tx.commit()?;
        Ok(moved)
    }

    fn update_message_text(&self, id: i64, subject: &str, body: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE messages SET subject = ?2, body = ?3 WHERE id = ?1",
            params![id, subject, body],
        )?;
        Ok(())
    }

    // =========================================================================
    // Row Creation
    // =========================================================================

    fn create_board(&self, name: &str, count_posts: bool) -> Result<Board> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO boards (name, count_posts) VALUES (?1, ?2)",
            params![name, count_posts as i64],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Board {
            id,
            name: name.to_string(),
            description: String::new(),
            num_topics: 0,
            num_posts: 0,
            unapproved_topics: 0,
            unapproved_posts: 0,
            count_posts,
        })
    }

    fn create_topic(&self, topic: &NewTopic) -> Result<Topic> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO topics (board_id, approved) VALUES (?1, ?2)",
            params![topic.board_id, topic.approved as i64],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Topic {
            id,
            board_id: topic.board_id,
            first_message_id: 0,
            last_message_id: 0,
            num_replies: 0,
            unapproved_posts: 0,
            approved: topic.approved,
        })
    }

    fn create_message(&self, message: &NewMessage) -> Result<Message> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (topic_id, board_id, member_id, subject, body, approved) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.topic_id,
                message.board_id,
                message.member_id,
                message.subject,
                message.body,
                message.approved as i64,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let posted_at: i64 = conn.query_row(
            "SELECT posted_at FROM messages WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(Message {
            id,
            topic_id: message.topic_id,
            board_id: message.board_id,
            member_id: message.member_id,
            subject: message.subject.clone(),
            body: message.body.clone(),
            approved: message.approved,
            posted_at,
        })
    }

    fn create_member(&self, name: &str, password_hash: &str, role: MemberRole) -> Result<Member> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO members (name, password_hash, role) VALUES (?1, ?2, ?3)",
            params![name, password_hash, role.as_str()],
        )?;
        Ok(Member {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            role,
            posts: 0,
        })
    }

    fn create_attachment(&self, attachment: &NewAttachment) -> Result<Attachment> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO attachments \
             (message_id, member_id, folder_id, thumbnail_id, kind, filename, file_ext, file_hash, size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                attachment.message_id,
                attachment.member_id,
                attachment.folder_id,
                attachment.thumbnail_id,
                attachment.kind.as_int(),
                attachment.filename,
                attachment.file_ext,
                attachment.file_hash,
                attachment.size,
            ],
        )?;
        Ok(Attachment {
            id: conn.last_insert_rowid(),
            message_id: attachment.message_id,
            member_id: attachment.member_id,
            folder_id: attachment.folder_id,
            thumbnail_id: attachment.thumbnail_id,
            kind: attachment.kind,
            filename: attachment.filename.clone(),
            file_ext: attachment.file_ext.clone(),
            file_hash: attachment.file_hash.clone(),
            size: attachment.size,
        })
    }
}

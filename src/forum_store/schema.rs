//! SQLite schema definitions for the forum database.
//!
//! Boards, topics, messages, members, and the attachment tables the
//! maintenance jobs operate on. Referential links between tables are
//! plain integer columns: the repair jobs have to be able to see and
//! fix dangling references, so nothing here is FK-enforced.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

// =============================================================================
// Version 1 - Full forum schema
// =============================================================================

const BOARDS_TABLE_V1: Table = Table {
    name: "boards",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("num_topics", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("num_posts", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "unapproved_topics",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "unapproved_posts",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("count_posts", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const TOPICS_TABLE_V1: Table = Table {
    name: "topics",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("board_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "first_message_id",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "last_message_id",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("num_replies", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "unapproved_posts",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("approved", &SqlType::Integer, non_null = true, default_value = Some("1")),
    ],
    indices: &[("idx_topics_board_id", "board_id")],
};

const MESSAGES_TABLE_V1: Table = Table {
    name: "messages",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("topic_id", &SqlType::Integer, non_null = true),
        sqlite_column!("board_id", &SqlType::Integer, non_null = true),
        sqlite_column!("member_id", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("subject", &SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("body", &SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("approved", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!(
            "posted_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_messages_topic_id", "topic_id"),
        ("idx_messages_board_id", "board_id"),
        ("idx_messages_member_id", "member_id"),
    ],
};

const MEMBERS_TABLE_V1: Table = Table {
    name: "members",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("password_hash", &SqlType::Text, non_null = true),
        sqlite_column!("role", &SqlType::Text, non_null = true, default_value = Some("'regular'")),
        sqlite_column!("posts", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const ATTACHMENTS_TABLE_V1: Table = Table {
    name: "attachments",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("message_id", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("member_id", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("folder_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "thumbnail_id",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("kind", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("filename", &SqlType::Text, non_null = true),
        sqlite_column!("file_ext", &SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("file_hash", &SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("size", &SqlType::Integer, non_null = true, default_value = Some("0")),
    ],
    indices: &[
        ("idx_attachments_message_id", "message_id"),
        ("idx_attachments_member_id", "member_id"),
        ("idx_attachments_folder_id", "folder_id"),
        ("idx_attachments_thumbnail_id", "thumbnail_id"),
    ],
};

const ATTACHMENT_FOLDERS_TABLE_V1: Table = Table {
    name: "attachment_folders",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("path", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

pub const FORUM_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        BOARDS_TABLE_V1,
        TOPICS_TABLE_V1,
        MESSAGES_TABLE_V1,
        MEMBERS_TABLE_V1,
        ATTACHMENTS_TABLE_V1,
        ATTACHMENT_FOLDERS_TABLE_V1,
    ],
    migration: None,
}];

//! Test fixture creation for the forum database
//!
//! Each test server gets a small seeded forum: three members (one per
//! role), two boards and a topic with a few messages. Attachment
//! fixtures are created on demand by the tests that move files around.

use super::constants::*;
use anyhow::Result;
use piazza_admin_server::forum_store::{
    Attachment, AttachmentFolder, AttachmentKind, ForumStore, MemberRole, NewAttachment,
    NewMessage, NewTopic,
};
use piazza_admin_server::hash_password;
use std::path::Path;
use std::sync::OnceLock;

// Argon2 is deliberately slow; hash each test password once per binary.

fn admin_hash() -> String {
    static CELL: OnceLock<String> = OnceLock::new();
    CELL.get_or_init(|| hash_password(ADMIN_PASS).expect("Failed to hash admin password"))
        .clone()
}

fn moderator_hash() -> String {
    static CELL: OnceLock<String> = OnceLock::new();
    CELL.get_or_init(|| hash_password(MOD_PASS).expect("Failed to hash moderator password"))
        .clone()
}

fn test_member_hash() -> String {
    static CELL: OnceLock<String> = OnceLock::new();
    CELL.get_or_init(|| hash_password(TEST_PASS).expect("Failed to hash member password"))
        .clone()
}

/// Creates the three test members: admin, moderator and regular.
pub fn seed_members(store: &dyn ForumStore) -> Result<()> {
    store.create_member(ADMIN_MEMBER, &admin_hash(), MemberRole::Admin)?;
    store.create_member(MOD_MEMBER, &moderator_hash(), MemberRole::Moderator)?;
    store.create_member(TEST_MEMBER, &test_member_hash(), MemberRole::Regular)?;
    Ok(())
}

/// Ids of the content `seed_forum_content` created.
pub struct SeededForum {
    pub board_1_id: i64,
    pub board_2_id: i64,
    pub topic_id: i64,
}

/// Two boards, one topic with a few messages on the first.
pub fn seed_forum_content(store: &dyn ForumStore) -> Result<SeededForum> {
    let board_1 = store.create_board(BOARD_1_NAME, true)?;
    let board_2 = store.create_board(BOARD_2_NAME, true)?;
    let topic = store.create_topic(&NewTopic {
        board_id: board_1.id,
        approved: true,
    })?;
    for n in 0..SEEDED_MESSAGE_COUNT {
        store.create_message(&NewMessage {
            topic_id: topic.id,
            board_id: board_1.id,
            member_id: 0,
            subject: format!("Seed subject {n}"),
            body: "Seed body".to_string(),
            approved: true,
        })?;
    }
    Ok(SeededForum {
        board_1_id: board_1.id,
        board_2_id: board_2.id,
        topic_id: topic.id,
    })
}

/// Create a folder row plus the matching directory on disk.
pub fn create_folder(store: &dyn ForumStore, media_dir: &Path, name: &str) -> AttachmentFolder {
    let dir = media_dir.join(name);
    std::fs::create_dir_all(&dir).expect("Failed to create folder directory");
    store
        .create_attachment_folder(dir.to_str().expect("Folder path is not UTF-8"))
        .expect("Failed to create folder row")
}

/// Attachment row plus its backing file, sized to match.
pub fn seed_attachment_with_file(
    store: &dyn ForumStore,
    folder: &AttachmentFolder,
    message_id: i64,
    content: &[u8],
) -> Attachment {
    let attachment = store
        .create_attachment(&NewAttachment {
            message_id,
            member_id: 0,
            folder_id: folder.id,
            thumbnail_id: 0,
            kind: AttachmentKind::File,
            filename: "upload.bin".to_string(),
            file_ext: "bin".to_string(),
            file_hash: "cafe".to_string(),
            size: content.len() as i64,
        })
        .expect("Failed to create attachment row");
    std::fs::write(
        Path::new(&folder.path).join(attachment.disk_name()),
        content,
    )
    .expect("Failed to write attachment file");
    attachment
}

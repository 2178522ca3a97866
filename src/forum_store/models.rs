use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub num_topics: i64,
    pub num_posts: i64,
    pub unapproved_topics: i64,
    pub unapproved_posts: i64,
    /// Whether posts on this board count towards member post totals.
    pub count_posts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub id: i64,
    pub board_id: i64,
    pub first_message_id: i64,
    pub last_message_id: i64,
    pub num_replies: i64,
    pub unapproved_posts: i64,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub topic_id: i64,
    pub board_id: i64,
    pub member_id: i64,
    pub subject: String,
    pub body: String,
    pub approved: bool,
    pub posted_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Moderator,
    Regular,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Moderator => "moderator",
            MemberRole::Regular => "regular",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(MemberRole::Admin),
            "moderator" => Some(MemberRole::Moderator),
            "regular" => Some(MemberRole::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub role: MemberRole,
    pub posts: i64,
}

/// Attachment row kind. The integer values are stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Thumbnail,
}

impl AttachmentKind {
    pub fn as_int(&self) -> i64 {
        match self {
            AttachmentKind::File => 0,
            AttachmentKind::Thumbnail => 3,
        }
    }

    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(AttachmentKind::File),
            3 => Some(AttachmentKind::Thumbnail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: i64,
    /// Message this file is attached to, 0 for avatars.
    pub message_id: i64,
    /// Owning member for avatars, 0 for post attachments.
    pub member_id: i64,
    pub folder_id: i64,
    /// Row id of the thumbnail attachment, 0 if none.
    pub thumbnail_id: i64,
    pub kind: AttachmentKind,
    pub filename: String,
    pub file_ext: String,
    pub file_hash: String,
    pub size: i64,
}

impl Attachment {
    /// Name of the file on disk. Hashed names keep user-supplied
    /// filenames out of the filesystem.
    pub fn disk_name(&self) -> String {
        if self.file_hash.is_empty() {
            self.filename.clone()
        } else {
            format!("{}_{}.dat", self.id, self.file_hash)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentFolder {
    pub id: i64,
    pub path: String,
}

// Insert parameter structs; row ids are assigned by the store.

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub board_id: i64,
    pub approved: bool,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub topic_id: i64,
    pub board_id: i64,
    pub member_id: i64,
    pub subject: String,
    pub body: String,
    pub approved: bool,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub message_id: i64,
    pub member_id: i64,
    pub folder_id: i64,
    pub thumbnail_id: i64,
    pub kind: AttachmentKind,
    pub filename: String,
    pub file_ext: String,
    pub file_hash: String,
    pub size: i64,
}

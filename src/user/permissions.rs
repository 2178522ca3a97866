use crate::forum_store::MemberRole;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    AccessForum,
    ModerateBoards,
    ManageBoards,
    ManageAttachments,
    ManageMembers,
    AdminForum,
}

impl Permission {
    pub fn as_int(self) -> i32 {
        match self {
            Permission::AccessForum => 1,
            Permission::ModerateBoards => 2,
            Permission::ManageBoards => 3,
            Permission::ManageAttachments => 4,
            Permission::ManageMembers => 5,
            Permission::AdminForum => 6,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(Permission::AccessForum),
            2 => Some(Permission::ModerateBoards),
            3 => Some(Permission::ManageBoards),
            4 => Some(Permission::ManageAttachments),
            5 => Some(Permission::ManageMembers),
            6 => Some(Permission::AdminForum),
            _ => None,
        }
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::AccessForum,
    Permission::ModerateBoards,
    Permission::ManageBoards,
    Permission::ManageAttachments,
    Permission::ManageMembers,
    Permission::AdminForum,
];
const MODERATOR_PERMISSIONS: &[Permission] = &[
    Permission::AccessForum,
    Permission::ModerateBoards,
];
const REGULAR_PERMISSIONS: &[Permission] = &[Permission::AccessForum];

pub fn role_permissions(role: MemberRole) -> &'static [Permission] {
    match role {
        MemberRole::Admin => ADMIN_PERMISSIONS,
        MemberRole::Moderator => MODERATOR_PERMISSIONS,
        MemberRole::Regular => REGULAR_PERMISSIONS,
    }
}

pub fn role_has_permission(role: MemberRole, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

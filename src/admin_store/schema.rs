//! SQLite schema definitions for the admin database.
//!
//! Session tokens, per-session maintenance state, and the maintenance
//! audit log. Member rows live in the forum database; only the member
//! id is referenced here.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Auth tokens and maintenance state
// =============================================================================

const AUTH_TOKENS_TABLE_V1: Table = Table {
    name: "auth_tokens",
    columns: &[
        sqlite_column!("token", &SqlType::Text, is_primary_key = true),
        sqlite_column!("member_id", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("last_used_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_auth_tokens_member_id", "member_id")],
};

/// Session-scoped key-value state. Uniqueness of (session_id, state_key)
/// is maintained by the store's delete-then-insert writes.
const MAINTENANCE_STATE_TABLE_V1: Table = Table {
    name: "maintenance_state",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("state_key", &SqlType::Text, non_null = true),
        sqlite_column!("payload", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_maintenance_state_session", "session_id, state_key")],
};

// =============================================================================
// Version 2 - Maintenance audit log
// =============================================================================

const MAINTENANCE_LOG_TABLE_V2: Table = Table {
    name: "maintenance_log",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("job", &SqlType::Text, non_null = true),
        sqlite_column!("event", &SqlType::Text, non_null = true),
        sqlite_column!("timestamp", &SqlType::Text, non_null = true),
        sqlite_column!("details", &SqlType::Text),
        sqlite_column!("error", &SqlType::Text),
    ],
    indices: &[
        ("idx_maintenance_log_job", "job"),
        ("idx_maintenance_log_timestamp", "timestamp DESC"),
    ],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE maintenance_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job TEXT NOT NULL,
            event TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            details TEXT,
            error TEXT
        )",
        [],
    )?;
    conn.execute("CREATE INDEX idx_maintenance_log_job ON maintenance_log(job)", [])?;
    conn.execute(
        "CREATE INDEX idx_maintenance_log_timestamp ON maintenance_log(timestamp DESC)",
        [],
    )?;
    Ok(())
}

pub const ADMIN_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[AUTH_TOKENS_TABLE_V1, MAINTENANCE_STATE_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            AUTH_TOKENS_TABLE_V1,
            MAINTENANCE_STATE_TABLE_V1,
            MAINTENANCE_LOG_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];

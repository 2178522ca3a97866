use chrono::{DateTime, Utc};
use serde::Serialize;

/// A logged-in member's session token row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokenRow {
    pub token: String,
    pub member_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// A session-scoped state entry. Expiry is interpreted by the caller
/// against `updated_at`; the store itself keeps everything it is given.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of events recorded in the maintenance audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceEventType {
    Completed,
    Failed,
    RolledOver,
}

impl MaintenanceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceEventType::Completed => "completed",
            MaintenanceEventType::Failed => "failed",
            MaintenanceEventType::RolledOver => "rolled_over",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(MaintenanceEventType::Completed),
            "failed" => Some(MaintenanceEventType::Failed),
            "rolled_over" => Some(MaintenanceEventType::RolledOver),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceLogEntry {
    pub id: i64,
    pub job: String,
    pub event: MaintenanceEventType,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

use super::models::{AuthTokenRow, MaintenanceEventType, MaintenanceLogEntry, StoredState};
use super::schema::ADMIN_VERSIONED_SCHEMAS;
use super::AdminStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteAdminStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdminStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open admin database")?;
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;

        if is_new_db {
            info!("Creating new admin database at {:?}", path);
            ADMIN_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                anyhow::bail!(
                    "Admin database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let current_schema_version = ADMIN_VERSIONED_SCHEMAS.last().unwrap().version as i64;

            let schema = ADMIN_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown admin database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Admin database schema validation failed for version {}",
                    db_version
                )
            })?;

            if db_version < current_schema_version {
                info!(
                    "Migrating admin database from version {} to {}",
                    db_version, current_schema_version
                );
                Self::migrate_if_needed(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store with the latest schema, for tests and fixtures.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        ADMIN_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in ADMIN_VERSIONED_SCHEMAS.iter() {
            if schema.version > latest_from {
                info!(
                    "Running admin database migration from version {} to {}",
                    latest_from, schema.version
                );
                if let Some(migration_fn) = schema.migration {
                    migration_fn(&tx).with_context(|| {
                        format!("Failed to run migration to version {}", schema.version)
                    })?;
                }
                latest_from = schema.version;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_auth_token(row: &rusqlite::Row) -> rusqlite::Result<AuthTokenRow> {
        let created_at_str: String = row.get("created_at")?;
        let last_used_at_str: String = row.get("last_used_at")?;
        Ok(AuthTokenRow {
            token: row.get("token")?,
            member_id: row.get("member_id")?,
            created_at: Self::parse_datetime(&created_at_str),
            last_used_at: Self::parse_datetime(&last_used_at_str),
        })
    }

    fn row_to_log_entry(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceLogEntry> {
        let event_str: String = row.get("event")?;
        let timestamp_str: String = row.get("timestamp")?;
        let details_str: Option<String> = row.get("details")?;
        Ok(MaintenanceLogEntry {
            id: row.get("id")?,
            job: row.get("job")?,
            event: MaintenanceEventType::parse(&event_str)
                .unwrap_or(MaintenanceEventType::Failed),
            timestamp: Self::parse_datetime(&timestamp_str).timestamp(),
            details: details_str.and_then(|s| serde_json::from_str(&s).ok()),
            error: row.get("error")?,
        })
    }
}

impl AdminStore for SqliteAdminStore {
    // =========================================================================
    // Auth tokens
    // =========================================================================

    fn insert_auth_token(&self, token: &str, member_id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (token, member_id, created_at, last_used_at) \
             VALUES (?1, ?2, ?3, ?3)",
            params![token, member_id, now],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, token: &str) -> Result<Option<AuthTokenRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT * FROM auth_tokens WHERE token = ?1",
                params![token],
                Self::row_to_auth_token,
            )
            .optional()?;
        Ok(row)
    }

    fn touch_auth_token(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_tokens SET last_used_at = ?2 WHERE token = ?1",
            params![token, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete_auth_token(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
        Ok(())
    }

    fn cleanup_stale_auth_tokens(&self, last_used_before: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM auth_tokens WHERE last_used_at < ?1",
            params![last_used_before.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    // =========================================================================
    // Session-scoped maintenance state
    // =========================================================================

    fn get_session_state(
        &self,
        session_id: &str,
        state_key: &str,
    ) -> Result<Option<StoredState>> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT payload, updated_at FROM maintenance_state \
                 WHERE session_id = ?1 AND state_key = ?2",
                params![session_id, state_key],
                |row| {
                    let updated_at_str: String = row.get("updated_at")?;
                    Ok(StoredState {
                        payload: row.get("payload")?,
                        updated_at: Self::parse_datetime(&updated_at_str),
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn put_session_state(&self, session_id: &str, state_key: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM maintenance_state WHERE session_id = ?1 AND state_key = ?2",
            params![session_id, state_key],
        )?;
        tx.execute(
            "INSERT INTO maintenance_state (session_id, state_key, payload, updated_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, state_key, payload, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_session_state(&self, session_id: &str, state_key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM maintenance_state WHERE session_id = ?1 AND state_key = ?2",
            params![session_id, state_key],
        )?;
        Ok(())
    }

    fn purge_session_state_updated_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let purged = conn.execute(
            "DELETE FROM maintenance_state WHERE updated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(purged)
    }

    // =========================================================================
    // Maintenance audit log
    // =========================================================================

    fn log_maintenance_event(
        &self,
        job: &str,
        event: MaintenanceEventType,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<i64> {
        let details_str = details.map(|d| d.to_string());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO maintenance_log (job, event, timestamp, details, error) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job,
                event.as_str(),
                Utc::now().to_rfc3339(),
                details_str,
                error
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_maintenance_log(&self, limit: usize, offset: usize) -> Result<Vec<MaintenanceLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM maintenance_log ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let entries = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_log_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

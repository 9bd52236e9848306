//! Version store: the persisted single-row marker of the schema version
//! believed installed
//!
//! Reading from a store without the marker table returns 0 ("pre-history").
//! The version never decreases; `write_version` silently keeps the higher
//! value if asked to go backwards, so no caller can violate monotonicity.

use crate::error::StoreError;
use crate::introspect;
use rusqlite::{params, Connection, OptionalExtension};

const VERSION_ROW_ID: i64 = 1;

const CREATE_VERSION_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_version (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  version INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
)";

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Read the recorded schema version; 0 when the marker doesn't exist yet.
pub fn read_version(conn: &Connection) -> Result<i64, StoreError> {
    if !introspect::table_exists(conn, "schema_version")? {
        return Ok(0);
    }
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM schema_version WHERE id = ?1",
            [VERSION_ROW_ID],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Upsert the single version row and refresh its timestamp. Idempotent; a
/// lower version than the recorded one is ignored.
pub fn write_version(conn: &Connection, version: i64) -> Result<(), StoreError> {
    conn.execute_batch(CREATE_VERSION_TABLE_SQL)?;
    let current = read_version(conn)?;
    if version < current {
        tracing::debug!(version, current, "ignoring backwards version write");
        return Ok(());
    }
    conn.execute(
        "INSERT INTO schema_version (id, version, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
        params![VERSION_ROW_ID, version, now_ms()],
    )?;
    Ok(())
}

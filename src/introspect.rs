//! Physical schema introspection
//!
//! The probes the migration engine needs from the storage layer: table
//! existence, column listing with type/nullability, index listing, row counts.
//! Everything here is read-only.

use crate::error::StoreError;
use rusqlite::Connection;

/// One row of `PRAGMA table_info`, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub col_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// One physical index (sqlite autoindexes excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

// Identifiers reach these probes from sqlite_master, so keywords and odd
// characters must round-trip.
fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Columns of a table in declaration order. Empty when the table is absent.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                col_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    Ok(table_columns(conn, table)?.iter().any(|c| c.name == column))
}

/// Explicitly created indexes on a table, sorted by name.
pub fn table_indexes(conn: &Connection, table: &str) -> Result<Vec<IndexInfo>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quoted(table)))?;
    let mut indexes = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let unique: i64 = row.get(2)?;
            let origin: String = row.get(3)?;
            Ok((name, unique != 0, origin))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        // origin "c" = CREATE INDEX; skips autoindexes backing PKs and UNIQUEs
        .filter(|(_, _, origin)| origin == "c")
        .map(|(name, unique, _)| IndexInfo {
            name,
            unique,
            columns: Vec::new(),
        })
        .collect::<Vec<_>>();

    for index in &mut indexes {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quoted(&index.name)))?;
        let mut cols = stmt
            .query_map([], |row| {
                let seqno: i64 = row.get(0)?;
                let name: String = row.get(2)?;
                Ok((seqno, name))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        cols.sort_by_key(|(seqno, _)| *seqno);
        index.columns = cols.into_iter().map(|(_, name)| name).collect();
    }

    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(indexes)
}

pub fn row_count(conn: &Connection, table: &str) -> Result<i64, StoreError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quoted(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// All user tables, sorted by name. Internal sqlite tables are excluded.
pub fn user_tables(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

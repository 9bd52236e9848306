//! Store handle and open-time recovery
//!
//! All access goes through one [`Store`], which owns the connection behind a
//! mutex. Opening probes that the file is actually readable; an unreadable
//! or corrupt handle gets exactly one delete-and-recreate attempt, and a
//! second failure is fatal. The engine never continues with a half-open
//! handle.

use crate::error::StoreError;
use crate::validation::{validate_amount, validate_id, validate_name};
use crate::version::now_ms;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Live handle to the embedded store.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

/// Caller input for recording one transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: String,
    pub amount: String,
    pub occurred_at: i64,
    pub category_id: String,
    pub category_name: String,
    pub note: Option<String>,
}

/// One stored transaction row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub amount: String,
    pub occurred_at: i64,
    pub category_id: String,
    pub category_name: String,
    pub created_at: i64,
    pub note: Option<String>,
    /// Embedded line items, raw JSON array.
    pub splits: String,
}

impl Store {
    pub(crate) fn new(conn: Connection, path: PathBuf) -> Self {
        Self {
            conn: Mutex::new(conn),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure against the live connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Insert one transaction. Input is validated before any SQL runs.
    pub fn record_transaction(&self, tx: &NewTransaction) -> Result<(), StoreError> {
        validate_id("transaction id", &tx.id)?;
        validate_amount(&tx.amount)?;
        validate_id("category id", &tx.category_id)?;
        validate_name("category name", &tx.category_name)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transactions
                   (id, amount, occurred_at, category_id, category_name, created_at, note, splits)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]')",
                params![
                    tx.id,
                    tx.amount,
                    tx.occurred_at,
                    tx.category_id,
                    tx.category_name,
                    now_ms(),
                    tx.note,
                ],
            )?;
            Ok(())
        })
    }

    pub fn transaction_by_id(&self, id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT id, amount, occurred_at, category_id, category_name,
                            created_at, note, splits
                     FROM transactions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(TransactionRecord {
                            id: row.get(0)?,
                            amount: row.get(1)?,
                            occurred_at: row.get(2)?,
                            category_id: row.get(3)?,
                            category_name: row.get(4)?,
                            created_at: row.get(5)?,
                            note: row.get(6)?,
                            splits: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
    }
}

fn try_open(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    // Opening is lazy; force a read so corruption surfaces here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Open the database file, recreating it from scratch once if it cannot be
/// read. A second failure is [`StoreError::StoreUnreadable`].
pub fn open_with_recovery(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match try_open(path) {
        Ok(conn) => Ok(conn),
        Err(first) => {
            tracing::warn!(
                path = %path.display(),
                error = %first,
                "store unreadable, attempting recreate from scratch"
            );
            remove_store_files(path)?;
            try_open(path).map_err(|second| {
                tracing::error!(
                    path = %path.display(),
                    error = %second,
                    "store unreadable after recreate attempt"
                );
                StoreError::StoreUnreadable(second.to_string())
            })
        }
    }
}

fn remove_store_files(path: &Path) -> Result<(), StoreError> {
    for candidate in [
        path.to_path_buf(),
        path.with_extension("db-wal"),
        path.with_extension("db-shm"),
    ] {
        if candidate.exists() {
            std::fs::remove_file(&candidate)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;

    fn ready_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = open_with_recovery(&path).unwrap();
        bootstrap::initialize(&conn).unwrap();
        (dir, Store::new(conn, path))
    }

    fn sample_tx(id: &str) -> NewTransaction {
        NewTransaction {
            id: id.to_string(),
            amount: "50.00".to_string(),
            occurred_at: 1_700_000_000_000,
            category_id: "food".to_string(),
            category_name: "Food".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let (_dir, store) = ready_store();
        store.record_transaction(&sample_tx("t1")).unwrap();
        let record = store.transaction_by_id("t1").unwrap().unwrap();
        assert_eq!(record.amount, "50.00");
        assert_eq!(record.splits, "[]");
    }

    #[test]
    fn test_malformed_amount_rejected_before_sql() {
        let (_dir, store) = ready_store();
        let mut tx = sample_tx("t2");
        tx.amount = "fifty".to_string();
        let err = store.record_transaction(&tx).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.transaction_by_id("t2").unwrap().is_none());
    }

    #[test]
    fn test_missing_row_reads_none() {
        let (_dir, store) = ready_store();
        assert!(store.transaction_by_id("absent").unwrap().is_none());
    }

    #[test]
    fn test_garbage_file_recovered_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is not a sqlite file at all").unwrap();
        let conn = open_with_recovery(&path).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}

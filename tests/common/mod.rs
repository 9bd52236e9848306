//! Common test utilities for CoinKeeper store integration tests

use coinkeeper_store::StoreContext;
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// The legacy content table as very old installs shipped it, before the
/// migration engine existed ("version 0" stores).
pub const LEGACY_TRANSACTIONS_DDL: &str = "CREATE TABLE transactions (
  id TEXT PRIMARY KEY,
  amount TEXT NOT NULL,
  occurred_at INTEGER NOT NULL,
  category_id TEXT NOT NULL,
  category_name TEXT NOT NULL,
  created_at INTEGER NOT NULL
)";

/// Temp-dir store plus the context that bootstraps it
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub ctx: StoreContext,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("coinkeeper.db");
        let ctx = StoreContext::new(&db_path);
        Self {
            temp_dir,
            db_path,
            ctx,
        }
    }

    /// Open a raw second connection to the same file, bypassing the engine.
    pub fn open_raw(&self) -> Connection {
        Connection::open(&self.db_path).expect("open raw connection")
    }
}

/// Create the legacy table on a raw connection.
#[allow(dead_code)]
pub fn create_legacy_table(conn: &Connection) {
    conn.execute_batch(LEGACY_TRANSACTIONS_DDL)
        .expect("create legacy table");
}

/// Insert a row in the legacy shape.
#[allow(dead_code)]
pub fn insert_legacy_transaction(
    conn: &Connection,
    id: &str,
    amount: &str,
    category_id: &str,
    category_name: &str,
) {
    conn.execute(
        "INSERT INTO transactions (id, amount, occurred_at, category_id, category_name, created_at)
         VALUES (?1, ?2, 1000, ?3, ?4, 1000)",
        rusqlite::params![id, amount, category_id, category_name],
    )
    .expect("insert legacy transaction");
}

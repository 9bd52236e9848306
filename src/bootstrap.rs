//! Bootstrapper: the process-start entry point
//!
//! Decides create-fresh vs. verify-and-migrate vs. forced-remigrate, per the
//! decision table:
//!
//! | content rows | stored version | forced | action                                   |
//! |--------------|----------------|--------|------------------------------------------|
//! | no           | any            | n/a    | create full schema, seed, version=target |
//! | yes          | < target       | n/a    | run runner, re-apply DDL, version=target |
//! | yes          | >= target      | yes    | run runner from stored-1, then as above  |
//! | yes          | >= target      | no     | re-apply full DDL only                   |

use crate::error::StoreError;
use crate::integrity;
use crate::introspect;
use crate::runner;
use crate::schema::{self, TARGET_SCHEMA_VERSION};
use crate::store::{self, Store};
use crate::version::{self, now_ms};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;

/// Static reference categories seeded on a fresh install:
/// `(id, name, icon, sort_order, reserved)`. The reserved fallback row comes
/// first; user-visible defaults continue after it.
const SEED_CATEGORIES: &[(&str, &str, &str, i64, bool)] = &[
    (
        schema::RESERVED_CATEGORY_ID,
        schema::RESERVED_CATEGORY_NAME,
        "tag",
        0,
        true,
    ),
    ("food", "Food", "utensils", 1, false),
    ("transport", "Transport", "bus", 2, false),
    ("housing", "Housing", "home", 3, false),
    ("entertainment", "Entertainment", "film", 4, false),
    ("utilities", "Utilities", "bolt", 5, false),
];

/// Owner of the live store handle. `bootstrap` is idempotent: repeated calls
/// return the same handle, and a second caller arriving while initialization
/// is still running blocks on the same attempt instead of starting its own.
/// A failed attempt leaves the slot empty, so a retry re-enters from the
/// same stored version.
pub struct StoreContext {
    path: PathBuf,
    handle: Mutex<Option<Arc<Store>>>,
}

impl StoreContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: Mutex::new(None),
        }
    }

    /// Open, verify and migrate the store, returning the live handle.
    pub fn bootstrap(&self) -> Result<Arc<Store>, StoreError> {
        // Held for the whole attempt: this is the in-flight guard.
        let mut slot = self.handle.lock();
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }

        let conn = store::open_with_recovery(&self.path)?;
        initialize(&conn)?;

        let store = Arc::new(Store::new(conn, self.path.clone()));
        *slot = Some(store.clone());
        Ok(store)
    }
}

/// Default on-device database location.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CoinKeeper")
        .join("coinkeeper.db")
}

/// Apply the bootstrap decision table to an open connection.
pub fn initialize(conn: &Connection) -> Result<(), StoreError> {
    let has_content = introspect::table_exists(conn, "transactions")?
        && introspect::row_count(conn, "transactions")? > 0;
    let stored = version::read_version(conn)?;

    if !has_content {
        tracing::info!(stored, "no content data, creating fresh store at target schema");
        create_fresh(conn)?;
        return Ok(());
    }

    if stored < TARGET_SCHEMA_VERSION {
        tracing::info!(stored, target = TARGET_SCHEMA_VERSION, "store behind target, migrating");
        runner::run(conn, stored)?;
        conn.execute_batch(&schema::full_schema_sql())?;
        version::write_version(conn, TARGET_SCHEMA_VERSION)?;
        return Ok(());
    }

    if integrity::needs_forced_migration(conn, stored)? {
        // The marker says "done" but the physical schema disagrees; treat the
        // store as one version behind and re-enter the runner.
        tracing::warn!(stored, "integrity mismatch, forcing re-migration");
        runner::run(conn, stored - 1)?;
        conn.execute_batch(&schema::full_schema_sql())?;
        version::write_version(conn, TARGET_SCHEMA_VERSION)?;
        return Ok(());
    }

    // Up to date. Re-applying the guarded DDL covers index-only additions
    // that shipped without a version bump.
    conn.execute_batch(&schema::full_schema_sql())?;
    Ok(())
}

/// Create the full current schema and seed static reference data. Only taken
/// when the store holds no content rows. Tables holding rows (user-created
/// categories or budgets recorded before any transaction) are never touched;
/// a leftover table is dropped only when it is both empty and shaped
/// differently than the registry, so the fresh DDL actually applies.
pub(crate) fn create_fresh(conn: &Connection) -> Result<(), StoreError> {
    for table in schema::registry_tables() {
        if !introspect::table_exists(conn, table.name)? {
            continue;
        }
        if introspect::row_count(conn, table.name)? > 0 {
            continue;
        }
        let physical: Vec<String> = introspect::table_columns(conn, table.name)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        let expected: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
        if physical != expected {
            conn.execute_batch(&format!("DROP TABLE {}", table.name))?;
        }
    }
    conn.execute_batch(&schema::full_schema_sql())?;
    seed_reference_data(conn)?;
    version::write_version(conn, TARGET_SCHEMA_VERSION)?;
    Ok(())
}

fn seed_reference_data(conn: &Connection) -> Result<(), StoreError> {
    for (id, name, icon, sort_order, reserved) in SEED_CATEGORIES {
        conn.execute(
            "INSERT OR IGNORE INTO categories
               (id, name, icon, is_reserved, created_at, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, name, icon, i64::from(*reserved), now_ms(), sort_order],
        )?;
    }
    Ok(())
}

//! Migration step library
//!
//! The ordered catalogue of one-directional, versioned transforms. Ordinals
//! are contiguous and frozen: once a step has shipped, its semantics never
//! change; fixes ship as new, higher-ordinal steps. Every step is idempotent
//! and safe against a store already at or past its target shape.
//!
//! Table shapes referenced by shipped steps are frozen copies kept in this
//! file. They are expected to converge to the registry in `schema`; the
//! consistency verifier is what proves they actually do.

use crate::error::StoreError;
use crate::introspect;
use crate::schema::{
    self, ColumnDef, ColumnType, IndexDef, TableDef, RESERVED_CATEGORY_ID, RESERVED_CATEGORY_NAME,
};
use crate::version::now_ms;
use rusqlite::{params, Connection};

/// Display name the reserved category was seeded under by step 2. Frozen;
/// step 5 renamed it, step 9 repairs installs the rename missed.
const LEGACY_SEED_NAME: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Must succeed; failure aborts the whole run and blocks startup.
    Critical,
    /// Best-effort; failure degrades one feature but the store stays usable.
    Optional,
}

#[derive(Clone, Copy)]
pub struct MigrationStep {
    pub ordinal: u32,
    pub criticality: Criticality,
    pub description: &'static str,
    pub apply: fn(&Connection) -> Result<(), StoreError>,
}

/// The shipped step history, in execution order.
pub fn catalogue() -> &'static [MigrationStep] {
    const STEPS: &[MigrationStep] = &[
        MigrationStep {
            ordinal: 1,
            criticality: Criticality::Critical,
            description: "transactions base table and indexes",
            apply: step_01_transactions_base,
        },
        MigrationStep {
            ordinal: 2,
            criticality: Criticality::Critical,
            description: "categories table with reserved fallback row",
            apply: step_02_categories,
        },
        MigrationStep {
            ordinal: 3,
            criticality: Criticality::Critical,
            description: "transactions gains note column",
            apply: step_03_transactions_note,
        },
        MigrationStep {
            ordinal: 4,
            criticality: Criticality::Critical,
            description: "categories gains sort_order column",
            apply: step_04_categories_sort_order,
        },
        MigrationStep {
            ordinal: 5,
            criticality: Criticality::Critical,
            description: "rename reserved category to canonical name (shipped defect)",
            apply: step_05_reserved_rename,
        },
        MigrationStep {
            ordinal: 6,
            criticality: Criticality::Critical,
            description: "transactions gains splits line-item column",
            apply: step_06_transactions_splits,
        },
        MigrationStep {
            ordinal: 7,
            criticality: Criticality::Critical,
            description: "budgets table and unique month index",
            apply: step_07_budgets,
        },
        MigrationStep {
            ordinal: 8,
            criticality: Criticality::Optional,
            description: "backfill category_id on split line items",
            apply: step_08_split_category_backfill,
        },
        MigrationStep {
            ordinal: 9,
            criticality: Criticality::Critical,
            description: "repair reserved category name by identity alone",
            apply: step_09_reserved_category_repair,
        },
    ];
    STEPS
}

/// Version the catalogue converges to.
pub fn target_version() -> i64 {
    catalogue().last().map(|s| s.ordinal as i64).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Shadow-table rebuild
// ---------------------------------------------------------------------------

/// Rebuild `def.name` with a new shape. The engine is treated as having no
/// in-place column alter, so every column-adding step goes through here:
/// build a shadow table, copy every row via `copy_select`, swap the shadow
/// into place, recreate the indexes.
///
/// Callers are responsible for the idempotence guards (skip when the table is
/// absent or the column already exists).
pub fn rebuild_table_with_shape(
    conn: &Connection,
    def: &TableDef,
    copy_select: &str,
    indexes: &[IndexDef],
) -> Result<(), StoreError> {
    let shadow = format!("{}_shadow", def.name);
    // A leftover shadow from an interrupted run holds no authoritative data.
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", shadow))?;
    conn.execute_batch(&schema::create_table_sql_as(def, &shadow))?;
    conn.execute(
        &format!(
            "INSERT INTO {} SELECT {} FROM {}",
            shadow, copy_select, def.name
        ),
        [],
    )?;
    conn.execute_batch(&format!("DROP TABLE {}", def.name))?;
    conn.execute_batch(&format!("ALTER TABLE {} RENAME TO {}", shadow, def.name))?;
    for idx in indexes {
        conn.execute_batch(&schema::index_sql(idx))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Frozen milestone shapes
// ---------------------------------------------------------------------------

fn transactions_v1() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "transactions",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("amount", Text).not_null(),
            ColumnDef::new("occurred_at", Integer).not_null(),
            ColumnDef::new("category_id", Text).not_null(),
            ColumnDef::new("category_name", Text).not_null(),
            ColumnDef::new("created_at", Integer).not_null(),
        ],
    }
}

fn transactions_v3() -> TableDef {
    let mut def = transactions_v1();
    def.columns.push(ColumnDef::new("note", ColumnType::Text));
    def
}

fn transactions_v6() -> TableDef {
    let mut def = transactions_v3();
    def.columns.push(
        ColumnDef::new("splits", ColumnType::Text)
            .not_null()
            .default_sql("'[]'"),
    );
    def
}

fn categories_v2() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "categories",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("name", Text).not_null(),
            ColumnDef::new("icon", Text),
            ColumnDef::new("color", Text),
            ColumnDef::new("is_reserved", Integer).not_null().default_sql("0"),
            ColumnDef::new("created_at", Integer).not_null(),
        ],
    }
}

fn categories_v4() -> TableDef {
    let mut def = categories_v2();
    def.columns.push(
        ColumnDef::new("sort_order", ColumnType::Integer)
            .not_null()
            .default_sql("0"),
    );
    def
}

fn budgets_v7() -> TableDef {
    use ColumnType::*;
    TableDef {
        name: "budgets",
        columns: vec![
            ColumnDef::new("id", Text).primary_key(),
            ColumnDef::new("category_id", Text).not_null(),
            ColumnDef::new("month", Text).not_null(),
            ColumnDef::new("amount", Text).not_null(),
            ColumnDef::new("created_at", Integer).not_null(),
        ],
    }
}

fn transaction_indexes() -> Vec<IndexDef> {
    vec![
        IndexDef {
            name: "idx_transactions_occurred",
            table: "transactions",
            columns: &["occurred_at"],
            unique: false,
        },
        IndexDef {
            name: "idx_transactions_category",
            table: "transactions",
            columns: &["category_id"],
            unique: false,
        },
    ]
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// v1: legacy base table. Guarded creates make this naturally idempotent and
/// a no-op on pre-history stores that already carry the legacy table.
fn step_01_transactions_base(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&schema::create_table_sql(&transactions_v1()))?;
    for idx in transaction_indexes() {
        conn.execute_batch(&schema::index_sql(&idx))?;
    }
    Ok(())
}

/// v2: category reference table, seeding the reserved fallback row under the
/// display name this release shipped with. `INSERT OR IGNORE` keeps any
/// pre-existing reserved row (and whatever legacy name it carries) intact.
fn step_02_categories(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&schema::create_table_sql(&categories_v2()))?;
    conn.execute(
        "INSERT OR IGNORE INTO categories (id, name, is_reserved, created_at)
         VALUES (?1, ?2, 1, ?3)",
        params![RESERVED_CATEGORY_ID, LEGACY_SEED_NAME, now_ms()],
    )?;
    Ok(())
}

/// v3: transactions gains a nullable note column via shadow rebuild.
fn step_03_transactions_note(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::table_exists(conn, "transactions")? {
        // A later full-schema application will create the table fresh.
        return Ok(());
    }
    if introspect::has_column(conn, "transactions", "note")? {
        return Ok(());
    }
    rebuild_table_with_shape(
        conn,
        &transactions_v3(),
        "id, amount, occurred_at, category_id, category_name, created_at, NULL",
        &transaction_indexes(),
    )
}

/// v4: categories gains sort_order via shadow rebuild. The deterministic
/// default is a running sequence with reserved seed rows first, so user
/// categories continue after them.
fn step_04_categories_sort_order(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::table_exists(conn, "categories")? {
        return Ok(());
    }
    if introspect::has_column(conn, "categories", "sort_order")? {
        return Ok(());
    }
    rebuild_table_with_shape(
        conn,
        &categories_v4(),
        "id, name, icon, color, is_reserved, created_at, \
         ROW_NUMBER() OVER (ORDER BY is_reserved DESC, rowid) - 1",
        &[IndexDef {
            name: "idx_categories_sort",
            table: "categories",
            columns: &["sort_order"],
            unique: false,
        }],
    )
}

/// v5: rename the reserved category to its canonical name, as shipped.
///
/// The predicate filters by `id AND name = <seed name>`, so any store whose
/// reserved row was created under a different legacy name silently no-ops
/// while still being recorded as migrated. Frozen defect; step 9 is the fix.
/// New steps must never repeat this pattern: mutations by business key filter
/// by identity alone.
fn step_05_reserved_rename(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::table_exists(conn, "categories")? {
        return Ok(());
    }
    conn.execute(
        "UPDATE categories SET name = ?1 WHERE id = ?2 AND name = ?3",
        params![RESERVED_CATEGORY_NAME, RESERVED_CATEGORY_ID, LEGACY_SEED_NAME],
    )?;
    Ok(())
}

/// v6: transactions gains the embedded splits line-item collection, stored as
/// a JSON array column. Existing rows are backfilled with the empty list.
fn step_06_transactions_splits(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::table_exists(conn, "transactions")? {
        return Ok(());
    }
    if introspect::has_column(conn, "transactions", "splits")? {
        return Ok(());
    }
    rebuild_table_with_shape(
        conn,
        &transactions_v6(),
        "id, amount, occurred_at, category_id, category_name, created_at, note, '[]'",
        &transaction_indexes(),
    )
}

/// v7: budgets table plus the unique (category_id, month) constraint.
fn step_07_budgets(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&schema::create_table_sql(&budgets_v7()))?;
    conn.execute_batch(&schema::index_sql(&IndexDef {
        name: "ux_budgets_category_month",
        table: "budgets",
        columns: &["category_id", "month"],
        unique: true,
    }))?;
    Ok(())
}

/// v8 (Optional): fill category_id on split line items that predate the
/// attribute, defaulting to the parent transaction's category. Items already
/// carrying the attribute are left untouched, so re-running changes nothing.
fn step_08_split_category_backfill(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::has_column(conn, "transactions", "splits")? {
        return Ok(());
    }
    let mut stmt = conn.prepare(
        "SELECT id, category_id, splits FROM transactions WHERE splits NOT IN ('', '[]')",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut updated = 0usize;
    for (id, category_id, raw) in rows {
        let mut value: serde_json::Value = serde_json::from_str(&raw)?;
        let items = match value.as_array_mut() {
            Some(items) => items,
            None => continue,
        };
        let mut changed = false;
        for item in items.iter_mut() {
            if let Some(obj) = item.as_object_mut() {
                if !obj.contains_key("category_id") {
                    obj.insert(
                        "category_id".to_string(),
                        serde_json::Value::String(category_id.clone()),
                    );
                    changed = true;
                }
            }
        }
        if changed {
            conn.execute(
                "UPDATE transactions SET splits = ?1 WHERE id = ?2",
                params![value.to_string(), id],
            )?;
            updated += 1;
        }
    }
    if updated > 0 {
        tracing::info!(updated, "backfilled category_id on split line items");
    }
    Ok(())
}

/// v9: repair for step 5. Some stores ran the defective rename and are
/// recorded as done while still carrying a legacy name. Detect and correct
/// unconditionally, filtering by identity alone, and restore the dependents'
/// denormalized copies. Zero rows changed on a correct store is success.
fn step_09_reserved_category_repair(conn: &Connection) -> Result<(), StoreError> {
    if !introspect::table_exists(conn, "categories")? {
        return Ok(());
    }
    // Column list stays valid on the pre-sort_order shape; a forced re-run
    // can arrive here before step 4's rebuild. The column default covers it.
    conn.execute(
        "INSERT OR IGNORE INTO categories (id, name, is_reserved, created_at)
         VALUES (?1, ?2, 1, ?3)",
        params![RESERVED_CATEGORY_ID, RESERVED_CATEGORY_NAME, now_ms()],
    )?;
    let renamed = conn.execute(
        "UPDATE categories SET name = ?1, is_reserved = 1
         WHERE id = ?2 AND (name != ?1 OR is_reserved != 1)",
        params![RESERVED_CATEGORY_NAME, RESERVED_CATEGORY_ID],
    )?;
    if renamed > 0 {
        tracing::info!("repaired reserved category display name");
    }
    if introspect::table_exists(conn, "transactions")? {
        let repaired = conn.execute(
            "UPDATE transactions SET category_name = ?1
             WHERE category_id = ?2 AND category_name != ?1",
            params![RESERVED_CATEGORY_NAME, RESERVED_CATEGORY_ID],
        )?;
        if repaired > 0 {
            tracing::info!(repaired, "repaired denormalized reserved category names");
        }
    }
    Ok(())
}

//! Fresh-vs-migrated consistency verifier
//!
//! Build/test-time tool, not a runtime component: one store is bootstrapped
//! fresh at the target version, one is created empty at version 0 and walked
//! through every migration step, and the two physical schemas are compared
//! table by table, column by column and index by index. Any diff means the
//! registry and the step catalogue have drifted apart.

use crate::bootstrap;
use crate::error::StoreError;
use crate::introspect;
use crate::runner;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;

/// One divergence between the fresh and the migrated schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDiff {
    pub table: String,
    pub detail: String,
}

/// Compare a fresh-at-target store against a walked-from-zero store.
/// An empty result is the pass condition.
pub fn verify_fresh_vs_migrated() -> Result<Vec<SchemaDiff>, StoreError> {
    let fresh = Connection::open_in_memory()?;
    bootstrap::initialize(&fresh)?;

    let migrated = Connection::open_in_memory()?;
    // Steps only: the point is proving the catalogue alone converges.
    runner::run(&migrated, 0)?;

    diff_stores(&fresh, &migrated)
}

/// Structural comparison of every user table present in either store.
pub fn diff_stores(
    fresh: &Connection,
    migrated: &Connection,
) -> Result<Vec<SchemaDiff>, StoreError> {
    let mut diffs = Vec::new();

    let tables: BTreeSet<String> = introspect::user_tables(fresh)?
        .into_iter()
        .chain(introspect::user_tables(migrated)?)
        .collect();

    for table in tables {
        let in_fresh = introspect::table_exists(fresh, &table)?;
        let in_migrated = introspect::table_exists(migrated, &table)?;
        if !in_fresh || !in_migrated {
            diffs.push(SchemaDiff {
                table: table.clone(),
                detail: format!(
                    "present in {} only",
                    if in_fresh { "fresh" } else { "migrated" }
                ),
            });
            continue;
        }
        diff_columns(fresh, migrated, &table, &mut diffs)?;
        diff_indexes(fresh, migrated, &table, &mut diffs)?;
    }

    Ok(diffs)
}

fn diff_columns(
    fresh: &Connection,
    migrated: &Connection,
    table: &str,
    diffs: &mut Vec<SchemaDiff>,
) -> Result<(), StoreError> {
    let a = introspect::table_columns(fresh, table)?;
    let b = introspect::table_columns(migrated, table)?;

    if a.len() != b.len() {
        diffs.push(SchemaDiff {
            table: table.to_string(),
            detail: format!("column count differs: fresh {} vs migrated {}", a.len(), b.len()),
        });
    }
    for (pos, (fa, fb)) in a.iter().zip(b.iter()).enumerate() {
        if fa != fb {
            diffs.push(SchemaDiff {
                table: table.to_string(),
                detail: format!(
                    "column {} differs: fresh {:?} vs migrated {:?}",
                    pos, fa, fb
                ),
            });
        }
    }
    Ok(())
}

fn diff_indexes(
    fresh: &Connection,
    migrated: &Connection,
    table: &str,
    diffs: &mut Vec<SchemaDiff>,
) -> Result<(), StoreError> {
    let a = introspect::table_indexes(fresh, table)?;
    let b = introspect::table_indexes(migrated, table)?;

    let names_a: BTreeSet<&str> = a.iter().map(|i| i.name.as_str()).collect();
    let names_b: BTreeSet<&str> = b.iter().map(|i| i.name.as_str()).collect();
    for only_fresh in names_a.difference(&names_b) {
        diffs.push(SchemaDiff {
            table: table.to_string(),
            detail: format!("index {} present in fresh only", only_fresh),
        });
    }
    for only_migrated in names_b.difference(&names_a) {
        diffs.push(SchemaDiff {
            table: table.to_string(),
            detail: format!("index {} present in migrated only", only_migrated),
        });
    }
    for idx_a in &a {
        if let Some(idx_b) = b.iter().find(|i| i.name == idx_a.name) {
            if idx_a != idx_b {
                diffs.push(SchemaDiff {
                    table: table.to_string(),
                    detail: format!(
                        "index {} differs: fresh {:?}/{:?} vs migrated {:?}/{:?}",
                        idx_a.name, idx_a.unique, idx_a.columns, idx_b.unique, idx_b.columns
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_and_migrated_schemas_are_identical() {
        let diffs = verify_fresh_vs_migrated().unwrap();
        assert!(diffs.is_empty(), "schema drift detected: {:?}", diffs);
    }

    #[test]
    fn test_extra_column_is_reported() {
        let a = Connection::open_in_memory().unwrap();
        let b = Connection::open_in_memory().unwrap();
        a.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY, extra TEXT)").unwrap();
        b.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY)").unwrap();
        let diffs = diff_stores(&a, &b).unwrap();
        assert!(diffs.iter().any(|d| d.detail.contains("column count differs")));
    }

    #[test]
    fn test_missing_table_is_reported() {
        let a = Connection::open_in_memory().unwrap();
        let b = Connection::open_in_memory().unwrap();
        a.execute_batch("CREATE TABLE only_here (id TEXT PRIMARY KEY)").unwrap();
        let diffs = diff_stores(&a, &b).unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].detail.contains("present in fresh only"));
    }

    #[test]
    fn test_index_mismatch_is_reported() {
        let a = Connection::open_in_memory().unwrap();
        let b = Connection::open_in_memory().unwrap();
        a.execute_batch("CREATE TABLE t (id TEXT, v INTEGER); CREATE INDEX idx_v ON t(v)").unwrap();
        b.execute_batch("CREATE TABLE t (id TEXT, v INTEGER)").unwrap();
        let diffs = diff_stores(&a, &b).unwrap();
        assert!(diffs.iter().any(|d| d.detail.contains("idx_v")));
    }
}

//! Criticality semantics exercised against the real shipped catalogue

mod common;

use common::{create_legacy_table, insert_legacy_transaction, TestContext};
use coinkeeper_store::steps::{catalogue, Criticality, MigrationStep};
use coinkeeper_store::version::read_version;
use coinkeeper_store::{introspect, runner, StoreError};
use rusqlite::Connection;

fn always_fails(_conn: &Connection) -> Result<(), StoreError> {
    Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
}

fn catalogue_with_failure_at(ordinal: u32) -> Vec<MigrationStep> {
    let mut steps = catalogue().to_vec();
    let step = steps
        .iter_mut()
        .find(|s| s.ordinal == ordinal)
        .expect("ordinal in catalogue");
    step.apply = always_fails;
    steps
}

#[test]
fn test_failing_optional_step_still_completes_the_upgrade() {
    let tc = TestContext::new();
    let raw = tc.open_raw();
    create_legacy_table(&raw);
    insert_legacy_transaction(&raw, "tx-1", "4.00", "food", "Food");

    // Ordinal 8, the split backfill, is the one shipped Optional step.
    let steps = catalogue_with_failure_at(8);
    assert_eq!(steps[7].criticality, Criticality::Optional);

    let reached = runner::run_steps(&raw, &steps, 0).unwrap();

    assert_eq!(reached, coinkeeper_store::TARGET_SCHEMA_VERSION);
    assert_eq!(read_version(&raw).unwrap(), coinkeeper_store::TARGET_SCHEMA_VERSION);
    // The store is fully shaped and usable despite the degraded step.
    assert!(introspect::has_column(&raw, "transactions", "splits").unwrap());
    assert!(introspect::table_exists(&raw, "budgets").unwrap());
    assert_eq!(introspect::row_count(&raw, "transactions").unwrap(), 1);
}

#[test]
fn test_failing_critical_step_blocks_the_upgrade() {
    let tc = TestContext::new();
    let raw = tc.open_raw();
    create_legacy_table(&raw);
    insert_legacy_transaction(&raw, "tx-1", "4.00", "food", "Food");

    let steps = catalogue_with_failure_at(7);
    assert_eq!(steps[6].criticality, Criticality::Critical);

    let err = runner::run_steps(&raw, &steps, 0).unwrap_err();

    assert!(matches!(err, StoreError::CriticalMigration { ordinal: 7, .. }));
    assert!(err.is_fatal());
    // Earlier steps committed, the version marker never advanced.
    assert!(introspect::has_column(&raw, "transactions", "splits").unwrap());
    assert!(!introspect::table_exists(&raw, "budgets").unwrap());
    assert_eq!(read_version(&raw).unwrap(), 0);
}

#[test]
fn test_retry_after_critical_failure_finishes_the_job() {
    let tc = TestContext::new();
    let raw = tc.open_raw();
    create_legacy_table(&raw);
    insert_legacy_transaction(&raw, "tx-1", "4.00", "food", "Food");

    assert!(runner::run_steps(&raw, &catalogue_with_failure_at(7), 0).is_err());
    drop(raw);

    // Next launch retries from the unadvanced version and succeeds.
    let store = tc.ctx.bootstrap().unwrap();
    store
        .with_conn(|conn| {
            assert_eq!(read_version(conn)?, coinkeeper_store::TARGET_SCHEMA_VERSION);
            assert!(introspect::table_exists(conn, "budgets")?);
            Ok(())
        })
        .unwrap();
    assert!(store.transaction_by_id("tx-1").unwrap().is_some());
}

//! Full-catalogue upgrade scenarios over real on-disk stores

mod common;

use common::{create_legacy_table, insert_legacy_transaction, TestContext};
use coinkeeper_store::schema::{RESERVED_CATEGORY_ID, RESERVED_CATEGORY_NAME};
use coinkeeper_store::version::read_version;
use coinkeeper_store::{consistency, introspect, runner, steps, TARGET_SCHEMA_VERSION};
use rusqlite::Connection;

fn capture_schema(conn: &Connection) -> Vec<String> {
    let mut shape = Vec::new();
    for table in introspect::user_tables(conn).unwrap() {
        for col in introspect::table_columns(conn, &table).unwrap() {
            shape.push(format!("{table}.{col:?}"));
        }
        for idx in introspect::table_indexes(conn, &table).unwrap() {
            shape.push(format!("{table}:{idx:?}"));
        }
    }
    shape
}

#[test]
fn test_legacy_rows_survive_the_full_upgrade() {
    let tc = TestContext::new();
    {
        let raw = tc.open_raw();
        create_legacy_table(&raw);
        for i in 0..25 {
            insert_legacy_transaction(&raw, &format!("tx-{i}"), "10.00", "food", "Food");
        }
    }

    let store = tc.ctx.bootstrap().unwrap();

    store
        .with_conn(|conn| {
            assert_eq!(read_version(conn)?, TARGET_SCHEMA_VERSION);
            assert_eq!(introspect::row_count(conn, "transactions")?, 25);
            Ok(())
        })
        .unwrap();
    for i in 0..25 {
        let record = store.transaction_by_id(&format!("tx-{i}")).unwrap().unwrap();
        assert_eq!(record.amount, "10.00");
        assert_eq!(record.note, None);
        assert_eq!(record.splits, "[]");
    }
}

#[test]
fn test_rerunning_every_step_changes_nothing() {
    let tc = TestContext::new();
    {
        let raw = tc.open_raw();
        create_legacy_table(&raw);
        insert_legacy_transaction(&raw, "tx-1", "7.50", "food", "Food");
    }
    let store = tc.ctx.bootstrap().unwrap();

    store
        .with_conn(|conn| {
            let before = capture_schema(conn);
            let rows = introspect::row_count(conn, "transactions")?;

            // Force every shipped step to run again from the beginning.
            runner::run(conn, 0)?;

            assert_eq!(capture_schema(conn), before);
            assert_eq!(introspect::row_count(conn, "transactions")?, rows);
            assert_eq!(read_version(conn)?, TARGET_SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_legacy_reserved_name_is_repaired_with_its_dependents() {
    // A pre-engine store whose reserved category was created under a name
    // the defective rename in step 5 never matched.
    let tc = TestContext::new();
    {
        let raw = tc.open_raw();
        create_legacy_table(&raw);
        insert_legacy_transaction(&raw, "tx-1", "5.00", RESERVED_CATEGORY_ID, "Misc");
        insert_legacy_transaction(&raw, "tx-2", "8.00", "food", "Food");
        raw.execute_batch(
            "CREATE TABLE categories (
               id TEXT PRIMARY KEY,
               name TEXT NOT NULL,
               icon TEXT,
               color TEXT,
               is_reserved INTEGER NOT NULL DEFAULT 0,
               created_at INTEGER NOT NULL
             )",
        )
        .unwrap();
        raw.execute(
            "INSERT INTO categories (id, name, is_reserved, created_at) VALUES (?1, 'Misc', 1, 1000)",
            [RESERVED_CATEGORY_ID],
        )
        .unwrap();
    }

    let store = tc.ctx.bootstrap().unwrap();

    store
        .with_conn(|conn| {
            let name: String = conn.query_row(
                "SELECT name FROM categories WHERE id = ?1",
                [RESERVED_CATEGORY_ID],
                |r| r.get(0),
            )?;
            assert_eq!(name, RESERVED_CATEGORY_NAME);
            Ok(())
        })
        .unwrap();

    // Denormalized copies on dependent rows follow the repair.
    let repaired = store.transaction_by_id("tx-1").unwrap().unwrap();
    assert_eq!(repaired.category_name, RESERVED_CATEGORY_NAME);
    let untouched = store.transaction_by_id("tx-2").unwrap().unwrap();
    assert_eq!(untouched.category_name, "Food");
}

#[test]
fn test_split_items_gain_category_id_during_upgrade() {
    // A store paused at version 7, after splits shipped but before the
    // backfill, holding a mix of annotated and bare line items.
    let tc = TestContext::new();
    {
        let raw = tc.open_raw();
        runner::run_steps(&raw, &steps::catalogue()[..7], 0).unwrap();
        raw.execute(
            "INSERT INTO transactions (id, amount, occurred_at, category_id, category_name, created_at, splits)
             VALUES ('tx-1', '9.00', 1, 'food', 'Food', 1,
                     '[{\"label\":\"coffee\",\"amount\":\"3.00\"},{\"label\":\"cake\",\"amount\":\"6.00\",\"category_id\":\"treats\"}]')",
            [],
        )
        .unwrap();
    }

    let store = tc.ctx.bootstrap().unwrap();

    let record = store.transaction_by_id("tx-1").unwrap().unwrap();
    let items: serde_json::Value = serde_json::from_str(&record.splits).unwrap();
    assert_eq!(items[0]["category_id"], "food");
    assert_eq!(items[1]["category_id"], "treats");
}

#[test]
fn test_migrated_file_store_matches_fresh_schema() {
    let tc = TestContext::new();
    {
        let raw = tc.open_raw();
        create_legacy_table(&raw);
        insert_legacy_transaction(&raw, "tx-1", "1.00", "food", "Food");
    }
    let store = tc.ctx.bootstrap().unwrap();

    let fresh = Connection::open_in_memory().unwrap();
    coinkeeper_store::bootstrap::initialize(&fresh).unwrap();

    store
        .with_conn(|conn| {
            let diffs = consistency::diff_stores(&fresh, conn)?;
            assert!(diffs.is_empty(), "schema drift: {diffs:?}");
            Ok(())
        })
        .unwrap();
}

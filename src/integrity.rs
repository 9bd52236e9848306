//! Integrity verifier
//!
//! Detects a version marker that was advanced even though the underlying
//! step silently no-op'd or partially failed: for every shape-changing
//! milestone at or below the recorded version, probe the physical schema and
//! compare against what that milestone guarantees. A mismatch is a signal to
//! force re-migration, not an error.

use crate::error::StoreError;
use crate::introspect::{has_column, table_exists};
use rusqlite::Connection;

struct Milestone {
    version: i64,
    guarantees: &'static str,
    probe: fn(&Connection) -> Result<bool, StoreError>,
}

fn milestones() -> &'static [Milestone] {
    const MILESTONES: &[Milestone] = &[
        Milestone {
            version: 1,
            guarantees: "transactions table",
            probe: |conn| table_exists(conn, "transactions"),
        },
        Milestone {
            version: 2,
            guarantees: "categories table",
            probe: |conn| table_exists(conn, "categories"),
        },
        Milestone {
            version: 3,
            guarantees: "transactions.note column",
            probe: |conn| has_column(conn, "transactions", "note"),
        },
        Milestone {
            version: 4,
            guarantees: "categories.sort_order column",
            probe: |conn| has_column(conn, "categories", "sort_order"),
        },
        Milestone {
            version: 6,
            guarantees: "transactions.splits column",
            probe: |conn| has_column(conn, "transactions", "splits"),
        },
        Milestone {
            version: 7,
            guarantees: "budgets table",
            probe: |conn| table_exists(conn, "budgets"),
        },
    ];
    MILESTONES
}

/// True when the physical schema is missing something a milestone at or
/// below `stored_version` guarantees. The bootstrapper then treats the store
/// as one version behind and re-enters the runner.
pub fn needs_forced_migration(conn: &Connection, stored_version: i64) -> Result<bool, StoreError> {
    for milestone in milestones() {
        if milestone.version > stored_version {
            break;
        }
        if !(milestone.probe)(conn)? {
            tracing::warn!(
                stored_version,
                milestone = milestone.version,
                missing = milestone.guarantees,
                "recorded schema version does not match physical schema"
            );
            return Ok(true);
        }
    }
    Ok(false)
}

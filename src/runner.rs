//! Migration runner
//!
//! Executes pending steps in ordinal order. Each step runs inside its own
//! transaction, so a step touching several tables can never leave them
//! mutually inconsistent. The version marker is advanced once, after the
//! whole batch, never optimistically before.

use crate::error::StoreError;
use crate::steps::{self, Criticality, MigrationStep};
use crate::version;
use rusqlite::Connection;

/// Run every shipped step above `from_version`. Returns the version the
/// store was advanced to.
pub fn run(conn: &Connection, from_version: i64) -> Result<i64, StoreError> {
    run_steps(conn, steps::catalogue(), from_version)
}

/// Run an explicit step list. Split out from [`run`] so tests can inject
/// failing steps; production code always goes through the shipped catalogue.
pub fn run_steps(
    conn: &Connection,
    steps: &[MigrationStep],
    from_version: i64,
) -> Result<i64, StoreError> {
    let target = match steps.last() {
        Some(step) => step.ordinal as i64,
        None => return Ok(from_version),
    };
    if from_version >= target {
        return Ok(from_version);
    }

    tracing::info!(from_version, target, "running schema migrations");

    for step in steps {
        if (step.ordinal as i64) <= from_version {
            continue;
        }
        let tx = conn.unchecked_transaction()?;
        match (step.apply)(&tx) {
            Ok(()) => {
                tx.commit()?;
                tracing::info!(ordinal = step.ordinal, step.description, "migration step applied");
            }
            Err(err) => {
                // Dropping the transaction rolls the step back.
                drop(tx);
                match step.criticality {
                    Criticality::Critical => {
                        tracing::error!(
                            ordinal = step.ordinal,
                            step.description,
                            error = %err,
                            "critical migration step failed, aborting"
                        );
                        return Err(StoreError::CriticalMigration {
                            ordinal: step.ordinal,
                            source: Box::new(err),
                        });
                    }
                    Criticality::Optional => {
                        // The feature this step feeds may be missing or stale;
                        // the ordinal still counts as passed.
                        tracing::warn!(
                            ordinal = step.ordinal,
                            step.description,
                            error = %err,
                            "optional migration step failed, continuing"
                        );
                    }
                }
            }
        }
    }

    version::write_version(conn, target)?;
    Ok(target)
}

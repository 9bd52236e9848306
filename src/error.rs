//! Error types for the CoinKeeper store
//!
//! One taxonomy for the whole engine:
//! - `Validation`: malformed caller input, surfaced immediately
//! - `CriticalMigration`: a must-succeed step failed; bootstrap aborts and the
//!   application must not start
//! - `StoreUnreadable`: the database file could not be opened even after the
//!   single recreate attempt
//!
//! Optional migration failures are absorbed by the runner and never become a
//! variant here; an integrity mismatch is a boolean signal, not an error.

use crate::validation::ValidationError;
use thiserror::Error;

/// User-facing message for fatal startup errors. Internals go to logs only;
/// nothing tied to the user's financial data is surfaced.
pub const SUPPORT_MESSAGE: &str =
    "CoinKeeper could not prepare its local database. Please reinstall the app or contact support.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed embedded data: {0}")]
    Data(#[from] serde_json::Error),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("critical migration step {ordinal} failed: {source}")]
    CriticalMigration {
        ordinal: u32,
        #[source]
        source: Box<StoreError>,
    },
    #[error("store unreadable: {0}")]
    StoreUnreadable(String),
}

impl StoreError {
    /// Whether this error must block application startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::CriticalMigration { .. } | StoreError::StoreUnreadable(_)
        )
    }

    /// Message suitable for showing to the user. Fatal errors get the generic
    /// support text; validation errors are safe to show as-is.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Validation(e) => e.to_string(),
            e if e.is_fatal() => SUPPORT_MESSAGE.to_string(),
            _ => "A database operation failed.".to_string(),
        }
    }
}

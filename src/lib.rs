//! CoinKeeper store - embedded SQLite storage engine with versioned,
//! self-verifying schema migrations
//!
//! The engine evolves an on-device store from any historical shape to the
//! current target shape at application startup, without losing user data.
//! Entry point: [`StoreContext::bootstrap`].

pub mod bootstrap;
pub mod consistency;
pub mod error;
pub mod health;
pub mod integrity;
pub mod introspect;
pub mod runner;
pub mod schema;
pub mod steps;
pub mod store;
pub mod validation;
pub mod version;

pub use bootstrap::{default_db_path, StoreContext};
pub use error::{StoreError, SUPPORT_MESSAGE};
pub use health::{health_report, HealthReport};
pub use schema::TARGET_SCHEMA_VERSION;
pub use store::{NewTransaction, Store, TransactionRecord};

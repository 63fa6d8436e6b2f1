//! Embedded preferences store for DataSmith.
//!
//! A small SQLite database (`config.db`) holds saved connection credentials,
//! the last generation spec per table, and the usage ledger of rows inserted
//! since the last commit.

pub mod error;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{CredSummary, PrefStore};

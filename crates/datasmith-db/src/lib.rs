//! Live target-database layer for DataSmith.
//!
//! A [`Driver`] hides the dialect behind a small introspection/execution
//! trait; the [`inspect`] module turns raw driver output into the typed
//! [`TableMetadata`](datasmith_core::TableMetadata) contract the generator
//! pipeline consumes.

pub mod driver;
pub mod error;
pub mod inspect;
pub mod logging;
pub mod mysql_driver;
pub mod sqlite_driver;

pub use driver::{Driver, QueryOutput, RawColumn, RawForeignKey, connect};
pub use error::{DbError, Result};
pub use logging::SqlLog;

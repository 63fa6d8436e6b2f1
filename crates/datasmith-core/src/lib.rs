//! Core types for the DataSmith population engine.
//!
//! Everything shared between the database layer, the generator pipeline and
//! the command server lives here: introspected schema metadata, user column
//! specifications, generated row packets, connection credentials and the
//! foreign-key dependency sorter.

pub mod creds;
pub mod graph;
pub mod metadata;
pub mod packet;
pub mod spec;
pub mod usage;

pub use creds::{DbCreds, Dialect};
pub use metadata::{ColumnMetadata, ForeignKeyRef, TableMetadata};
pub use packet::{ErrorPacket, TablePacket};
pub use spec::{ColumnSpec, GeneratorKind, TableSpec};
pub use usage::UsageStat;

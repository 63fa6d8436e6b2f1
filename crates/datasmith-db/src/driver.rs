//! The dialect-neutral driver trait.

use datasmith_core::creds::{DbCreds, Dialect};

use crate::error::Result;
use crate::logging::SqlLog;
use crate::mysql_driver::MySqlDriver;
use crate::sqlite_driver::SqliteDriver;

/// One column as the dialect reports it, before metadata normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    /// Dialect-native type text, e.g. `varchar(40)` or `DECIMAL(10,2)`.
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub autoincrement: bool,
    pub computed: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// One foreign-key column mapping as the dialect reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForeignKey {
    /// Constrained column in the child table.
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Result of an ad-hoc SQL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub affected: u64,
    pub returns_rows: bool,
}

/// Blocking driver for one live database connection.
///
/// Introspection methods are read-only; writes go through the explicit
/// transaction calls plus [`insert_rows`](Driver::insert_rows).
pub trait Driver: Send {
    /// Cheap connectivity check (`SELECT 1`).
    fn ping(&mut self) -> Result<()>;

    fn table_names(&mut self) -> Result<Vec<String>>;

    fn count_rows(&mut self, table: &str) -> Result<u64>;

    fn columns(&mut self, table: &str) -> Result<Vec<RawColumn>>;

    /// Primary-key column names in key order. Empty when the table has none.
    fn primary_key(&mut self, table: &str) -> Result<Vec<String>>;

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>>;

    /// Column-name groups of declared unique constraints and unique indexes,
    /// excluding the primary key.
    fn unique_groups(&mut self, table: &str) -> Result<Vec<Vec<String>>>;

    /// Distinct non-null values currently present in `table.column`,
    /// stringified.
    fn existing_values(&mut self, table: &str, column: &str) -> Result<Vec<String>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Inserts `rows` (parallel to `columns`) into `table` on the current
    /// connection, inside whatever transaction is active.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64>;

    /// Runs one ad-hoc SQL statement, capturing at most
    /// [`MAX_RESULT_ROWS`] result rows.
    fn query(&mut self, sql: &str) -> Result<QueryOutput>;
}

/// Result sets returned to the protocol are capped at this many rows to
/// keep client memory bounded.
pub const MAX_RESULT_ROWS: usize = 250;

/// Opens a driver for the credential's dialect.
pub fn connect(creds: &DbCreds, log: Option<SqlLog>) -> Result<Box<dyn Driver>> {
    Ok(match creds.dialect {
        Dialect::Sqlite => Box::new(SqliteDriver::connect(creds, log)?),
        Dialect::MySql => Box::new(MySqlDriver::connect(creds, log)?),
    })
}

//! Target-database error types.

/// Errors that can occur while talking to a target database.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish or keep a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The named table does not exist in the target database.
    #[error("table '{name}' does not exist in the database")]
    UnknownTable { name: String },

    /// The operation is not available for this dialect or state.
    #[error("{0}")]
    Unsupported(String),

    /// Credentials were incomplete for URL construction.
    #[error(transparent)]
    Creds(#[from] datasmith_core::creds::CredsError),

    /// A raw SQLite error from the sqlite dialect driver.
    #[error("query error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A raw MySQL error from the mysql dialect driver.
    #[error("query error: {0}")]
    MySql(#[from] mysql::Error),

    /// Log-file I/O failed.
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the database crate.
pub type Result<T> = std::result::Result<T, DbError>;

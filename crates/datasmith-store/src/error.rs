//! Preferences-store error types.

/// Errors that can occur while reading or writing the preferences store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "credential", "spec").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Failed to open or configure the store database.
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema initialization failed.
    #[error("schema init failed: {0}")]
    Schema(String),

    /// The caller handed the store something unusable.
    #[error("validation error: {0}")]
    Validation(String),

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Creates a [`StoreError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

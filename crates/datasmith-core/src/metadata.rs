//! Introspected schema metadata -- the contract a live table exposes.
//!
//! Metadata is read from the target database on demand and never cached
//! across sessions. Foreign keys are references by name, not owning edges,
//! so the metadata for a set of tables is always a tree.

use serde::{Deserialize, Serialize};

/// The `(table, column)` pair a foreign-key column points at.
///
/// An empty ref (both fields blank) means the column has no foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

impl ForeignKeyRef {
    /// Builds a ref pointing at `table.column`.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Returns `true` if this column has no foreign key.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && self.column.is_empty()
    }
}

/// Everything the schema inspector records about one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,

    /// Dialect-native textual form of the SQL type, e.g. `VARCHAR(40)`.
    #[serde(rename = "type")]
    pub sql_type: String,

    pub primary_key: bool,

    pub nullable: bool,

    /// Single-column uniqueness, including membership in a single-column
    /// primary key.
    pub unique: bool,

    /// Sorted sibling column names of a composite unique constraint this
    /// column belongs to, or `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_unique: Option<Vec<String>>,

    /// Stringified column default, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    pub autoincrement: bool,

    /// Generated/computed column flag.
    pub computed: bool,

    /// FK destination; empty when the column has no foreign key.
    #[serde(default, skip_serializing_if = "ForeignKeyRef::is_empty")]
    pub foreign_keys: ForeignKeyRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl ColumnMetadata {
    /// A minimal metadata record for a plain nullable text column.
    ///
    /// Convenience for tests and for synthesizing metadata defaults.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: "TEXT".into(),
            primary_key: false,
            nullable: true,
            unique: false,
            multi_unique: None,
            default: None,
            autoincrement: false,
            computed: false,
            foreign_keys: ForeignKeyRef::default(),
            length: None,
            precision: None,
            scale: None,
        }
    }
}

/// Error returned when a column lookup on [`TableMetadata`] misses.
#[derive(Debug, thiserror::Error)]
#[error("column '{column}' not found in table '{table}'")]
pub struct UnknownColumn {
    pub table: String,
    pub column: String,
}

/// The introspected shape of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,

    /// Distinct names of the tables this table references via foreign keys.
    pub parents: Vec<String>,

    /// Columns in database order.
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    /// Looks up a column by name, failing loudly if it is absent.
    pub fn column(&self, name: &str) -> Result<&ColumnMetadata, UnknownColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_ref_emptiness() {
        assert!(ForeignKeyRef::default().is_empty());
        assert!(!ForeignKeyRef::new("teachers", "teacher_id").is_empty());
    }

    #[test]
    fn column_lookup_fails_loudly() {
        let table = TableMetadata {
            name: "students".into(),
            parents: vec![],
            columns: vec![ColumnMetadata::text("full_name")],
        };

        assert_eq!(table.column("full_name").unwrap().name, "full_name");
        let err = table.column("nope").unwrap_err();
        assert_eq!(err.to_string(), "column 'nope' not found in table 'students'");
    }

    #[test]
    fn metadata_serde_uses_wire_names() {
        let mut col = ColumnMetadata::text("salary");
        col.sql_type = "DECIMAL(10,2)".into();
        col.precision = Some(10);
        col.scale = Some(2);

        let json = serde_json::to_string(&col).unwrap();
        assert!(json.contains(r#""type":"DECIMAL(10,2)""#));
        // Empty FK refs and absent params stay off the wire.
        assert!(!json.contains("foreign_keys"));
        assert!(!json.contains("length"));

        let back: ColumnMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);
    }
}

//! Generated result packets and their diagnostics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a per-column diagnostic attached to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Warning,
    Error,
}

/// A per-column diagnostic produced during validation or generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPacket {
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ErrorPacket {
    pub fn error(column: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Error,
            column: Some(column.into()),
            msg: Some(msg.into()),
        }
    }

    pub fn warning(column: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Warning,
            column: Some(column.into()),
            msg: Some(msg.into()),
        }
    }
}

/// An in-memory row batch with pagination state and attached diagnostics.
///
/// Rows are row-major: each entry is a list of nullable strings parallel to
/// `columns`. `total_entries` always equals `entries.len()`, and the pages
/// of one packet id concatenate back to the originally generated sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePacket {
    /// Stable id assigned at creation; shared by every page of this batch.
    pub id: String,

    pub name: String,

    pub columns: Vec<String>,

    pub entries: Vec<Vec<Option<String>>>,

    #[serde(default)]
    pub errors: Vec<ErrorPacket>,

    pub page: usize,

    pub page_size: usize,

    pub total_pages: usize,

    pub total_entries: usize,
}

impl TablePacket {
    /// Wraps a freshly generated batch as its own single page.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        entries: Vec<Vec<Option<String>>>,
        errors: Vec<ErrorPacket>,
        page_size: usize,
    ) -> Self {
        let total_entries = entries.len();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            columns,
            entries,
            errors,
            page: 0,
            page_size: page_size.max(1),
            total_pages: 1,
            total_entries,
        }
    }
}

//! User-supplied generation specs -- what to generate for each column.

use serde::{Deserialize, Serialize};

/// The closed set of generator kinds a column spec can request.
///
/// `Script` is the embedded-expression generator; the wire format also
/// accepts the legacy name `python` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Faker,
    Regex,
    Foreign,
    #[serde(alias = "python")]
    Script,
    Autoincrement,
    Computed,
    Null,
    Constant,
}

impl GeneratorKind {
    /// Returns the wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faker => "faker",
            Self::Regex => "regex",
            Self::Foreign => "foreign",
            Self::Script => "script",
            Self::Autoincrement => "autoincrement",
            Self::Computed => "computed",
            Self::Null => "null",
            Self::Constant => "constant",
        }
    }

    /// Parses the wire string, accepting the legacy `python` alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "faker" => Some(Self::Faker),
            "regex" => Some(Self::Regex),
            "foreign" => Some(Self::Foreign),
            "script" | "python" => Some(Self::Script),
            "autoincrement" => Some(Self::Autoincrement),
            "computed" => Some(Self::Computed),
            "null" => Some(Self::Null),
            "constant" => Some(Self::Constant),
            _ => None,
        }
    }

    /// Passive kinds produce NULL for every row and are never validated or
    /// part of the ordered generator run (the database materializes their
    /// values).
    pub fn is_passive(&self) -> bool {
        matches!(self, Self::Autoincrement | Self::Computed | Self::Null)
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User intent for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    /// Free-form generator text; interpretation depends on `kind` (a faker
    /// method name, a regex pattern, a script expression, a constant, ...).
    #[serde(default)]
    pub generator: String,

    #[serde(rename = "type")]
    pub kind: GeneratorKind,

    /// Ordering hint for `script` columns; lower runs earlier within the
    /// script group. Ignored for other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: GeneratorKind, generator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generator: generator.into(),
            kind,
            order: None,
        }
    }
}

fn default_page_size() -> usize {
    100
}

/// A full generation request for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Session-assigned id of the saved credential this spec belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<i64>,

    pub name: String,

    pub no_of_entries: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    pub columns: Vec<ColumnSpec>,
}

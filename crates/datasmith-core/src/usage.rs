//! The usage ledger -- rows inserted per table since the last commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending-insert bookkeeping for one `(db_id, table_name)` pair.
///
/// The ledger is reset on commit, rollback and disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStat {
    pub db_id: i64,
    pub table_name: String,
    pub new_rows: u64,
    pub last_accessed: DateTime<Utc>,
}

//! Per-database SQL statement logs.
//!
//! Every statement a driver executes is appended to
//! `<data_dir>/logs/<db_name>.sql.log`; the protocol exposes the tail of
//! that file and a clear operation. Logging is best-effort: a failed write
//! never fails the query that triggered it.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::Local;
use tracing::debug;

/// Append-only log of the SQL statements executed against one database.
#[derive(Debug, Clone)]
pub struct SqlLog {
    path: PathBuf,
}

impl SqlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends one statement with a timestamp. Newlines are collapsed so
    /// every statement stays on a single log line.
    pub fn record(&self, sql: &str) {
        let line = format!(
            "{} [INFO] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            sql.split_whitespace().collect::<Vec<_>>().join(" "),
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = result {
            debug!(path = ?self.path, "sql log write failed: {e}");
        }
    }

    /// Returns up to the last `lines` log lines, trimmed. A missing log file
    /// reads as empty.
    pub fn read(&self, lines: usize) -> std::io::Result<Vec<String>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let all: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<_>>()?;
        let start = all.len().saturating_sub(lines);
        Ok(all[start..]
            .iter()
            .map(|line| line.trim().to_string())
            .collect())
    }

    /// Truncates the log file. Clearing a log that never existed is fine.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::write(&self.path, b"") {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_read_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let log = SqlLog::new(tmp.path().join("school.sql.log"));

        assert!(log.read(10).unwrap().is_empty());

        log.record("SELECT 1");
        log.record("INSERT INTO t\n  VALUES (1)");

        let lines = log.read(10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("SELECT 1"));
        // Newlines are collapsed.
        assert!(lines[1].ends_with("INSERT INTO t VALUES (1)"));

        let tail = log.read(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert!(tail[0].contains("INSERT"));

        log.clear().unwrap();
        assert!(log.read(10).unwrap().is_empty());
    }
}

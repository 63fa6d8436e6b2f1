//! Ad-hoc SQL execution on a polled worker with a hard timeout.
//!
//! The worker opens a fresh connection so a runaway statement cannot hold
//! the session connection hostage. The parent polls in 100 ms steps up to
//! the 10 s budget; on timeout the worker is abandoned and a timeout line
//! is returned. Output mimics a terminal SQL monitor: a grid for row sets,
//! an affected-count line otherwise, `ERROR 8008 (4200): ...` on failure.

use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::Duration;

use datasmith_core::creds::DbCreds;
use datasmith_db::driver::QueryOutput;

/// Hard wall-clock budget for one statement.
const SQL_TIMEOUT_MS: u64 = 10_000;

/// Poll interval while waiting on the worker.
const POLL_INTERVAL_MS: u64 = 100;

/// Runs one statement against a fresh connection, returning display lines.
pub fn run_query(creds: DbCreds, sql: String) -> Vec<String> {
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        let _ = tx.send(execute(&creds, &sql));
    });

    for _ in 0..(SQL_TIMEOUT_MS / POLL_INTERVAL_MS) {
        match rx.recv_timeout(Duration::from_millis(POLL_INTERVAL_MS)) {
            Ok(lines) => return lines,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return vec!["ERROR 8008 (4200): worker terminated unexpectedly".to_string()];
            }
        }
    }
    vec![format!(
        "ERROR 8008 (4200): query timed out after {}s",
        SQL_TIMEOUT_MS / 1000
    )]
}

fn execute(creds: &DbCreds, sql: &str) -> Vec<String> {
    let result = datasmith_db::connect(creds, None).and_then(|mut driver| driver.query(sql));
    match result {
        Ok(output) => render(&output),
        Err(e) => vec![format!("ERROR 8008 (4200): {e}")],
    }
}

fn render(output: &QueryOutput) -> Vec<String> {
    if !output.returns_rows {
        return vec![format!("Query OK, {} row(s) affected", output.affected)];
    }
    let mut lines = render_grid(&output.columns, &output.rows);
    lines.push(format!("{} row(s) in set", output.rows.len()));
    lines
}

/// Grid rendering: `+----+` borders, one padded cell per column, NULL for
/// missing values.
fn render_grid(columns: &[String], rows: &[Vec<Option<String>>]) -> Vec<String> {
    const NULL: &str = "NULL";

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.as_deref().unwrap_or(NULL).chars().count();
            if i < widths.len() && len > widths[i] {
                widths[i] = len;
            }
        }
    }

    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };
    let format_row = |cells: Vec<&str>| {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            line.push_str(&format!(" {cell:<width$} |", width = width));
        }
        line
    };

    let mut lines = vec![border.clone()];
    lines.push(format_row(columns.iter().map(|c| c.as_str()).collect()));
    lines.push(border.clone());
    for row in rows {
        lines.push(format_row(
            row.iter().map(|c| c.as_deref().unwrap_or(NULL)).collect(),
        ));
    }
    lines.push(border);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::creds::Dialect;
    use pretty_assertions::assert_eq;

    #[test]
    fn grid_shape() {
        let columns = vec!["name".to_string(), "dept".to_string()];
        let rows = vec![
            vec![Some("Ada Lovelace".to_string()), Some("CS".to_string())],
            vec![Some("Grace".to_string()), None],
        ];
        let lines = render_grid(&columns, &rows);
        assert_eq!(lines[0], "+--------------+------+");
        assert_eq!(lines[1], "| name         | dept |");
        assert_eq!(lines[3], "| Ada Lovelace | CS   |");
        assert_eq!(lines[4], "| Grace        | NULL |");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn affected_line_for_writes() {
        let output = QueryOutput {
            affected: 3,
            ..Default::default()
        };
        assert_eq!(render(&output), vec!["Query OK, 3 row(s) affected"]);
    }

    #[test]
    fn error_line_for_bad_database() {
        let creds = DbCreds {
            id: None,
            name: "/nonexistent/path/to/db.sqlite".into(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dialect: Dialect::Sqlite,
        };
        let lines = run_query(creds, "SELECT 1".into());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERROR 8008 (4200):"));
    }

    #[test]
    fn select_against_sqlite_fixture() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("q.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);")
            .unwrap();
        let creds = DbCreds {
            id: None,
            name: path.to_string_lossy().into_owned(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dialect: Dialect::Sqlite,
        };
        let lines = run_query(creds, "SELECT x FROM t ORDER BY x".into());
        assert_eq!(lines.last().unwrap(), "2 row(s) in set");
        assert!(lines.iter().any(|l| l.contains("| 1")));
    }
}

//! SQLite driver -- pragma-based introspection over rusqlite.

use rusqlite::Connection;
use tracing::info;

use datasmith_core::creds::DbCreds;

use crate::driver::{Driver, MAX_RESULT_ROWS, QueryOutput, RawColumn, RawForeignKey};
use crate::error::{DbError, Result};
use crate::inspect::parse_type_params;
use crate::logging::SqlLog;

/// Driver for the `sqlite` dialect. The credential's `name` is the database
/// file path; host, port and user are ignored.
pub struct SqliteDriver {
    conn: Connection,
    log: Option<SqlLog>,
    in_tx: bool,
}

impl SqliteDriver {
    pub fn connect(creds: &DbCreds, log: Option<SqlLog>) -> Result<Self> {
        if creds.name.is_empty() {
            return Err(DbError::Connection("sqlite database path is empty".into()));
        }
        info!(path = %creds.name, "connecting to sqlite database");
        let conn = Connection::open(&creds.name)
            .map_err(|e| DbError::Connection(format!("failed to open {}: {e}", creds.name)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            log,
            in_tx: false,
        })
    }

    fn record(&self, sql: &str) {
        if let Some(log) = &self.log {
            log.record(sql);
        }
    }
}

/// Double-quote an identifier for SQLite.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_ref_to_string(value: rusqlite::types::ValueRef<'_>) -> Option<String> {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(b.iter().map(|x| format!("{x:02x}")).collect()),
    }
}

impl Driver for SqliteDriver {
    fn ping(&mut self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn table_names(&mut self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.record(&sql);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn columns(&mut self, table: &str) -> Result<Vec<RawColumn>> {
        // cid, name, type, notnull, dflt_value, pk, hidden
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_xinfo({})", quote_ident(table)))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    value_ref_to_string(row.get_ref(4)?),
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let pk_count = raw.iter().filter(|(_, _, _, _, pk, _)| *pk > 0).count();

        let columns = raw
            .into_iter()
            .map(|(name, sql_type, notnull, default, pk, hidden)| {
                let (length, precision, scale) = parse_type_params(&sql_type);
                // A lone INTEGER PRIMARY KEY is a rowid alias: the database
                // assigns the value, which is what autoincrement means here.
                let autoincrement =
                    pk > 0 && pk_count == 1 && sql_type.trim().eq_ignore_ascii_case("integer");
                RawColumn {
                    name,
                    sql_type,
                    nullable: notnull == 0 && pk == 0,
                    default,
                    autoincrement,
                    computed: hidden == 2 || hidden == 3,
                    length,
                    precision,
                    scale,
                }
            })
            .collect();
        Ok(columns)
    }

    fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let mut cols = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        cols.retain(|(_, pk)| *pk > 0);
        cols.sort_by_key(|(_, pk)| *pk);
        Ok(cols.into_iter().map(|(name, _)| name).collect())
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>> {
        // id, seq, table, from, to, ...
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut fks = Vec::with_capacity(raw.len());
        for (ref_table, column, ref_column) in raw {
            let ref_column = match ref_column {
                Some(name) => name,
                // An implicit reference targets the parent's primary key.
                None => self
                    .primary_key(&ref_table)?
                    .into_iter()
                    .next()
                    .unwrap_or_default(),
            };
            fks.push(RawForeignKey {
                column,
                ref_table,
                ref_column,
            });
        }
        Ok(fks)
    }

    fn unique_groups(&mut self, table: &str) -> Result<Vec<Vec<String>>> {
        // seq, name, unique, origin, partial
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_list({})", quote_ident(table)))?;
        let indexes = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut groups = Vec::new();
        for (index_name, unique, origin) in indexes {
            if unique == 0 || origin == "pk" {
                continue;
            }
            let mut stmt = self
                .conn
                .prepare(&format!("PRAGMA index_info({})", quote_ident(&index_name)))?;
            let cols = stmt
                .query_map([], |row| row.get::<_, Option<String>>(2))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let group: Vec<String> = cols.into_iter().flatten().collect();
            if !group.is_empty() {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    fn existing_values(&mut self, table: &str, column: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL",
            col = quote_ident(column),
            table = quote_ident(table),
        );
        self.record(&sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(value) = value_ref_to_string(row.get_ref(0)?) {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.record("BEGIN");
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.record("COMMIT");
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.record("ROLLBACK");
            self.conn.execute_batch("ROLLBACK")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64> {
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            column_list,
            placeholders,
        );
        self.record(&sql);

        let mut stmt = self.conn.prepare(&sql)?;
        for row in rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
        }
        Ok(rows.len() as u64)
    }

    fn query(&mut self, sql: &str) -> Result<QueryOutput> {
        self.record(sql);
        let mut stmt = self.conn.prepare(sql)?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            return Ok(QueryOutput {
                affected: affected as u64,
                ..Default::default()
            });
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let ncols = columns.len();
        let mut out_rows = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if out_rows.len() >= MAX_RESULT_ROWS {
                break;
            }
            let mut out = Vec::with_capacity(ncols);
            for i in 0..ncols {
                out.push(value_ref_to_string(row.get_ref(i)?));
            }
            out_rows.push(out);
        }
        Ok(QueryOutput {
            columns,
            rows: out_rows,
            affected: 0,
            returns_rows: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::creds::Dialect;

    fn creds_for(path: &std::path::Path) -> DbCreds {
        DbCreds {
            id: None,
            name: path.to_string_lossy().into_owned(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dialect: Dialect::Sqlite,
        }
    }

    fn school_db() -> (tempfile::TempDir, SqliteDriver) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("school.db");
        let setup = Connection::open(&path).unwrap();
        setup
            .execute_batch(
                r#"
                CREATE TABLE teachers (
                    teacher_id INTEGER PRIMARY KEY,
                    full_name  TEXT NOT NULL,
                    email      VARCHAR(60) UNIQUE,
                    salary     DECIMAL(10,2)
                );
                CREATE TABLE classes (
                    class_id   INTEGER PRIMARY KEY,
                    teacher_id INTEGER REFERENCES teachers(teacher_id),
                    room       TEXT,
                    period     INTEGER,
                    UNIQUE(room, period)
                );
                INSERT INTO teachers (teacher_id, full_name, email) VALUES
                    (1, 'Ada Lovelace', 'ada@school.edu'),
                    (2, 'Grace Hopper', 'grace@school.edu'),
                    (3, 'Alan Turing', NULL);
                "#,
            )
            .unwrap();
        drop(setup);

        let driver = SqliteDriver::connect(&creds_for(&path), None).unwrap();
        (tmp, driver)
    }

    #[test]
    fn introspects_columns_and_flags() {
        let (_tmp, mut driver) = school_db();
        let columns = driver.columns("teachers").unwrap();
        assert_eq!(columns.len(), 4);

        let id = &columns[0];
        assert!(id.autoincrement);
        assert!(!id.nullable);

        let email = &columns[2];
        assert_eq!(email.length, Some(60));
        assert!(email.nullable);

        let salary = &columns[3];
        assert_eq!(salary.precision, Some(10));
        assert_eq!(salary.scale, Some(2));
    }

    #[test]
    fn introspects_keys_and_uniques() {
        let (_tmp, mut driver) = school_db();
        assert_eq!(driver.primary_key("teachers").unwrap(), vec!["teacher_id"]);

        let fks = driver.foreign_keys("classes").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].column, "teacher_id");
        assert_eq!(fks[0].ref_table, "teachers");
        assert_eq!(fks[0].ref_column, "teacher_id");

        let groups = driver.unique_groups("classes").unwrap();
        assert_eq!(groups.len(), 1);
        let mut group = groups[0].clone();
        group.sort();
        assert_eq!(group, vec!["period", "room"]);
    }

    #[test]
    fn existing_values_skip_null() {
        let (_tmp, mut driver) = school_db();
        let mut values = driver.existing_values("teachers", "email").unwrap();
        values.sort();
        assert_eq!(values, vec!["ada@school.edu", "grace@school.edu"]);
        assert_eq!(driver.count_rows("teachers").unwrap(), 3);
    }

    #[test]
    fn insert_inside_transaction_rolls_back() {
        let (_tmp, mut driver) = school_db();
        driver.begin().unwrap();
        driver
            .insert_rows(
                "teachers",
                &["full_name".into(), "email".into()],
                &[
                    vec![Some("Edsger Dijkstra".into()), None],
                    vec![Some("Barbara Liskov".into()), Some("bl@school.edu".into())],
                ],
            )
            .unwrap();
        assert_eq!(driver.count_rows("teachers").unwrap(), 5);

        driver.rollback().unwrap();
        assert_eq!(driver.count_rows("teachers").unwrap(), 3);
    }

    #[test]
    fn query_returns_rows_and_affected_counts() {
        let (_tmp, mut driver) = school_db();

        let select = driver.query("SELECT full_name FROM teachers ORDER BY teacher_id").unwrap();
        assert!(select.returns_rows);
        assert_eq!(select.columns, vec!["full_name"]);
        assert_eq!(select.rows.len(), 3);
        assert_eq!(select.rows[0][0].as_deref(), Some("Ada Lovelace"));

        let update = driver
            .query("UPDATE teachers SET salary = 1000 WHERE teacher_id = 1")
            .unwrap();
        assert!(!update.returns_rows);
        assert_eq!(update.affected, 1);
    }

    #[test]
    fn statements_are_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logged.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER)")
            .unwrap();

        let log = SqlLog::new(tmp.path().join("logged.sql.log"));
        let mut driver = SqliteDriver::connect(&creds_for(&path), Some(log.clone())).unwrap();
        driver.count_rows("t").unwrap();

        let lines = log.read(10).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("SELECT COUNT(*)"));
    }
}

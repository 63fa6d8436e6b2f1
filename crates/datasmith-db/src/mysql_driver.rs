//! MySQL driver -- `information_schema` introspection over the mysql crate.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Params, Row, Value};
use tracing::info;

use datasmith_core::creds::DbCreds;

use crate::driver::{Driver, MAX_RESULT_ROWS, QueryOutput, RawColumn, RawForeignKey};
use crate::error::{DbError, Result};
use crate::inspect::parse_type_params;
use crate::logging::SqlLog;

/// Driver for the `mysql` dialect.
pub struct MySqlDriver {
    conn: Conn,
    log: Option<SqlLog>,
    in_tx: bool,
}

impl MySqlDriver {
    pub fn connect(creds: &DbCreds, log: Option<SqlLog>) -> Result<Self> {
        let url = creds.url()?;
        info!(host = %creds.host, db = %creds.name, "connecting to mysql database");
        let opts = Opts::from_url(&url).map_err(mysql::Error::from)?;
        let conn = Conn::new(opts)
            .map_err(|e| DbError::Connection(format!("failed to connect: {e}")))?;
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

/// Backtick-quote an identifier for MySQL.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn mysql_value_to_string(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        temporal @ (Value::Date(..) | Value::Time(..)) => {
            Some(temporal.as_sql(true).trim_matches('\'').to_string())
        }
    }
}

/// Statements whose result is a row set even when it happens to be empty.
fn statement_returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_lowercase();
    ["select", "show", "describe", "desc", "explain", "with"]
        .iter()
        .any(|verb| head.starts_with(verb))
}

impl Driver for MySqlDriver {
    fn ping(&mut self) -> Result<()> {
        self.conn.query_drop("SELECT 1")?;
        Ok(())
    }

    fn table_names(&mut self) -> Result<Vec<String>> {
        let names: Vec<String> = self.conn.exec(
            "SELECT table_name FROM information_schema.tables
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'
             ORDER BY table_name",
            (),
        )?;
        Ok(names)
    }

    fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.record(&sql);
        let count: Option<u64> = self.conn.query_first(&sql)?;
        Ok(count.unwrap_or(0))
    }

    fn columns(&mut self, table: &str) -> Result<Vec<RawColumn>> {
        let raw: Vec<(
            String,
            String,
            String,
            Option<String>,
            String,
            Option<u64>,
            Option<u64>,
            Option<u64>,
        )> = self.conn.exec(
            "SELECT column_name, column_type, is_nullable, column_default, extra,
                    character_maximum_length, numeric_precision, numeric_scale
             FROM information_schema.columns
             WHERE table_schema = DATABASE() AND table_name = ?
             ORDER BY ordinal_position",
            (table,),
        )?;

        let columns = raw
            .into_iter()
            .map(
                |(name, sql_type, is_nullable, default, extra, char_len, num_prec, num_scale)| {
                    let extra_lower = extra.to_lowercase();
                    let (fallback_len, fallback_prec, fallback_scale) =
                        parse_type_params(&sql_type);
                    RawColumn {
                        name,
                        sql_type,
                        nullable: is_nullable.eq_ignore_ascii_case("YES"),
                        default,
                        autoincrement: extra_lower.contains("auto_increment"),
                        computed: extra_lower.contains("generated"),
                        length: char_len.map(|v| v as u32).or(fallback_len),
                        precision: num_prec.map(|v| v as u32).or(fallback_prec),
                        scale: num_scale.map(|v| v as u32).or(fallback_scale),
                    }
                },
            )
            .collect();
        Ok(columns)
    }

    fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let names: Vec<String> = self.conn.exec(
            "SELECT column_name FROM information_schema.key_column_usage
             WHERE table_schema = DATABASE() AND table_name = ?
               AND constraint_name = 'PRIMARY'
             ORDER BY ordinal_position",
            (table,),
        )?;
        Ok(names)
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>> {
        let raw: Vec<(String, String, String)> = self.conn.exec(
            "SELECT column_name, referenced_table_name, referenced_column_name
             FROM information_schema.key_column_usage
             WHERE table_schema = DATABASE() AND table_name = ?
               AND referenced_table_name IS NOT NULL
             ORDER BY constraint_name, ordinal_position",
            (table,),
        )?;
        Ok(raw
            .into_iter()
            .map(|(column, ref_table, ref_column)| RawForeignKey {
                column,
                ref_table,
                ref_column,
            })
            .collect())
    }

    fn unique_groups(&mut self, table: &str) -> Result<Vec<Vec<String>>> {
        let raw: Vec<(String, String)> = self.conn.exec(
            "SELECT index_name, column_name FROM information_schema.statistics
             WHERE table_schema = DATABASE() AND table_name = ?
               AND non_unique = 0 AND index_name <> 'PRIMARY'
             ORDER BY index_name, seq_in_index",
            (table,),
        )?;

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current_index: Option<String> = None;
        for (index_name, column) in raw {
            if current_index.as_deref() != Some(&index_name) {
                groups.push(Vec::new());
                current_index = Some(index_name);
            }
            if let Some(group) = groups.last_mut() {
                group.push(column);
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
        let rows: Vec<Row> = self.conn.query(&sql)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.unwrap()
                    .into_iter()
                    .next()
                    .and_then(mysql_value_to_string)
            })
            .collect())
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.record("START TRANSACTION");
            self.conn.query_drop("START TRANSACTION")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.record("COMMIT");
            self.conn.query_drop("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.record("ROLLBACK");
            self.conn.query_drop("ROLLBACK")?;
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
        let placeholders = vec!["?"; columns.len()].join(", ");
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

        self.conn.exec_batch(
            &sql,
            rows.iter().map(|row| {
                Params::Positional(
                    row.iter()
                        .map(|value| match value {
                            Some(text) => Value::Bytes(text.clone().into_bytes()),
                            None => Value::NULL,
                        })
                        .collect(),
                )
            }),
        )?;
        Ok(rows.len() as u64)
    }

    fn query(&mut self, sql: &str) -> Result<QueryOutput> {
        self.record(sql);
        let rows: Vec<Row> = self.conn.query(sql)?;

        if rows.is_empty() {
            return Ok(QueryOutput {
                returns_rows: statement_returns_rows(sql),
                affected: self.conn.affected_rows(),
                ..Default::default()
            });
        }

        let columns: Vec<String> = rows[0]
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let out_rows = rows
            .into_iter()
            .take(MAX_RESULT_ROWS)
            .map(|row| {
                row.unwrap()
                    .into_iter()
                    .map(mysql_value_to_string)
                    .collect()
            })
            .collect();
        Ok(QueryOutput {
            columns,
            rows: out_rows,
            affected: 0,
            returns_rows: true,
        })
    }
}

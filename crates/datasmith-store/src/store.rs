//! [`PrefStore`] -- SQLite-backed preferences store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use datasmith_core::creds::{DbCreds, Dialect, decode_password, encode_password};
use datasmith_core::spec::{ColumnSpec, GeneratorKind, TableSpec};
use datasmith_core::usage::UsageStat;

use crate::error::{Result, StoreError};
use crate::schema;

/// A saved credential without its password, for listing over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredSummary {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub dialect: String,
}

/// SQLite-backed preferences store.
///
/// Wraps a [`rusqlite::Connection`] in a `Mutex`; every public method
/// acquires the lock, executes SQL, and releases it.
pub struct PrefStore {
    conn: Mutex<Connection>,
}

impl PrefStore {
    /// Opens (or creates) the store at the given path and initialises the
    /// schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(?path, "opening preferences store");

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Connection(format!("failed to open {}: {e}", path.display()))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_connection()?;
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory preferences store");
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(format!("failed to open in-memory db: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_connection()?;
        store.init_schema()?;
        Ok(store)
    }

    /// Sets connection pragmas (foreign keys, busy timeout).
    fn configure_connection(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StoreError::Connection(format!("failed to set pragmas: {e}")))?;
        Ok(())
    }

    /// Creates all tables if they do not exist.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let version: Option<i32> = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                let v: String = row.get(0)?;
                Ok(v.parse::<i32>().unwrap_or(0))
            })
            .optional()
            .unwrap_or(None);
        if let Some(v) = version {
            if v >= schema::CURRENT_SCHEMA_VERSION {
                debug!(version = v, "schema already current, skipping init");
                return Ok(());
            }
        }

        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)
                .map_err(|e| StoreError::Schema(e.to_string()))?;
        }
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::CURRENT_SCHEMA_VERSION.to_string()],
        )
        .map_err(|e| StoreError::Schema(e.to_string()))?;

        info!("store schema initialized (version {})", schema::CURRENT_SCHEMA_VERSION);
        Ok(())
    }

    /// Acquires the connection lock.
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Connection(format!("mutex poisoned: {e}")))
    }

    // -- Credentials ---------------------------------------------------------

    /// Saves a credential, returning its row id.
    ///
    /// If a credential with the same `(name, host, port, user, dialect)`
    /// already exists its id is returned and the stored password is left
    /// untouched.
    pub fn save_cred(&self, creds: &DbCreds) -> Result<i64> {
        if let Some(existing) = self.find_cred(
            &creds.name,
            &creds.host,
            &creds.port,
            &creds.user,
            creds.dialect,
        )? {
            return Ok(existing.id.unwrap_or_default());
        }

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO db_creds (name, host, port, user, password, dialect)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                creds.name,
                creds.host,
                creds.port,
                creds.user,
                encode_password(&creds.password),
                creds.dialect.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Looks a credential up by its identifying tuple.
    pub fn find_cred(
        &self,
        name: &str,
        host: &str,
        port: &str,
        user: &str,
        dialect: Dialect,
    ) -> Result<Option<DbCreds>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, host, port, user, password, dialect
             FROM db_creds
             WHERE name = ?1 AND host = ?2 AND port = ?3 AND user = ?4 AND dialect = ?5",
            params![name, host, port, user, dialect.as_str()],
            row_to_creds,
        )
        .optional()
        .map_err(StoreError::Query)
    }

    /// Loads a credential by row id.
    pub fn load_cred(&self, id: i64) -> Result<DbCreds> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, host, port, user, password, dialect
             FROM db_creds WHERE id = ?1",
            params![id],
            row_to_creds,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("credential", id.to_string()))
    }

    /// Lists saved credentials without their passwords.
    pub fn list_creds(&self) -> Result<Vec<CredSummary>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, host, port, user, dialect FROM db_creds ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CredSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                host: row.get(2)?,
                port: row.get(3)?,
                user: row.get(4)?,
                dialect: row.get(5)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Query)
    }

    /// Removes a saved credential. Returns `true` if one was deleted.
    pub fn delete_cred(
        &self,
        name: &str,
        host: &str,
        port: &str,
        user: &str,
        dialect: Dialect,
    ) -> Result<bool> {
        let conn = self.lock_conn()?;
        let n = conn.execute(
            "DELETE FROM db_creds
             WHERE name = ?1 AND host = ?2 AND port = ?3 AND user = ?4 AND dialect = ?5",
            params![name, host, port, user, dialect.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Records the credential used by the most recent successful connect.
    pub fn set_last_connected(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO prefs (key, value) VALUES (?1, ?2)",
            params![schema::PREF_LAST_CONNECTED, id.to_string()],
        )?;
        Ok(())
    }

    /// Id of the most recently connected credential, if any.
    pub fn last_connected(&self) -> Result<Option<i64>> {
        let conn = self.lock_conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM prefs WHERE key = ?1",
                params![schema::PREF_LAST_CONNECTED],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    // -- Generation specs ----------------------------------------------------

    /// Saves a table spec verbatim, replacing any previous spec for the same
    /// `(db_id, table_name)`.
    pub fn save_spec(&self, spec: &TableSpec) -> Result<()> {
        let db_id = spec
            .db_id
            .ok_or_else(|| StoreError::Validation("spec has no database id".into()))?;

        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Connection(format!("failed to begin: {e}")))?;

        tx.execute(
            "DELETE FROM table_specs WHERE db_id = ?1 AND name = ?2",
            params![db_id, spec.name],
        )?;
        tx.execute(
            "INSERT INTO table_specs (db_id, name, no_of_entries) VALUES (?1, ?2, ?3)",
            params![db_id, spec.name, spec.no_of_entries as i64],
        )?;
        let table_id = tx.last_insert_rowid();

        for column in &spec.columns {
            tx.execute(
                "INSERT INTO column_specs (table_id, name, generator, type, ord)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    table_id,
                    column.name,
                    column.generator,
                    column.kind.as_str(),
                    column.order,
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| StoreError::Connection(format!("failed to commit: {e}")))?;
        debug!(table = %spec.name, db_id, "saved generation spec");
        Ok(())
    }

    /// Loads the saved spec for `(db_id, table_name)`.
    pub fn load_spec(&self, db_id: i64, table_name: &str) -> Result<TableSpec> {
        let conn = self.lock_conn()?;
        let (table_id, no_of_entries): (i64, i64) = conn
            .query_row(
                "SELECT id, no_of_entries FROM table_specs WHERE db_id = ?1 AND name = ?2",
                params![db_id, table_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("spec", table_name))?;

        let mut stmt = conn.prepare(
            "SELECT name, generator, type, ord FROM column_specs
             WHERE table_id = ?1 ORDER BY id",
        )?;
        let columns = stmt
            .query_map(params![table_id], |row| {
                let kind: String = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    kind,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let columns = columns
            .into_iter()
            .map(|(name, generator, kind, order)| {
                let kind = GeneratorKind::parse(&kind).ok_or_else(|| {
                    StoreError::Validation(format!("unknown generator kind '{kind}'"))
                })?;
                Ok(ColumnSpec {
                    name,
                    generator,
                    kind,
                    order,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableSpec {
            db_id: Some(db_id),
            name: table_name.to_string(),
            no_of_entries: no_of_entries as usize,
            page_size: 100,
            columns,
        })
    }

    // -- Usage ledger --------------------------------------------------------

    /// Adds `new_rows` pending inserts for `(db_id, table_name)`.
    pub fn record_usage(&self, db_id: i64, table_name: &str, new_rows: u64) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO usage_stats (db_id, table_name, new_rows, last_accessed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(db_id, table_name) DO UPDATE SET
                 new_rows = new_rows + excluded.new_rows,
                 last_accessed = excluded.last_accessed",
            params![db_id, table_name, new_rows as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Current ledger entries for one database.
    pub fn usage_stats(&self, db_id: i64) -> Result<Vec<UsageStat>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT table_name, new_rows, last_accessed FROM usage_stats
             WHERE db_id = ?1 ORDER BY table_name",
        )?;
        let rows = stmt.query_map(params![db_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            let (table_name, new_rows, last_accessed) = row?;
            let last_accessed = DateTime::parse_from_rfc3339(&last_accessed)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            stats.push(UsageStat {
                db_id,
                table_name,
                new_rows: new_rows.max(0) as u64,
                last_accessed,
            });
        }
        Ok(stats)
    }

    /// Ledger view keyed by table name, for joining with row counts.
    pub fn usage_by_table(&self, db_id: i64) -> Result<HashMap<String, u64>> {
        Ok(self
            .usage_stats(db_id)?
            .into_iter()
            .map(|s| (s.table_name, s.new_rows))
            .collect())
    }

    /// Clears the ledger for one database, or for all when `db_id` is `None`.
    pub fn reset_usage(&self, db_id: Option<i64>) -> Result<()> {
        let conn = self.lock_conn()?;
        match db_id {
            Some(id) => {
                conn.execute("DELETE FROM usage_stats WHERE db_id = ?1", params![id])?;
            }
            None => {
                conn.execute("DELETE FROM usage_stats", [])?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PrefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefStore").finish_non_exhaustive()
    }
}

fn row_to_creds(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCreds> {
    let dialect: String = row.get(6)?;
    let password: String = row.get(5)?;
    Ok(DbCreds {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        user: row.get(4)?,
        password: decode_password(&password),
        // Unknown dialects cannot be inserted through this store; fall back
        // to sqlite rather than panicking on a hand-edited row.
        dialect: Dialect::parse(&dialect).unwrap_or(Dialect::Sqlite),
    })
}

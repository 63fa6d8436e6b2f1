//! The database session: one connection, its transaction, and bookkeeping.

use std::io::Write;

use chrono::Local;
use tracing::info;

use datasmith_config::DataDir;
use datasmith_core::creds::DbCreds;
use datasmith_core::packet::TablePacket;
use datasmith_db::{DbError, Driver, SqlLog, connect};

/// Owns the live connection to the target database plus the explicit
/// transaction and the uncommitted-write counter.
pub struct DbSession {
    data_dir: DataDir,
    creds: Option<DbCreds>,
    driver: Option<Box<dyn Driver>>,
    in_tx: bool,
    uncommitted: u32,
}

impl DbSession {
    pub fn new(data_dir: DataDir) -> Self {
        Self {
            data_dir,
            creds: None,
            driver: None,
            in_tx: false,
            uncommitted: 0,
        }
    }

    /// Connects (replacing any previous connection) and verifies the link
    /// with a ping.
    pub fn connect(&mut self, creds: DbCreds) -> Result<(), DbError> {
        self.disconnect();
        let log = SqlLog::new(self.data_dir.sql_log(&creds.name));
        let mut driver = connect(&creds, Some(log))?;
        driver.ping()?;
        info!(db = %creds.name, dialect = %creds.dialect, "connected");
        self.driver = Some(driver);
        self.creds = Some(creds);
        Ok(())
    }

    /// Tears the connection down, rolling back any open transaction and
    /// resetting the counter. Returns the db id that was connected, so the
    /// caller can reset its usage ledger.
    pub fn disconnect(&mut self) -> Option<i64> {
        let db_id = self.db_id();
        if self.in_tx {
            if let Some(driver) = self.driver.as_mut() {
                let _ = driver.rollback();
            }
        }
        self.driver = None;
        self.creds = None;
        self.in_tx = false;
        self.uncommitted = 0;
        db_id
    }

    /// Connected means the session carries an assigned database id.
    pub fn is_connected(&self) -> bool {
        self.db_id().is_some() && self.driver.is_some()
    }

    pub fn db_id(&self) -> Option<i64> {
        self.creds.as_ref().and_then(|c| c.id)
    }

    /// Stamps the session credentials with their store id.
    pub fn set_db_id(&mut self, id: i64) {
        if let Some(creds) = self.creds.as_mut() {
            creds.id = Some(id);
        }
    }

    pub fn creds(&self) -> Option<&DbCreds> {
        self.creds.as_ref()
    }

    pub fn driver(&mut self) -> Result<&mut (dyn Driver + '_), DbError> {
        match self.driver.as_deref_mut() {
            Some(driver) => Ok(driver),
            None => Err(DbError::Connection("not connected to a database".into())),
        }
    }

    /// Session fields for `get_db_info`.
    pub fn info(&self) -> serde_json::Value {
        match &self.creds {
            Some(creds) => serde_json::json!({
                "id": creds.id,
                "name": creds.name,
                "host": creds.host,
                "port": creds.port,
                "user": creds.user,
                "dialect": creds.dialect,
                "connected": self.is_connected(),
                "pending_writes": self.uncommitted,
            }),
            None => serde_json::json!({
                "id": null,
                "name": "",
                "host": "",
                "port": "",
                "user": "",
                "dialect": null,
                "connected": false,
                "pending_writes": 0,
            }),
        }
    }

    /// Opens the explicit transaction if none is active.
    pub fn ensure_transaction(&mut self) -> Result<(), DbError> {
        if !self.in_tx {
            self.driver()?.begin()?;
            self.in_tx = true;
            self.uncommitted = 0;
        }
        Ok(())
    }

    /// Commits pending writes and resets the counter.
    pub fn commit(&mut self) -> Result<(), DbError> {
        self.uncommitted = 0;
        if self.in_tx {
            if let Some(driver) = self.driver.as_mut() {
                driver.commit()?;
            }
            self.in_tx = false;
        }
        Ok(())
    }

    /// Discards pending writes and resets the counter.
    pub fn rollback(&mut self) -> Result<(), DbError> {
        self.uncommitted = 0;
        if self.in_tx {
            if let Some(driver) = self.driver.as_mut() {
                driver.rollback()?;
            }
            self.in_tx = false;
        }
        Ok(())
    }

    /// Inserts a cached packet inside the active transaction, bumping the
    /// uncommitted counter. Returns the number of rows written.
    pub fn insert_packet(&mut self, packet: &TablePacket) -> Result<u64, DbError> {
        if packet.columns.is_empty() || packet.entries.is_empty() {
            return Err(DbError::Unsupported(
                "packet has no columns and/or entries to insert".into(),
            ));
        }
        self.ensure_transaction()?;
        let written =
            self.driver()?
                .insert_rows(&packet.name, &packet.columns, &packet.entries)?;
        self.uncommitted += 1;
        Ok(written)
    }

    /// The SQL log of the currently connected database.
    pub fn sql_log(&self) -> Option<SqlLog> {
        self.creds
            .as_ref()
            .map(|c| SqlLog::new(self.data_dir.sql_log(&c.name)))
    }

    /// Static monitor banner plus the prompt tag.
    pub fn banner(&self) -> serde_json::Value {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let dialect = self
            .creds
            .as_ref()
            .map(|c| c.dialect.as_str())
            .unwrap_or("sql");
        let banner = vec![
            "Welcome to the DataSmith monitor.  Commands end with ; or \\g.".to_string(),
            format!("Session started on {now} via {}", std::env::consts::OS),
            "Connection id: 420".to_string(),
            format!(
                "Server version: {}-datasmith ({})",
                env!("CARGO_PKG_VERSION"),
                dialect.to_uppercase()
            ),
            String::new(),
            "Copyright (c) 2025, DataSmith Initiative.".to_string(),
            " All bugs reserved.".to_string(),
            String::new(),
            "Type 'help;' or '\\h' for help. Type 'clear;' to clear the screen.".to_string(),
            String::new(),
            "Rows are always limited to 250 to prevent freezing or memory issues in UI."
                .to_string(),
        ];
        serde_json::json!({ "log": banner, "prompt": dialect })
    }
}

/// Renders one value as a SQL literal for export scripts: the literal NULL
/// (any case) stays bare, everything else is single-quoted with embedded
/// quotes backslash-escaped.
fn sql_literal(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(text) if text.eq_ignore_ascii_case("null") => "NULL".to_string(),
        Some(text) => format!("'{}'", text.replace('\'', "\\'")),
    }
}

/// Writes a packet as a standalone SQL INSERT script.
pub fn export_packet(packet: &TablePacket, path: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;

    writeln!(file)?;
    writeln!(
        file,
        "-- Exported at {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    let columns = packet
        .columns
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let values = packet
        .entries
        .iter()
        .map(|row| {
            let items = row
                .iter()
                .map(|v| sql_literal(v.as_deref()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("  ({items})")
        })
        .collect::<Vec<_>>()
        .join(",\n");

    write!(
        file,
        "INSERT INTO `{}` (\n  {}\n) VALUES\n{};",
        packet.name, columns, values
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::packet::ErrorPacket;

    #[test]
    fn sql_literal_escaping() {
        assert_eq!(sql_literal(None), "NULL");
        assert_eq!(sql_literal(Some("NULL")), "NULL");
        assert_eq!(sql_literal(Some("null")), "NULL");
        assert_eq!(sql_literal(Some("plain")), "'plain'");
        assert_eq!(sql_literal(Some("it's")), "'it\\'s'");
    }

    #[test]
    fn export_writes_compound_insert() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.sql");
        let packet = TablePacket::new(
            "teachers",
            vec!["full_name".into(), "department".into()],
            vec![
                vec![Some("Ada".into()), Some("CS".into())],
                vec![Some("Grace".into()), None],
            ],
            Vec::<ErrorPacket>::new(),
            100,
        );
        export_packet(&packet, path.to_str().unwrap()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("-- Exported at "));
        assert!(text.contains("INSERT INTO `teachers` ("));
        assert!(text.contains("`full_name`, `department`"));
        assert!(text.contains("('Ada', 'CS'),"));
        assert!(text.contains("('Grace', NULL);"));
    }
}

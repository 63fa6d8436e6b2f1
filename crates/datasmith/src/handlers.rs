//! Command dispatch: the full protocol command set and its preconditions.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use anyhow::anyhow;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use datasmith_config::DataDir;
use datasmith_core::creds::{DbCreds, Dialect};
use datasmith_core::spec::TableSpec;
use datasmith_db::error::DbError;
use datasmith_db::inspect;
use datasmith_gen::{FakeProvider, Populator};
use datasmith_store::PrefStore;

use crate::jobs::{JobManager, JobPoll};
use crate::protocol::{Request, Response, normalize_keys};
use crate::session::{DbSession, export_packet};
use crate::sqlrun;

/// The command server: one database session, one populator, one store, and
/// at most one background generation job.
pub struct Server {
    session: DbSession,
    populator: Populator,
    store: PrefStore,
    jobs: JobManager,
}

impl Server {
    pub fn new(data_dir: DataDir) -> anyhow::Result<Self> {
        data_dir.ensure()?;
        let store = PrefStore::open(data_dir.config_db())?;
        Ok(Self {
            session: DbSession::new(data_dir),
            populator: Populator::new(),
            store,
            jobs: JobManager::new(),
        })
    }

    /// Request/response loop: one JSON line in, one JSON line out. Blank
    /// lines are skipped; `exit` (or end of input) ends the loop.
    pub fn listen(&mut self, input: impl BufRead, mut output: impl Write) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                let bye = Response::ok("exiting...");
                serde_json::to_writer(&mut output, &bye)?;
                output.write_all(b"\n")?;
                output.flush()?;
                break;
            }

            let response = match serde_json::from_str::<Request>(line) {
                Ok(request) => self.dispatch(request),
                Err(e) => Response::err_trace(e.to_string(), format!("{e:?}")),
            };
            serde_json::to_writer(&mut output, &response)?;
            output.write_all(b"\n")?;
            output.flush()?;
        }
        info!("listen loop ended");
        Ok(())
    }

    /// Routes one request, echoing its id on the response.
    pub fn dispatch(&mut self, request: Request) -> Response {
        let Request { id, kind, body } = request;
        let body = body.map(normalize_keys);

        let result = match kind.as_str() {
            "ping" => Ok(Response::ok("pong")),
            "get_db_info" => self.get_db_info(),
            "get_gen_methods" => Ok(Response::ok(FakeProvider::methods())),
            "get_db_last_connected" => self.get_db_last_connected(),
            "set_db_connect" => self.set_db_connect(&body),
            "set_db_reconnect" => self.set_db_reconnect(&body),
            "get_pref_connections" => self.get_pref_connections(),
            "set_pref_delete" => self.set_pref_delete(&body),
            "set_db_disconnect" => self.set_db_disconnect(),
            "get_db_tables" => self.get_db_tables(),
            "get_db_table" => self.get_db_table(&body),
            "get_gen_packets" => self.get_gen_packets(&body),
            "poll_gen_status" => self.poll_gen_status(),
            "get_gen_packet" => self.get_gen_packet(&body),
            "clear_gen_packets" => self.clear_gen_packets(),
            "get_pref_spec" => self.get_pref_spec(&body),
            "get_sql_banner" => Ok(Response::ok(self.session.banner())),
            "run_sql_query" => self.run_sql_query(&body),
            "get_logs_read" => self.get_logs_read(&body),
            "set_logs_clear" => self.set_logs_clear(),
            "set_db_insert" => self.set_db_insert(&body),
            "set_db_export" => self.set_db_export(&body),
            "set_db_commit" => self.set_db_commit(),
            "set_db_rollback" => self.set_db_rollback(),
            "get_pref_rows" => self.get_pref_rows(),
            other => Ok(Response::err(format!("Unknown command: {other}"))),
        };

        let mut response =
            result.unwrap_or_else(|e| Response::err_trace(e.to_string(), format!("{e:?}")));
        response.id = id;
        response
    }

    // -- Connection management ----------------------------------------------

    fn get_db_info(&mut self) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        Ok(Response::ok(self.session.info()))
    }

    fn get_db_last_connected(&mut self) -> anyhow::Result<Response> {
        let Some(id) = self.store.last_connected()? else {
            return Ok(Response::err("No previously connected database found."));
        };
        let creds = match self.store.load_cred(id) {
            Ok(creds) => creds,
            Err(e) if e.is_not_found() => {
                return Ok(Response::err("No previously connected database found."));
            }
            Err(e) => return Err(e.into()),
        };
        match self.session.connect(creds) {
            Ok(()) => Ok(Response::ok(self.session.info())),
            Err(e) => {
                let db_id = self.session.disconnect();
                self.store.reset_usage(db_id)?;
                Ok(Response::err(format!("Reconnect failed: {e}")))
            }
        }
    }

    fn set_db_connect(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        let map = match require(body, &["name", "host", "port", "user", "password", "dialect"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let mut creds = match creds_from_body(map) {
            Ok(creds) => creds,
            Err(resp) => return Ok(resp),
        };

        if let Some(existing) = self.store.find_cred(
            &creds.name,
            &creds.host,
            &creds.port,
            &creds.user,
            creds.dialect,
        )? {
            creds.id = existing.id;
        }

        self.session.connect(creds.clone())?;

        let id = match creds.id {
            Some(id) => id,
            None => self.store.save_cred(&creds)?,
        };
        self.session.set_db_id(id);
        self.store.set_last_connected(id)?;
        Ok(Response::ok(self.session.info()))
    }

    fn set_db_reconnect(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        let map = match require(body, &["name", "host", "port", "user", "dialect"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let dialect = match dialect_from(map) {
            Ok(dialect) => dialect,
            Err(resp) => return Ok(resp),
        };

        let Some(creds) = self.store.find_cred(
            field_str(map, "name").as_str(),
            field_str(map, "host").as_str(),
            field_str(map, "port").as_str(),
            field_str(map, "user").as_str(),
            dialect,
        )?
        else {
            return Ok(Response::err("No DB with that credentials found."));
        };

        let id = creds.id;
        self.session.connect(creds)?;
        if let Some(id) = id {
            self.session.set_db_id(id);
            self.store.set_last_connected(id)?;
        }
        Ok(Response::ok("Reconnected successfully."))
    }

    fn get_pref_connections(&mut self) -> anyhow::Result<Response> {
        Ok(Response::ok(self.store.list_creds()?))
    }

    fn set_pref_delete(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        let map = match require(body, &["name", "host", "port", "user", "dialect"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let dialect = match dialect_from(map) {
            Ok(dialect) => dialect,
            Err(resp) => return Ok(resp),
        };

        self.store.delete_cred(
            field_str(map, "name").as_str(),
            field_str(map, "host").as_str(),
            field_str(map, "port").as_str(),
            field_str(map, "user").as_str(),
            dialect,
        )?;
        let db_id = self.session.disconnect();
        self.store.reset_usage(db_id)?;
        Ok(Response::ok("Connection deleted successfully."))
    }

    fn set_db_disconnect(&mut self) -> anyhow::Result<Response> {
        let db_id = self.session.disconnect();
        self.store.reset_usage(db_id)?;
        Ok(Response::ok("Disconnected successfully."))
    }

    // -- Introspection -------------------------------------------------------

    fn get_db_tables(&mut self) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let driver = self.session.driver()?;
        let data = inspect::prefetch_relations(&mut *driver)?;

        // Row counts and the dependency sort run on parallel workers and
        // join before the response is built.
        let (counts, order) =
            std::thread::scope(|scope| -> anyhow::Result<(Vec<(String, u64)>, Vec<String>)> {
                let tables = &data.tables;
                let counter = scope.spawn(move || -> Result<Vec<(String, u64)>, DbError> {
                    let mut counts = Vec::with_capacity(tables.len());
                    for table in tables {
                        counts.push((table.clone(), driver.count_rows(table)?));
                    }
                    Ok(counts)
                });
                let sorter = scope.spawn(|| inspect::sort_from_relations(&data, None));

                let counts = counter
                    .join()
                    .map_err(|_| anyhow!("row-count worker panicked"))??;
                let order = sorter
                    .join()
                    .map_err(|_| anyhow!("sort worker panicked"))?;
                Ok((counts, order))
            })?;

        let counts: HashMap<String, u64> = counts.into_iter().collect();
        let payload: Vec<Value> = order
            .iter()
            .map(|table| {
                json!({
                    "name": table,
                    "rows": counts.get(table).copied().unwrap_or(0),
                    "parents": data.parent_count(table),
                })
            })
            .collect();
        Ok(Response::ok(payload))
    }

    fn get_db_table(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["name"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let name = field_str(map, "name");
        let metadata = inspect::table_metadata(self.session.driver()?, &name)?;
        Ok(Response::ok(metadata))
    }

    // -- Generation ----------------------------------------------------------

    fn get_gen_packets(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["name", "no_of_entries", "columns"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let mut spec: TableSpec = match serde_json::from_value(Value::Object(map.clone())) {
            Ok(spec) => spec,
            Err(e) => return Ok(Response::err(format!("Invalid table spec: {e}"))),
        };
        spec.db_id = self.session.db_id();

        let creds = self
            .session
            .creds()
            .cloned()
            .ok_or_else(|| anyhow!("session lost its credentials"))?;
        match self.jobs.start(creds, spec, self.session.sql_log()) {
            Ok(job_id) => Ok(Response::pending(json!({ "job_id": job_id }))),
            Err(msg) => Ok(Response::err(msg)),
        }
    }

    fn poll_gen_status(&mut self) -> anyhow::Result<Response> {
        match self.jobs.poll() {
            None => Ok(Response::err("No active generation job.")),
            Some(JobPoll::Running(progress)) => Ok(Response::pending(progress)),
            Some(JobPoll::Finished(Ok((spec, packet)))) => {
                if let Err(e) = self.store.save_spec(&spec) {
                    warn!(table = %spec.name, "failed to save spec: {e}");
                }
                Ok(Response::ok(self.populator.paginate(packet)))
            }
            Some(JobPoll::Finished(Err(msg))) => Ok(Response::err(msg)),
        }
    }

    fn get_gen_packet(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["id"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let id = field_str(map, "id");
        let page = match map.get("page") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_u64() {
                Some(page) => Some(page as usize),
                None => return Ok(Response::err("Invalid page number.")),
            },
        };
        match self.populator.packet_page(&id, page) {
            Ok(packet) => Ok(Response::ok(packet)),
            Err(e) => Ok(Response::err(e.to_string())),
        }
    }

    fn clear_gen_packets(&mut self) -> anyhow::Result<Response> {
        self.jobs.cancel();
        Ok(Response::ok("Generation job cleared."))
    }

    fn get_pref_spec(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["name"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let name = field_str(map, "name");
        let db_id = self
            .session
            .db_id()
            .ok_or_else(|| anyhow!("session lost its database id"))?;
        match self.store.load_spec(db_id, &name) {
            Ok(spec) => Ok(Response::ok(spec)),
            Err(e) if e.is_not_found() => {
                Ok(Response::err(format!("No saved spec for table '{name}'.")))
            }
            Err(e) => Err(e.into()),
        }
    }

    // -- SQL console ---------------------------------------------------------

    fn run_sql_query(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["sql"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let sql = field_str(map, "sql");
        let creds = self
            .session
            .creds()
            .cloned()
            .ok_or_else(|| anyhow!("session lost its credentials"))?;
        Ok(Response::ok(sqlrun::run_query(creds, sql)))
    }

    fn get_logs_read(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        let lines = body
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|map| map.get("lines"))
            .and_then(Value::as_u64)
            .unwrap_or(200) as usize;
        match self.session.sql_log() {
            Some(log) => Ok(Response::ok(log.read(lines)?)),
            None => Ok(Response::ok(Vec::<String>::new())),
        }
    }

    fn set_logs_clear(&mut self) -> anyhow::Result<Response> {
        if let Some(log) = self.session.sql_log() {
            log.clear()?;
        }
        Ok(Response::ok("Logs cleared successfully."))
    }

    // -- Writes --------------------------------------------------------------

    fn set_db_insert(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["id"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let id = field_str(map, "id");
        let packet = match self.populator.packet_page(&id, None) {
            Ok(packet) => packet,
            Err(e) => return Ok(Response::err(e.to_string())),
        };

        let written = self.session.insert_packet(&packet)?;
        let db_id = self
            .session
            .db_id()
            .ok_or_else(|| anyhow!("session lost its database id"))?;
        self.store.record_usage(db_id, &packet.name, written)?;
        Ok(Response::ok(format!(
            "Inserted {written} row(s) into '{}'.",
            packet.name
        )))
    }

    fn set_db_export(&mut self, body: &Option<Value>) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let map = match require(body, &["id", "path"]) {
            Ok(map) => map,
            Err(resp) => return Ok(resp),
        };
        let id = field_str(map, "id");
        let path = field_str(map, "path");
        let packet = match self.populator.packet_page(&id, None) {
            Ok(packet) => packet,
            Err(e) => return Ok(Response::err(e.to_string())),
        };
        if packet.columns.is_empty() || packet.entries.is_empty() {
            return Ok(Response::err("Missing columns and/or entries."));
        }
        export_packet(&packet, &path)?;
        Ok(Response::ok(format!(
            "Exported {} row(s) to {path}.",
            packet.entries.len()
        )))
    }

    fn set_db_commit(&mut self) -> anyhow::Result<Response> {
        self.session.commit()?;
        self.store.reset_usage(self.session.db_id())?;
        Ok(Response::ok("Committed."))
    }

    fn set_db_rollback(&mut self) -> anyhow::Result<Response> {
        self.session.rollback()?;
        self.store.reset_usage(self.session.db_id())?;
        Ok(Response::ok("Rolled back."))
    }

    fn get_pref_rows(&mut self) -> anyhow::Result<Response> {
        if let Err(resp) = self.check_connected() {
            return Ok(resp);
        }
        let db_id = self
            .session
            .db_id()
            .ok_or_else(|| anyhow!("session lost its database id"))?;
        let usage = self.store.usage_by_table(db_id)?;

        let driver = self.session.driver()?;
        let names = driver.table_names()?;
        let mut payload = Vec::with_capacity(names.len());
        for table in names {
            let total = driver.count_rows(&table)?;
            let new_rows = usage.get(&table).copied().unwrap_or(0);
            payload.push(json!({
                "table_name": table,
                "total_rows": total,
                "new_rows": new_rows,
            }));
        }
        Ok(Response::ok(payload))
    }

    // -- Preconditions -------------------------------------------------------

    fn check_connected(&self) -> Result<(), Response> {
        if self.session.is_connected() {
            Ok(())
        } else {
            Err(Response::err("Request requires connection to a database."))
        }
    }
}

/// A field counts as present when it exists, is non-null, and (for
/// strings) is non-empty.
fn has_value(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn missing_message(missing: &[&str]) -> String {
    if missing.len() == 1 {
        format!("Missing required parameter: {}", missing[0])
    } else {
        let head = missing[..missing.len() - 1].join(", ");
        format!(
            "Missing required parameters: {head}, and {}",
            missing[missing.len() - 1]
        )
    }
}

/// Rejects a request missing any of `keys`, naming every absent field.
fn require<'a>(
    body: &'a Option<Value>,
    keys: &[&str],
) -> Result<&'a Map<String, Value>, Response> {
    let map = body.as_ref().and_then(Value::as_object);
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| !map.map(|m| has_value(m, key)).unwrap_or(false))
        .collect();
    match (map, missing.is_empty()) {
        (Some(map), true) => Ok(map),
        _ => Err(Response::err(missing_message(&missing))),
    }
}

/// String view of a body field; numbers are stringified (clients often
/// send ports as integers).
fn field_str(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn dialect_from(map: &Map<String, Value>) -> Result<Dialect, Response> {
    let text = field_str(map, "dialect");
    Dialect::parse(&text).ok_or_else(|| Response::err(format!("Unsupported dialect: {text}")))
}

fn creds_from_body(map: &Map<String, Value>) -> Result<DbCreds, Response> {
    let dialect = dialect_from(map)?;
    Ok(DbCreds {
        id: None,
        name: field_str(map, "name"),
        host: field_str(map, "host"),
        port: field_str(map, "port"),
        user: field_str(map, "user"),
        password: field_str(map, "password"),
        dialect,
    })
}

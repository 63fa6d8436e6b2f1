//! End-to-end protocol tests for the `datasmith` binary.
//!
//! Each test creates its own temporary data directory and SQLite fixture,
//! then talks to a spawned server process over its stdin/stdout pipes --
//! one JSON request line in, one JSON response line out.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

/// A running server with line-oriented request/response helpers.
struct ServerProc {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ServerProc {
    fn start(data_dir: &TempDir) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_datasmith"))
            .env("DATASMITH_DIR", data_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn datasmith");
        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
        }
    }

    /// Writes one raw line without waiting for a response (blank lines
    /// produce none).
    fn send_raw(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").unwrap();
        self.stdin.flush().unwrap();
    }

    /// Sends one request line and reads the single response line.
    fn send(&mut self, request: Value) -> Value {
        self.send_raw(&request.to_string());
        self.read_response()
    }

    fn read_response(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).unwrap();
        assert!(!line.is_empty(), "server closed stdout unexpectedly");
        serde_json::from_str(&line).expect("response line must be JSON")
    }

    /// Polls a generation job until it returns the finished first page.
    fn await_job(&mut self) -> Value {
        for _ in 0..500 {
            let polled = self.send(json!({"kind": "poll_gen_status"}));
            match polled["status"].as_str() {
                Some("pending") => std::thread::sleep(Duration::from_millis(10)),
                Some("ok") => return polled["payload"].clone(),
                other => panic!("unexpected poll status {other:?}: {polled}"),
            }
        }
        panic!("generation job never finished");
    }

    /// Sends the `exit` sentinel and waits for a clean shutdown.
    fn shutdown(mut self) {
        self.send_raw("exit");
        let bye = self.read_response();
        assert_eq!(bye["payload"], "exiting...");
        let status = self.child.wait().unwrap();
        assert!(status.success());
    }
}

impl Drop for ServerProc {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Create a school-shaped SQLite fixture and return its path.
fn fixture_db(tmp: &TempDir) -> String {
    let path = tmp.path().join("school.db");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            r#"
            CREATE TABLE teachers (
                teacher_id INTEGER PRIMARY KEY,
                full_name  TEXT NOT NULL,
                department TEXT,
                salary     INTEGER
            );
            INSERT INTO teachers (full_name, department, salary) VALUES
                ('Ada Lovelace', 'CS', 51000),
                ('Grace Hopper', 'CS', 55000),
                ('Alan Turing', 'IT', 48000);
            CREATE TABLE classes (
                class_id   INTEGER PRIMARY KEY,
                teacher_id INTEGER NOT NULL REFERENCES teachers(teacher_id),
                subject    TEXT
            );
            "#,
        )
        .unwrap();
    path.to_string_lossy().into_owned()
}

fn connect_request(db_path: &str) -> Value {
    json!({
        "kind": "set_db_connect",
        "body": {
            "name": db_path, "host": "local", "port": "0",
            "user": "tester", "password": "secret", "dialect": "sqlite"
        }
    })
}

fn teachers_spec_request() -> Value {
    json!({"kind": "get_gen_packets", "body": {
        "name": "teachers",
        "noOfEntries": 10,
        "columns": [
            {"name": "teacher_id", "generator": "", "type": "autoincrement"},
            {"name": "full_name", "generator": "name", "type": "faker"},
            {"name": "department", "generator": "^(CS|MECH|CIVIL|IT)$", "type": "regex"},
            {"name": "salary", "generator": "randint(30000, 60000)", "type": "python", "order": 1}
        ]
    }})
}

#[test]
fn ping_blank_lines_and_exit() {
    let tmp = TempDir::new().unwrap();
    let mut server = ServerProc::start(&tmp);

    let res = server.send(json!({"kind": "ping"}));
    assert_eq!(res["status"], "ok");
    assert_eq!(res["payload"], "pong");

    // Blank lines are ignored; the next response belongs to the next request.
    server.send_raw("");
    server.send_raw("   ");
    let res = server.send(json!({"id": "abc", "kind": "ping"}));
    assert_eq!(res["id"], "abc");
    assert_eq!(res["payload"], "pong");

    server.shutdown();
}

#[test]
fn unknown_command_and_bad_json() {
    let tmp = TempDir::new().unwrap();
    let mut server = ServerProc::start(&tmp);

    let res = server.send(json!({"kind": "warp_drive"}));
    assert_eq!(res["status"], "error");
    assert_eq!(res["error"], "Unknown command: warp_drive");

    server.send_raw("this is not json");
    let res = server.read_response();
    assert_eq!(res["status"], "error");
    assert!(res["traceback"].is_string());

    server.shutdown();
}

#[test]
fn eof_without_exit_is_a_clean_shutdown() {
    let tmp = TempDir::new().unwrap();
    let mut cmd = AssertCommand::cargo_bin("datasmith").unwrap();
    cmd.env("DATASMITH_DIR", tmp.path())
        .write_stdin(json!({"kind": "ping"}).to_string() + "\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("pong"));
}

#[test]
fn full_generation_flow_over_the_wire() {
    let tmp = TempDir::new().unwrap();
    let db_path = fixture_db(&tmp);
    let mut server = ServerProc::start(&tmp);

    let res = server.send(connect_request(&db_path));
    assert_eq!(res["status"], "ok", "connect: {res}");
    assert_eq!(res["payload"]["connected"], true);

    let res = server.send(json!({"kind": "get_db_tables"}));
    let tables = res["payload"].as_array().unwrap();
    assert_eq!(tables[0]["name"], "teachers");
    assert_eq!(tables[0]["rows"], 3);
    assert_eq!(tables[1]["name"], "classes");
    assert_eq!(tables[1]["parents"], 1);

    let res = server.send(teachers_spec_request());
    assert_eq!(res["status"], "pending", "start: {res}");
    assert!(res["payload"]["job_id"].is_string());

    let page = server.await_job();
    assert_eq!(page["total_entries"], 10);
    assert_eq!(page["errors"].as_array().unwrap().len(), 0);
    let packet_id = page["id"].as_str().unwrap().to_string();
    for row in page["entries"].as_array().unwrap() {
        assert!(row[0].is_null());
        assert!(row[1].is_string());
        let dept = row[2].as_str().unwrap();
        assert!(["CS", "MECH", "CIVIL", "IT"].contains(&dept));
        let salary: i64 = row[3].as_str().unwrap().parse().unwrap();
        assert!((30000..=60000).contains(&salary));
    }

    // Insert three times, watching the uncommitted counter climb, then
    // roll everything back.
    for expected in 1..=3u64 {
        let res = server.send(json!({"kind": "set_db_insert", "body": {"id": packet_id}}));
        assert_eq!(res["status"], "ok", "insert: {res}");
        let info = server.send(json!({"kind": "get_db_info"}));
        assert_eq!(info["payload"]["pending_writes"].as_u64().unwrap(), expected);
    }
    let rows = server.send(json!({"kind": "get_pref_rows"}));
    let teachers = rows["payload"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["table_name"] == "teachers")
        .unwrap()
        .clone();
    assert_eq!(teachers["new_rows"], 30);
    assert_eq!(teachers["total_rows"], 33);

    let res = server.send(json!({"kind": "set_db_rollback"}));
    assert_eq!(res["status"], "ok");
    let info = server.send(json!({"kind": "get_db_info"}));
    assert_eq!(info["payload"]["pending_writes"], 0);
    let rows = server.send(json!({"kind": "get_pref_rows"}));
    for table in rows["payload"].as_array().unwrap() {
        assert_eq!(table["new_rows"], 0);
    }

    server.shutdown();
}

#[test]
fn saved_state_survives_across_processes() {
    let tmp = TempDir::new().unwrap();
    let db_path = fixture_db(&tmp);

    // First process: connect and generate, which also saves the spec.
    let packet_id = {
        let mut server = ServerProc::start(&tmp);
        let res = server.send(connect_request(&db_path));
        assert_eq!(res["status"], "ok", "connect: {res}");
        let res = server.send(teachers_spec_request());
        assert_eq!(res["status"], "pending");
        let page = server.await_job();
        let id = page["id"].as_str().unwrap().to_string();
        server.shutdown();
        id
    };

    // Second process, same data dir: the credential and the spec survived,
    // the in-memory packet cache did not.
    let mut server = ServerProc::start(&tmp);

    let res = server.send(json!({"kind": "get_db_last_connected"}));
    assert_eq!(res["status"], "ok", "reconnect: {res}");
    assert_eq!(res["payload"]["connected"], true);

    let res = server.send(json!({"kind": "get_gen_packet", "body": {"id": packet_id}}));
    assert_eq!(res["status"], "error");

    let res = server.send(json!({"kind": "get_pref_spec", "body": {"name": "teachers"}}));
    assert_eq!(res["status"], "ok", "saved spec: {res}");
    assert_eq!(res["payload"]["no_of_entries"], 10);
    assert_eq!(res["payload"]["columns"].as_array().unwrap().len(), 4);
    // The legacy "python" wire kind comes back as the script kind.
    assert_eq!(res["payload"]["columns"][3]["type"], "script");

    let res = server.send(json!({"kind": "get_pref_connections"}));
    let creds = res["payload"].as_array().unwrap();
    assert_eq!(creds.len(), 1);
    assert!(creds[0].get("password").is_none());

    server.shutdown();
}

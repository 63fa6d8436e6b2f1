//! DDL for the preferences database (`config.db`).
//!
//! Timestamps are stored as TEXT in ISO 8601 format. Passwords are stored
//! base64-encoded by the caller before they reach this layer.

/// Current schema version. Bumped whenever DDL changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Saved connection credentials ---------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS db_creds (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        name     TEXT NOT NULL,
        host     TEXT NOT NULL,
        port     TEXT NOT NULL,
        user     TEXT NOT NULL,
        password TEXT NOT NULL,
        dialect  TEXT NOT NULL,
        UNIQUE(name, host, port, user, dialect)
    )
    "#,
    // -- Saved generation specs ---------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS table_specs (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        db_id         INTEGER NOT NULL REFERENCES db_creds(id) ON DELETE CASCADE,
        name          TEXT NOT NULL,
        no_of_entries INTEGER NOT NULL,
        UNIQUE(db_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS column_specs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        table_id  INTEGER NOT NULL REFERENCES table_specs(id) ON DELETE CASCADE,
        name      TEXT NOT NULL,
        generator TEXT NOT NULL,
        type      TEXT NOT NULL,
        ord       INTEGER,
        UNIQUE(table_id, name)
    )
    "#,
    // -- Pending-insert ledger ----------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS usage_stats (
        db_id         INTEGER NOT NULL,
        table_name    TEXT NOT NULL,
        new_rows      INTEGER NOT NULL DEFAULT 0,
        last_accessed TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (db_id, table_name)
    )
    "#,
    // -- Small key-value surfaces -------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS prefs (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Preference key holding the id of the most recently connected credential.
pub const PREF_LAST_CONNECTED: &str = "last_connected";

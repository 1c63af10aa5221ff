//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by store behavior.
//! - Initialize the schema before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have a busy timeout, so contending writers wait
//!   instead of failing immediately.
//! - Returned connections have the schema fully initialized.

use super::config::{JournalMode, StoreConfig};
use super::migrations::initialize;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file with default tuning and initializes the schema.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_config(&StoreConfig::new(path))
}

/// Opens a SQLite database file described by `config` and initializes the schema.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - `DbError::Connection` when the file cannot be opened or configured.
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn open_db_with_config(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    let result = Connection::open(&config.path)
        .and_then(|conn| {
            conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
            apply_journal_mode(&conn, config.journal_mode)?;
            Ok(conn)
        })
        .map_err(DbError::Connection)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));

    finish_open("file", started_at, result)
}

/// Opens an in-memory SQLite database and initializes the schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let result = Connection::open_in_memory()
        .map_err(DbError::Connection)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));

    finish_open("memory", started_at, result)
}

fn finish_open(
    mode: &str,
    started_at: Instant,
    result: DbResult<Connection>,
) -> DbResult<Connection> {
    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => {
            let error_code = match err {
                DbError::Connection(_) => "db_open_failed",
                _ => "db_bootstrap_failed",
            };
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                error_code,
                err
            );
        }
    }
    result
}

fn apply_journal_mode(conn: &Connection, mode: JournalMode) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("PRAGMA journal_mode = {};", mode.pragma_value()))
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(DbError::Connection)?;
    initialize(conn)
}

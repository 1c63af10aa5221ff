//! Schema initializer: SQLite migration registry and executor.
//!
//! # Responsibility
//! - Create the three store tables and their uniqueness constraints.
//! - Apply pending migrations atomically, safe to run on every startup.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Every statement is `IF NOT EXISTS`; tables created by an older deployment
//!   (at `user_version = 0`) are adopted, never dropped.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tables",
        sql: include_str!("0001_tables.sql"),
    },
    Migration {
        version: 2,
        name: "unique_constraints",
        sql: include_str!("0002_unique_constraints.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Creates tables and uniqueness constraints when absent.
///
/// Idempotent and non-destructive. Failures propagate without retry.
pub fn initialize(conn: &mut Connection) -> DbResult<()> {
    apply_migrations(conn)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    let current_version = current_user_version(conn)?;
    check_supported(current_version, latest)?;

    if current_version == latest {
        debug!("event=schema_init module=db status=ok applied=0 version={latest}");
        return Ok(());
    }

    // Another connection may have migrated between the check and the lock.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let locked_version = current_user_version(&tx)?;
    check_supported(locked_version, latest)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version <= locked_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        debug!(
            "event=schema_migration module=db status=ok version={} name={}",
            migration.version, migration.name
        );
        applied += 1;
    }
    tx.commit()?;

    info!("event=schema_init module=db status=ok applied={applied} version={latest}");
    Ok(())
}

fn check_supported(db_version: u32, latest_supported: u32) -> DbResult<()> {
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per table family.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Institution names are normalized before they reach any SQL statement.
//! - Multi-table writes run in one `IMMEDIATE` transaction; a failure rolls
//!   every table back to its pre-write state.
//! - Write failures are reported with operation, institution and key.

use crate::db::DbError;
use crate::model::evaluation::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entry_repo;
pub mod evaluation_repo;
pub mod institution_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for store persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    /// A write statement failed; its transaction was rolled back.
    Write {
        operation: &'static str,
        institution: String,
        key: String,
        source: DbError,
    },
}

impl RepoError {
    /// Attaches write diagnostics to database failures; other errors pass through.
    pub(crate) fn for_write(
        self,
        operation: &'static str,
        institution: &str,
        key: impl Into<String>,
    ) -> Self {
        match self {
            Self::Db(source) => Self::Write {
                operation,
                institution: institution.to_string(),
                key: key.into(),
                source,
            },
            other => other,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::Write {
                operation,
                institution,
                key,
                source,
            } => write!(
                f,
                "{operation} failed for institution `{institution}` key `{key}`: {source}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) | Self::Write { source: err, .. } => Some(err),
            Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_tables_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [*table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

//! Institution-wide statistics reads and reset.
//!
//! # Invariants
//! - `reset_institution` deletes from all three tables in one transaction.
//! - Stats reads never synthesize rows; absence is reported as `None`.

use crate::model::institution::{normalize_institution, InstitutionStats, ResetReport};
use crate::repo::{ensure_tables_ready, RepoResult};
use crate::stats::{load_stats, rebuild_stats, recompute_stats};
use rusqlite::{Connection, TransactionBehavior};

/// Repository interface for institution-scoped aggregate and bulk operations.
pub trait InstitutionRepository {
    /// Reads the running stats row.
    fn get_institution_stats(&self, institution: &str) -> RepoResult<Option<InstitutionStats>>;
    /// Scans evaluation rows and returns the totals the running row should hold.
    fn recompute_institution_stats(&self, institution: &str) -> RepoResult<InstitutionStats>;
    /// Overwrites the running row with a full recomputation.
    fn rebuild_institution_stats(&mut self, institution: &str) -> RepoResult<InstitutionStats>;
    /// Deletes every entry, evaluation and stats row of the institution.
    fn reset_institution(&mut self, institution: &str) -> RepoResult<ResetReport>;
}

/// SQLite-backed institution repository.
pub struct SqliteInstitutionRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteInstitutionRepository<'conn> {
    /// Constructs a repository from an initialized connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["entries", "evaluations", "institution_stats"])?;
        Ok(Self { conn })
    }

    fn delete_all(&mut self, institution: &str) -> RepoResult<ResetReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = ResetReport {
            entries_deleted: tx.execute(
                "DELETE FROM entries WHERE institution = ?1;",
                [institution],
            )?,
            evaluations_deleted: tx.execute(
                "DELETE FROM evaluations WHERE institution = ?1;",
                [institution],
            )?,
            stats_deleted: tx.execute(
                "DELETE FROM institution_stats WHERE institution = ?1;",
                [institution],
            )?,
        };
        tx.commit()?;
        Ok(report)
    }

    fn rebuild(&mut self, institution: &str) -> RepoResult<InstitutionStats> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stats = rebuild_stats(&tx, institution)?;
        tx.commit()?;
        Ok(stats)
    }
}

impl InstitutionRepository for SqliteInstitutionRepository<'_> {
    fn get_institution_stats(&self, institution: &str) -> RepoResult<Option<InstitutionStats>> {
        load_stats(&*self.conn, &normalize_institution(institution))
    }

    fn recompute_institution_stats(&self, institution: &str) -> RepoResult<InstitutionStats> {
        recompute_stats(&*self.conn, &normalize_institution(institution))
    }

    fn rebuild_institution_stats(&mut self, institution: &str) -> RepoResult<InstitutionStats> {
        let institution = normalize_institution(institution);
        self.rebuild(&institution)
            .map_err(|err| err.for_write("rebuild_institution_stats", &institution, "*"))
    }

    fn reset_institution(&mut self, institution: &str) -> RepoResult<ResetReport> {
        let institution = normalize_institution(institution);
        self.delete_all(&institution)
            .map_err(|err| err.for_write("reset_institution", &institution, "*"))
    }
}

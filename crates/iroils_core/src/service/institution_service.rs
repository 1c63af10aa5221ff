//! Institution statistics and reset service.
//!
//! # Responsibility
//! - Serve running statistics with zero defaults.
//! - Reset all data of one institution.

use crate::model::institution::{normalize_institution, InstitutionStats, ResetReport};
use crate::repo::institution_repo::InstitutionRepository;
use crate::repo::RepoResult;
use crate::service::read_or_default;
use log::{info, warn};

/// Use-case service wrapper for institution-wide operations.
pub struct InstitutionService<R: InstitutionRepository> {
    repo: R,
}

impl<R: InstitutionRepository> InstitutionService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Running totals; all zeros for unknown institutions or on read failure.
    pub fn get_institution_stats(&self, institution: &str) -> InstitutionStats {
        read_or_default(
            "institution_stats_get",
            institution,
            self.repo.get_institution_stats(institution),
            || None,
        )
        .unwrap_or_else(|| InstitutionStats::empty(institution))
    }

    /// Compares the running row with a full recomputation.
    ///
    /// Returns the recomputed stats when they disagree, `None` when consistent.
    pub fn audit_institution_stats(&self, institution: &str) -> RepoResult<Option<InstitutionStats>> {
        let stored = self
            .repo
            .get_institution_stats(institution)?
            .unwrap_or_else(|| InstitutionStats::empty(institution));
        let expected = self.repo.recompute_institution_stats(institution)?;
        if stored == expected {
            return Ok(None);
        }
        warn!(
            "event=institution_stats_audit module=service status=drift institution={} stored_count={} expected_count={}",
            expected.institution, stored.total_evaluations, expected.total_evaluations
        );
        Ok(Some(expected))
    }

    /// Replaces the running row with totals recomputed from evaluations.
    pub fn rebuild_institution_stats(&mut self, institution: &str) -> RepoResult<InstitutionStats> {
        let stats = self.repo.rebuild_institution_stats(institution)?;
        info!(
            "event=institution_stats_rebuild module=service status=ok institution={} total_evaluations={}",
            stats.institution, stats.total_evaluations
        );
        Ok(stats)
    }

    /// Deletes all entries, evaluations and stats of the institution atomically.
    ///
    /// Succeeds with zero counts when the institution has no data.
    pub fn reset_institution(&mut self, institution: &str) -> RepoResult<ResetReport> {
        let report = self.repo.reset_institution(institution)?;
        info!(
            "event=institution_reset module=service status=ok institution={} entries_deleted={} evaluations_deleted={} stats_deleted={}",
            normalize_institution(institution),
            report.entries_deleted,
            report.evaluations_deleted,
            report.stats_deleted
        );
        Ok(report)
    }
}

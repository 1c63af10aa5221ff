//! Persistence and aggregation core for institution incident evaluations.
//!
//! Stores incident entries and evaluator scores per institution and keeps a
//! running statistics row per institution consistent with every evaluation
//! write. Presentation, uploads parsing and authentication live in callers.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod stats;

pub use db::{initialize, open_db, open_db_in_memory, open_db_with_config, DbError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{event_number_of, Entry, EntryDocument, EntrySnapshot, NOT_SELECTED};
pub use model::evaluation::{Evaluation, EvaluatorStats, Scores, ValidationError};
pub use model::institution::{normalize_institution, InstitutionStats, ResetReport};
pub use repo::entry_repo::{
    EntryRepository, SaveEntriesReport, SelectedStatusCount, SqliteEntryRepository,
};
pub use repo::evaluation_repo::{
    EvaluationOutcome, EvaluationRepository, SqliteEvaluationRepository,
};
pub use repo::institution_repo::{InstitutionRepository, SqliteInstitutionRepository};
pub use repo::{RepoError, RepoResult};
pub use service::entry_service::EntryService;
pub use service::evaluation_service::EvaluationService;
pub use service::institution_service::InstitutionService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

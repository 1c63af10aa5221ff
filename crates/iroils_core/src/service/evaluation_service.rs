//! Evaluation use-case service.
//!
//! # Responsibility
//! - Accept evaluation submissions from evaluation forms.
//! - Serve evaluation lookups and per-evaluator aggregates.
//!
//! # Invariants
//! - Callers do not classify submissions as new or edited; the repository
//!   derives it under the write lock and reports it back.

use crate::model::evaluation::{Evaluation, EvaluatorStats, Scores};
use crate::model::institution::normalize_institution;
use crate::repo::evaluation_repo::{EvaluationOutcome, EvaluationRepository};
use crate::repo::RepoResult;
use crate::service::read_or_default;
use log::info;

/// Use-case service wrapper for evaluation persistence.
pub struct EvaluationService<R: EvaluationRepository> {
    repo: R,
}

impl<R: EvaluationRepository> EvaluationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Saves one evaluator's scores for an entry and updates institution stats.
    ///
    /// # Contract
    /// - First submission for `(institution, evaluator, entry_number)` adds the
    ///   scores and one evaluation to the institution totals.
    /// - Later submissions move the totals by the score difference only.
    /// - On error nothing is written to either table.
    pub fn save_evaluation(
        &mut self,
        evaluator: &str,
        entry_number: &str,
        institution: &str,
        summary_score: i64,
        tag_score: i64,
        feedback: &str,
    ) -> RepoResult<EvaluationOutcome> {
        let evaluation = Evaluation::new(
            institution,
            evaluator,
            entry_number,
            Scores::new(summary_score, tag_score),
            feedback,
        );
        self.submit(&evaluation)
    }

    /// Saves a prepared evaluation record.
    pub fn submit(&mut self, evaluation: &Evaluation) -> RepoResult<EvaluationOutcome> {
        let outcome = self.repo.save_evaluation(evaluation)?;
        info!(
            "event=evaluation_save module=service status=ok kind={} institution={} evaluator={} entry_number={}",
            if outcome.is_new() { "created" } else { "edited" },
            normalize_institution(&evaluation.institution),
            evaluation.evaluator,
            evaluation.entry_number
        );
        Ok(outcome)
    }

    /// Returns the stored evaluation, or `None` when absent or unreadable.
    pub fn get_evaluation(
        &self,
        evaluator: &str,
        entry_number: &str,
        institution: &str,
    ) -> Option<Evaluation> {
        read_or_default(
            "evaluation_get",
            institution,
            self.repo.get_evaluation(evaluator, entry_number, institution),
            || None,
        )
    }

    pub fn get_evaluations_by_evaluator(
        &self,
        evaluator: &str,
        entry_number: &str,
    ) -> Vec<Evaluation> {
        read_or_default(
            "evaluations_by_evaluator",
            "*",
            self.repo.get_evaluations_by_evaluator(evaluator, entry_number),
            Vec::new,
        )
    }

    pub fn count_evaluations_by_evaluator(&self, evaluator: &str, institution: &str) -> i64 {
        read_or_default(
            "evaluations_count_by_evaluator",
            institution,
            self.repo.count_evaluations_by_evaluator(evaluator, institution),
            || 0,
        )
    }

    pub fn get_evaluator_stats(&self, evaluator: &str, institution: Option<&str>) -> EvaluatorStats {
        read_or_default(
            "evaluator_stats",
            institution.unwrap_or("*"),
            self.repo.get_evaluator_stats(evaluator, institution),
            EvaluatorStats::default,
        )
    }

    pub fn list_evaluators(&self) -> Vec<String> {
        read_or_default("evaluators_list", "*", self.repo.list_evaluators(), Vec::new)
    }

    pub fn list_evaluations(&self, institution: &str) -> Vec<Evaluation> {
        read_or_default(
            "evaluations_list",
            institution,
            self.repo.list_evaluations(institution),
            Vec::new,
        )
    }
}

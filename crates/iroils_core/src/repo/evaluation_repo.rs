//! Evaluation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert evaluations keyed by `(institution, evaluator, entry_number)`.
//! - Keep `institution_stats` consistent with every evaluation write.
//!
//! # Invariants
//! - New-vs-edit is decided inside the write transaction from the stored row,
//!   never from caller state.
//! - The evaluation upsert and its stats update commit or roll back together.

use crate::model::evaluation::{Evaluation, EvaluatorStats, Scores};
use crate::model::institution::normalize_institution;
use crate::repo::{ensure_tables_ready, RepoResult};
use crate::stats::{apply_delta, StatsDelta};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

const EVALUATION_SELECT_SQL: &str = "SELECT
    institution,
    evaluator,
    entry_number,
    summary_score,
    tag_score,
    feedback
FROM evaluations";

/// Which statistics path an evaluation write took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// First submission for the key; the count grew by one.
    Created,
    /// Overwrote an existing submission; totals moved by the score difference.
    Edited { previous: Scores },
}

impl EvaluationOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Repository interface for evaluation submissions.
pub trait EvaluationRepository {
    /// Upserts one evaluation and updates institution stats atomically.
    fn save_evaluation(&mut self, evaluation: &Evaluation) -> RepoResult<EvaluationOutcome>;
    fn get_evaluation(
        &self,
        evaluator: &str,
        entry_number: &str,
        institution: &str,
    ) -> RepoResult<Option<Evaluation>>;
    /// Lists one evaluator's submissions for an entry number across institutions.
    fn get_evaluations_by_evaluator(
        &self,
        evaluator: &str,
        entry_number: &str,
    ) -> RepoResult<Vec<Evaluation>>;
    fn count_evaluations_by_evaluator(&self, evaluator: &str, institution: &str)
        -> RepoResult<i64>;
    /// Count and mean scores for an evaluator, optionally within one institution.
    fn get_evaluator_stats(
        &self,
        evaluator: &str,
        institution: Option<&str>,
    ) -> RepoResult<EvaluatorStats>;
    /// Distinct evaluator identities, sorted.
    fn list_evaluators(&self) -> RepoResult<Vec<String>>;
    fn list_evaluations(&self, institution: &str) -> RepoResult<Vec<Evaluation>>;
}

/// SQLite-backed evaluation repository.
pub struct SqliteEvaluationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEvaluationRepository<'conn> {
    /// Constructs a repository from an initialized connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["evaluations", "institution_stats"])?;
        Ok(Self { conn })
    }

    fn write_evaluation(
        &mut self,
        institution: &str,
        evaluation: &Evaluation,
    ) -> RepoResult<EvaluationOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous = find_scores_in_tx(
            &tx,
            institution,
            &evaluation.evaluator,
            &evaluation.entry_number,
        )?;

        tx.execute(
            "INSERT INTO evaluations (
                institution,
                evaluator,
                entry_number,
                summary_score,
                tag_score,
                feedback
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (institution, evaluator, entry_number) DO UPDATE SET
                summary_score = excluded.summary_score,
                tag_score = excluded.tag_score,
                feedback = excluded.feedback;",
            params![
                institution,
                evaluation.evaluator,
                evaluation.entry_number,
                evaluation.summary_score,
                evaluation.tag_score,
                evaluation.feedback,
            ],
        )?;

        let current = evaluation.scores();
        let (outcome, delta) = match previous {
            None => (EvaluationOutcome::Created, StatsDelta::for_new(current)),
            Some(previous) => (
                EvaluationOutcome::Edited { previous },
                StatsDelta::for_edit(previous, current),
            ),
        };
        apply_delta(&tx, institution, &delta)?;

        tx.commit()?;
        Ok(outcome)
    }
}

impl EvaluationRepository for SqliteEvaluationRepository<'_> {
    fn save_evaluation(&mut self, evaluation: &Evaluation) -> RepoResult<EvaluationOutcome> {
        evaluation.validate()?;
        let institution = normalize_institution(&evaluation.institution);
        self.write_evaluation(&institution, evaluation)
            .map_err(|err| {
                err.for_write(
                    "save_evaluation",
                    &institution,
                    evaluation_key(&evaluation.evaluator, &evaluation.entry_number),
                )
            })
    }

    fn get_evaluation(
        &self,
        evaluator: &str,
        entry_number: &str,
        institution: &str,
    ) -> RepoResult<Option<Evaluation>> {
        let evaluation = self
            .conn
            .query_row(
                &format!(
                    "{EVALUATION_SELECT_SQL}
                     WHERE institution = ?1
                       AND evaluator = ?2
                       AND entry_number = ?3;"
                ),
                params![normalize_institution(institution), evaluator, entry_number],
                parse_evaluation_row,
            )
            .optional()?;
        Ok(evaluation)
    }

    fn get_evaluations_by_evaluator(
        &self,
        evaluator: &str,
        entry_number: &str,
    ) -> RepoResult<Vec<Evaluation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT_SQL}
             WHERE evaluator = ?1
               AND entry_number = ?2
             ORDER BY institution ASC;"
        ))?;
        let rows = stmt.query_map(params![evaluator, entry_number], parse_evaluation_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_evaluations_by_evaluator(
        &self,
        evaluator: &str,
        institution: &str,
    ) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM evaluations
             WHERE evaluator = ?1
               AND institution = ?2;",
            params![evaluator, normalize_institution(institution)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn get_evaluator_stats(
        &self,
        evaluator: &str,
        institution: Option<&str>,
    ) -> RepoResult<EvaluatorStats> {
        let institution = institution.map(normalize_institution);
        let stats = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(AVG(summary_score), 0.0),
                COALESCE(AVG(tag_score), 0.0)
             FROM evaluations
             WHERE evaluator = ?1
               AND (?2 IS NULL OR institution = ?2);",
            params![evaluator, institution],
            |row| {
                Ok(EvaluatorStats {
                    total_evaluations: row.get(0)?,
                    average_summary_score: row.get(1)?,
                    average_tag_score: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    fn list_evaluators(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT evaluator FROM evaluations ORDER BY evaluator ASC;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_evaluations(&self, institution: &str) -> RepoResult<Vec<Evaluation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT_SQL}
             WHERE institution = ?1
             ORDER BY id ASC;"
        ))?;
        let rows = stmt.query_map(
            params![normalize_institution(institution)],
            parse_evaluation_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Diagnostic key for one evaluation row.
fn evaluation_key(evaluator: &str, entry_number: &str) -> String {
    format!("{evaluator}/{entry_number}")
}

fn find_scores_in_tx(
    tx: &Transaction<'_>,
    institution: &str,
    evaluator: &str,
    entry_number: &str,
) -> RepoResult<Option<Scores>> {
    let scores = tx
        .query_row(
            "SELECT summary_score, tag_score
             FROM evaluations
             WHERE institution = ?1
               AND evaluator = ?2
               AND entry_number = ?3;",
            params![institution, evaluator, entry_number],
            |row| Ok(Scores::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(scores)
}

fn parse_evaluation_row(row: &Row<'_>) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        institution: row.get("institution")?,
        evaluator: row.get("evaluator")?,
        entry_number: row.get("entry_number")?,
        summary_score: row.get("summary_score")?,
        tag_score: row.get("tag_score")?,
        feedback: row.get("feedback")?,
    })
}

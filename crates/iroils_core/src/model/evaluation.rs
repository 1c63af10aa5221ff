//! Evaluation (evaluator score submission) model.
//!
//! # Invariants
//! - One evaluation per `(institution, evaluator, entry_number)`.
//! - `institution` is stored normalized; evaluator and entry number verbatim.

use crate::model::institution::normalize_institution;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Score pair carried by every evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub summary: i64,
    pub tag: i64,
}

impl Scores {
    pub fn new(summary: i64, tag: i64) -> Self {
        Self { summary, tag }
    }
}

/// One evaluator's submission for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub institution: String,
    pub evaluator: String,
    pub entry_number: String,
    pub summary_score: i64,
    pub tag_score: i64,
    pub feedback: String,
}

impl Evaluation {
    /// Builds an evaluation with a normalized institution name.
    pub fn new(
        institution: &str,
        evaluator: impl Into<String>,
        entry_number: impl Into<String>,
        scores: Scores,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            institution: normalize_institution(institution),
            evaluator: evaluator.into(),
            entry_number: entry_number.into(),
            summary_score: scores.summary,
            tag_score: scores.tag,
            feedback: feedback.into(),
        }
    }

    pub fn scores(&self) -> Scores {
        Scores::new(self.summary_score, self.tag_score)
    }

    /// Checks that every key component is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.institution.trim().is_empty() {
            return Err(ValidationError::EmptyInstitution);
        }
        if self.evaluator.trim().is_empty() {
            return Err(ValidationError::EmptyEvaluator);
        }
        if self.entry_number.trim().is_empty() {
            return Err(ValidationError::EmptyEntryNumber);
        }
        Ok(())
    }
}

/// Per-evaluator aggregate computed on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    pub total_evaluations: i64,
    pub average_summary_score: f64,
    pub average_tag_score: f64,
}

/// Key validation failures for store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyInstitution,
    EmptyEvaluator,
    EmptyEntryNumber,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInstitution => write!(f, "institution must not be empty"),
            Self::EmptyEvaluator => write!(f, "evaluator must not be empty"),
            Self::EmptyEntryNumber => write!(f, "entry number must not be empty"),
        }
    }
}

impl Error for ValidationError {}

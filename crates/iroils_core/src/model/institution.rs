//! Institution identity and aggregate records.
//!
//! # Invariants
//! - Institution names are compared only in normalized form.
//! - `InstitutionStats.cumulative_*` equal the sums of the institution's
//!   evaluation scores; `total_evaluations` equals their count.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Normalizes an institution name for storage and lookup.
///
/// Trims, collapses inner whitespace runs to one space and lowercases, so
/// `" UAB  Medical "` and `"uab medical"` address the same rows.
pub fn normalize_institution(name: &str) -> String {
    WHITESPACE_RE
        .replace_all(name.trim(), " ")
        .to_lowercase()
}

/// Running aggregate for one institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionStats {
    /// Normalized institution name.
    pub institution: String,
    /// Sum of `summary_score` over all evaluations.
    pub cumulative_summary: f64,
    /// Sum of `tag_score` over all evaluations.
    pub cumulative_tag: f64,
    /// Number of evaluation rows.
    pub total_evaluations: i64,
}

impl InstitutionStats {
    /// Zero-valued stats, returned for institutions without evaluations.
    pub fn empty(institution: &str) -> Self {
        Self {
            institution: normalize_institution(institution),
            cumulative_summary: 0.0,
            cumulative_tag: 0.0,
            total_evaluations: 0,
        }
    }

    pub fn average_summary(&self) -> f64 {
        if self.total_evaluations > 0 {
            self.cumulative_summary / self.total_evaluations as f64
        } else {
            0.0
        }
    }

    pub fn average_tag(&self) -> f64 {
        if self.total_evaluations > 0 {
            self.cumulative_tag / self.total_evaluations as f64
        } else {
            0.0
        }
    }
}

/// Row counts removed by an institution reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub entries_deleted: usize,
    pub evaluations_deleted: usize,
    pub stats_deleted: usize,
}

impl ResetReport {
    pub fn total(&self) -> usize {
        self.entries_deleted + self.evaluations_deleted + self.stats_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_institution, InstitutionStats};

    #[test]
    fn normalize_institution_folds_case_and_whitespace() {
        assert_eq!(normalize_institution("UAB"), "uab");
        assert_eq!(normalize_institution("  Uab \t"), "uab");
        assert_eq!(normalize_institution("UAB   Medical\nWest"), "uab medical west");
        assert_eq!(normalize_institution("   "), "");
    }

    #[test]
    fn averages_are_zero_without_evaluations() {
        let stats = InstitutionStats::empty(" UAB ");
        assert_eq!(stats.institution, "uab");
        assert_eq!(stats.average_summary(), 0.0);
        assert_eq!(stats.average_tag(), 0.0);
    }

    #[test]
    fn averages_divide_totals_by_count() {
        let stats = InstitutionStats {
            institution: "uab".to_string(),
            cumulative_summary: 9.0,
            cumulative_tag: 6.0,
            total_evaluations: 3,
        };
        assert_eq!(stats.average_summary(), 3.0);
        assert_eq!(stats.average_tag(), 2.0);
    }
}

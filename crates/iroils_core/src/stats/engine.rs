//! Incremental and full-scan maintenance of `institution_stats`.
//!
//! A brand-new evaluation adds its scores and one to the count. An edited
//! evaluation adds `new - old` to the score totals and leaves the count alone,
//! so every write costs O(1) regardless of how many evaluations exist.
//!
//! # Invariants
//! - Callers pass normalized institution names.
//! - Callers hold the write lock (an `IMMEDIATE` transaction) so the previous
//!   scores they diff against cannot change before commit.

use crate::model::evaluation::Scores;
use crate::model::institution::InstitutionStats;
use crate::repo::RepoResult;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};

/// Change to apply to one institution's running totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsDelta {
    pub summary: f64,
    pub tag: f64,
    pub evaluations: i64,
}

impl StatsDelta {
    /// Delta for an evaluation key seen for the first time.
    pub fn for_new(scores: Scores) -> Self {
        Self {
            summary: scores.summary as f64,
            tag: scores.tag as f64,
            evaluations: 1,
        }
    }

    /// Delta for overwriting `previous` scores with `current` on an existing key.
    pub fn for_edit(previous: Scores, current: Scores) -> Self {
        Self {
            summary: current.summary as f64 - previous.summary as f64,
            tag: current.tag as f64 - previous.tag as f64,
            evaluations: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.summary == 0.0 && self.tag == 0.0 && self.evaluations == 0
    }
}

/// How `apply_delta` changed the running row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsUpdate {
    /// Added to (or created) the running row.
    Incremented,
    /// Edit with identical scores; nothing written.
    Unchanged,
    /// Edit found no running row and rebuilt it from evaluation rows.
    Rebuilt,
}

/// Applies `delta` to the running row of `institution`.
///
/// New evaluations upsert additively, creating the row with count 1 when
/// absent. Edits update in place, identical resubmissions included; if the
/// row is missing they rebuild it from the evaluation table, which must
/// already hold the edited row.
pub fn apply_delta(
    conn: &Connection,
    institution: &str,
    delta: &StatsDelta,
) -> RepoResult<StatsUpdate> {
    if delta.evaluations != 0 {
        conn.execute(
            "INSERT INTO institution_stats (
                institution,
                cumulative_summary,
                cumulative_tag,
                total_evaluations
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (institution) DO UPDATE SET
                cumulative_summary = cumulative_summary + excluded.cumulative_summary,
                cumulative_tag = cumulative_tag + excluded.cumulative_tag,
                total_evaluations = total_evaluations + excluded.total_evaluations;",
            params![institution, delta.summary, delta.tag, delta.evaluations],
        )?;
        debug!("event=stats_update module=stats status=ok path=increment institution={institution}");
        return Ok(StatsUpdate::Incremented);
    }

    // Runs even for a zero diff so a missing row is still detected and repaired.
    let changed = conn.execute(
        "UPDATE institution_stats
         SET
            cumulative_summary = cumulative_summary + ?2,
            cumulative_tag = cumulative_tag + ?3
         WHERE institution = ?1;",
        params![institution, delta.summary, delta.tag],
    )?;
    if changed == 0 {
        warn!("event=stats_update module=stats status=repaired path=rebuild institution={institution}");
        rebuild_stats(conn, institution)?;
        return Ok(StatsUpdate::Rebuilt);
    }

    if delta.is_noop() {
        debug!("event=stats_update module=stats status=ok path=unchanged institution={institution}");
        return Ok(StatsUpdate::Unchanged);
    }

    debug!("event=stats_update module=stats status=ok path=diff institution={institution}");
    Ok(StatsUpdate::Incremented)
}

/// Reads the running row, `None` when the institution has no evaluations yet.
pub fn load_stats(conn: &Connection, institution: &str) -> RepoResult<Option<InstitutionStats>> {
    let stats = conn
        .query_row(
            "SELECT institution, cumulative_summary, cumulative_tag, total_evaluations
             FROM institution_stats
             WHERE institution = ?1;",
            [institution],
            |row| {
                Ok(InstitutionStats {
                    institution: row.get("institution")?,
                    cumulative_summary: row.get("cumulative_summary")?,
                    cumulative_tag: row.get("cumulative_tag")?,
                    total_evaluations: row.get("total_evaluations")?,
                })
            },
        )
        .optional()?;
    Ok(stats)
}

/// Computes the totals the running row should hold by scanning evaluations.
pub fn recompute_stats(conn: &Connection, institution: &str) -> RepoResult<InstitutionStats> {
    let stats = conn.query_row(
        "SELECT TOTAL(summary_score), TOTAL(tag_score), COUNT(*)
         FROM evaluations
         WHERE institution = ?1;",
        [institution],
        |row| {
            Ok(InstitutionStats {
                institution: institution.to_string(),
                cumulative_summary: row.get(0)?,
                cumulative_tag: row.get(1)?,
                total_evaluations: row.get(2)?,
            })
        },
    )?;
    Ok(stats)
}

/// Replaces the running row with recomputed totals.
///
/// An institution without evaluations ends up with no running row, the same
/// state as before its first evaluation.
pub fn rebuild_stats(conn: &Connection, institution: &str) -> RepoResult<InstitutionStats> {
    let stats = recompute_stats(conn, institution)?;
    if stats.total_evaluations == 0 {
        conn.execute(
            "DELETE FROM institution_stats WHERE institution = ?1;",
            [institution],
        )?;
        return Ok(stats);
    }

    conn.execute(
        "INSERT INTO institution_stats (
            institution,
            cumulative_summary,
            cumulative_tag,
            total_evaluations
        ) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (institution) DO UPDATE SET
            cumulative_summary = excluded.cumulative_summary,
            cumulative_tag = excluded.cumulative_tag,
            total_evaluations = excluded.total_evaluations;",
        params![
            institution,
            stats.cumulative_summary,
            stats.cumulative_tag,
            stats.total_evaluations
        ],
    )?;
    Ok(stats)
}

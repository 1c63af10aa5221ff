use iroils_core::db::open_db_in_memory;
use iroils_core::{
    EntryService, EvaluationOutcome, EvaluationRepository, EvaluationService, InstitutionService,
    InstitutionStats, RepoError, ResetReport, Scores, SqliteEntryRepository, SqliteEvaluationRepository,
    SqliteInstitutionRepository, ValidationError,
};
use rusqlite::Connection;
use serde_json::json;

fn save(
    conn: &mut Connection,
    evaluator: &str,
    entry_number: &str,
    institution: &str,
    scores: (i64, i64),
) -> EvaluationOutcome {
    let mut service = EvaluationService::new(SqliteEvaluationRepository::try_new(conn).unwrap());
    service
        .save_evaluation(evaluator, entry_number, institution, scores.0, scores.1, "ok")
        .unwrap()
}

fn stats(conn: &mut Connection, institution: &str) -> InstitutionStats {
    InstitutionService::new(SqliteInstitutionRepository::try_new(conn).unwrap())
        .get_institution_stats(institution)
}

fn totals(stats: &InstitutionStats) -> (f64, f64, i64) {
    (
        stats.cumulative_summary,
        stats.cumulative_tag,
        stats.total_evaluations,
    )
}

#[test]
fn walkthrough_new_edit_and_reset() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut entries = EntryService::new(SqliteEntryRepository::try_new(&mut conn).unwrap());
        let document = json!({"Event Number": "1", "Narrative": "leak"});
        let document = document.as_object().unwrap().clone();
        entries.save_entries("UAB", &[document]).unwrap();
        let found = entries.get_entries("uab");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event_number, "1");
    }

    let outcome = save(&mut conn, "eval1", "1", "uab", (4, 5));
    assert_eq!(outcome, EvaluationOutcome::Created);
    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));

    let outcome = save(&mut conn, "eval1", "1", "uab", (2, 5));
    assert_eq!(
        outcome,
        EvaluationOutcome::Edited {
            previous: Scores::new(4, 5)
        }
    );
    assert_eq!(totals(&stats(&mut conn, "uab")), (2.0, 5.0, 1));

    {
        let mut institutions =
            InstitutionService::new(SqliteInstitutionRepository::try_new(&mut conn).unwrap());
        let report = institutions.reset_institution("uab").unwrap();
        assert_eq!(report.entries_deleted, 1);
        assert_eq!(report.evaluations_deleted, 1);
        assert_eq!(report.stats_deleted, 1);
    }

    let entries = EntryService::new(SqliteEntryRepository::try_new(&mut conn).unwrap());
    assert!(entries.get_entries("uab").is_empty());
    drop(entries);
    assert_eq!(totals(&stats(&mut conn, "uab")), (0.0, 0.0, 0));
}

#[test]
fn new_evaluations_keep_running_totals_equal_to_row_sums() {
    let mut conn = open_db_in_memory().unwrap();
    let submissions = [
        ("eval1", "1", 4, 5),
        ("eval2", "1", 3, 2),
        ("eval1", "2", 5, 5),
        ("eval3", "7", 1, 0),
        ("eval2", "9", -2, 4),
    ];
    for (evaluator, entry_number, summary, tag) in submissions {
        let outcome = save(&mut conn, evaluator, entry_number, " UAB", (summary, tag));
        assert!(outcome.is_new());
    }

    let running = stats(&mut conn, "uab");
    let evaluations = EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap())
        .list_evaluations("uab");
    let summary_sum: i64 = evaluations.iter().map(|e| e.summary_score).sum();
    let tag_sum: i64 = evaluations.iter().map(|e| e.tag_score).sum();

    assert_eq!(evaluations.len(), submissions.len());
    assert_eq!(running.cumulative_summary, summary_sum as f64);
    assert_eq!(running.cumulative_tag, tag_sum as f64);
    assert_eq!(running.total_evaluations, evaluations.len() as i64);
}

#[test]
fn edits_move_totals_by_exact_difference() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    save(&mut conn, "eval2", "1", "uab", (3, 3));
    let before = stats(&mut conn, "uab");

    save(&mut conn, "eval2", "1", "UAB", (1, 4));
    let after = stats(&mut conn, "uab");

    assert_eq!(after.cumulative_summary - before.cumulative_summary, -2.0);
    assert_eq!(after.cumulative_tag - before.cumulative_tag, 1.0);
    assert_eq!(after.total_evaluations, before.total_evaluations);
}

#[test]
fn identical_resubmission_changes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    let outcome = save(&mut conn, "eval1", "1", "uab", (4, 5));

    assert!(!outcome.is_new());
    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));
}

#[test]
fn unknown_institution_stats_are_zero() {
    let mut conn = open_db_in_memory().unwrap();
    let empty = stats(&mut conn, "Nowhere General");

    assert_eq!(empty.institution, "nowhere general");
    assert_eq!(totals(&empty), (0.0, 0.0, 0));
    assert_eq!(empty.average_summary(), 0.0);
}

#[test]
fn institutions_keep_separate_totals() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    save(&mut conn, "eval1", "1", "mayo", (1, 1));
    save(&mut conn, "eval2", "1", "mayo", (2, 2));

    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));
    assert_eq!(totals(&stats(&mut conn, "mayo")), (3.0, 3.0, 2));
}

#[test]
fn failed_stats_update_rolls_back_evaluation_write() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    conn.execute_batch(
        "CREATE TEMP TRIGGER reject_second_evaluation
         BEFORE UPDATE ON institution_stats
         WHEN NEW.total_evaluations > 1
         BEGIN
            SELECT RAISE(ABORT, 'stats locked');
         END;",
    )
    .unwrap();

    let err = {
        let mut service =
            EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap());
        service
            .save_evaluation("eval2", "2", "UAB", 3, 3, "ok")
            .unwrap_err()
    };
    match err {
        RepoError::Write {
            operation,
            institution,
            key,
            ..
        } => {
            assert_eq!(operation, "save_evaluation");
            assert_eq!(institution, "uab");
            assert_eq!(key, "eval2/2");
        }
        other => panic!("unexpected error: {other}"),
    }

    let service = EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap());
    assert!(service.get_evaluation("eval2", "2", "uab").is_none());
    assert_eq!(service.list_evaluations("uab").len(), 1);
    drop(service);
    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));
}

#[test]
fn blank_evaluator_is_rejected_without_writes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap());

    let err = service
        .save_evaluation("  ", "1", "uab", 4, 5, "ok")
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::EmptyEvaluator)
    ));
    drop(service);
    assert_eq!(totals(&stats(&mut conn, "uab")), (0.0, 0.0, 0));
}

#[test]
fn evaluation_lookups_and_evaluator_aggregates() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    save(&mut conn, "eval1", "2", "uab", (2, 1));
    save(&mut conn, "eval1", "1", "mayo", (3, 3));
    save(&mut conn, "eval2", "1", "uab", (5, 5));

    let service = EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap());

    let found = service.get_evaluation("eval1", "1", " UAB ").unwrap();
    assert_eq!(found.institution, "uab");
    assert_eq!(found.scores(), Scores::new(4, 5));
    assert_eq!(found.feedback, "ok");
    assert!(service.get_evaluation("eval1", "3", "uab").is_none());
    assert!(service.get_evaluation("eval9", "1", "uab").is_none());

    let across = service.get_evaluations_by_evaluator("eval1", "1");
    let institutions: Vec<&str> = across.iter().map(|e| e.institution.as_str()).collect();
    assert_eq!(institutions, vec!["mayo", "uab"]);
    assert!(service.get_evaluations_by_evaluator("eval3", "1").is_empty());

    assert_eq!(service.count_evaluations_by_evaluator("eval1", "UAB"), 2);
    assert_eq!(service.count_evaluations_by_evaluator("eval1", "mayo"), 1);
    assert_eq!(service.count_evaluations_by_evaluator("eval3", "uab"), 0);

    let scoped = service.get_evaluator_stats("eval1", Some("uab"));
    assert_eq!(scoped.total_evaluations, 2);
    assert_eq!(scoped.average_summary_score, 3.0);
    assert_eq!(scoped.average_tag_score, 3.0);

    let global = service.get_evaluator_stats("eval1", None);
    assert_eq!(global.total_evaluations, 3);
    assert_eq!(global.average_summary_score, 3.0);

    let none = service.get_evaluator_stats("eval3", None);
    assert_eq!(none.total_evaluations, 0);
    assert_eq!(none.average_summary_score, 0.0);

    assert_eq!(
        service.list_evaluators(),
        vec!["eval1".to_string(), "eval2".to_string()]
    );
}

#[test]
fn audit_detects_drift_and_rebuild_repairs_it() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    save(&mut conn, "eval2", "1", "uab", (2, 3));
    conn.execute(
        "UPDATE institution_stats SET cumulative_summary = 99 WHERE institution = 'uab';",
        [],
    )
    .unwrap();

    let mut institutions =
        InstitutionService::new(SqliteInstitutionRepository::try_new(&mut conn).unwrap());
    let expected = institutions.audit_institution_stats("uab").unwrap().unwrap();
    assert_eq!(totals(&expected), (6.0, 8.0, 2));

    let rebuilt = institutions.rebuild_institution_stats("UAB").unwrap();
    assert_eq!(rebuilt, expected);
    assert!(institutions.audit_institution_stats("uab").unwrap().is_none());
    assert_eq!(totals(&institutions.get_institution_stats("uab")), (6.0, 8.0, 2));
}

#[test]
fn edit_with_missing_stats_row_rebuilds_it() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    save(&mut conn, "eval2", "1", "uab", (1, 1));
    conn.execute("DELETE FROM institution_stats;", []).unwrap();

    save(&mut conn, "eval1", "1", "uab", (2, 5));

    assert_eq!(totals(&stats(&mut conn, "uab")), (3.0, 6.0, 2));
}

#[test]
fn identical_resubmission_with_missing_stats_row_rebuilds_it() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    conn.execute("DELETE FROM institution_stats;", []).unwrap();

    let outcome = save(&mut conn, "eval1", "1", "uab", (4, 5));

    assert!(!outcome.is_new());
    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));
}

#[test]
fn reset_of_institution_without_data_reports_zero_counts() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "mayo", (4, 5));

    let mut institutions =
        InstitutionService::new(SqliteInstitutionRepository::try_new(&mut conn).unwrap());
    let report = institutions.reset_institution("uab").unwrap();
    assert_eq!(
        report,
        ResetReport {
            entries_deleted: 0,
            evaluations_deleted: 0,
            stats_deleted: 0,
        }
    );
    assert_eq!(report.total(), 0);
    assert_eq!(totals(&institutions.get_institution_stats("mayo")), (4.0, 5.0, 1));
}

#[test]
fn failed_reset_keeps_every_table_intact() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut entries = EntryService::new(SqliteEntryRepository::try_new(&mut conn).unwrap());
        let document = json!({"Event Number": "1", "Narrative": "leak"});
        entries
            .save_entries("uab", &[document.as_object().unwrap().clone()])
            .unwrap();
    }
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    conn.execute_batch(
        "CREATE TEMP TRIGGER keep_institution_stats
         BEFORE DELETE ON institution_stats
         BEGIN
            SELECT RAISE(ABORT, 'stats locked');
         END;",
    )
    .unwrap();

    let err = InstitutionService::new(SqliteInstitutionRepository::try_new(&mut conn).unwrap())
        .reset_institution("UAB")
        .unwrap_err();
    match err {
        RepoError::Write {
            operation,
            institution,
            ..
        } => {
            assert_eq!(operation, "reset_institution");
            assert_eq!(institution, "uab");
        }
        other => panic!("unexpected error: {other}"),
    }

    let entries = EntryService::new(SqliteEntryRepository::try_new(&mut conn).unwrap());
    assert_eq!(entries.get_entries("uab").len(), 1);
    drop(entries);
    let evaluations =
        EvaluationService::new(SqliteEvaluationRepository::try_new(&mut conn).unwrap());
    assert_eq!(evaluations.list_evaluations("uab").len(), 1);
    drop(evaluations);
    assert_eq!(totals(&stats(&mut conn, "uab")), (4.0, 5.0, 1));
}

#[test]
fn stats_read_failure_degrades_to_zero() {
    let mut conn = open_db_in_memory().unwrap();
    save(&mut conn, "eval1", "1", "uab", (4, 5));
    conn.execute_batch("ALTER TABLE institution_stats RENAME COLUMN cumulative_tag TO tag_total;")
        .unwrap();

    let repo = SqliteInstitutionRepository::try_new(&mut conn).unwrap();
    assert!(iroils_core::InstitutionRepository::get_institution_stats(&repo, "uab").is_err());
    let service = InstitutionService::new(repo);
    assert_eq!(totals(&service.get_institution_stats("uab")), (0.0, 0.0, 0));
}

#[test]
fn repository_reports_missing_rows_as_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEvaluationRepository::try_new(&mut conn).unwrap();

    assert!(repo.get_evaluation("eval1", "1", "uab").unwrap().is_none());
    assert_eq!(repo.count_evaluations_by_evaluator("eval1", "uab").unwrap(), 0);
    assert!(repo.list_evaluators().unwrap().is_empty());
}

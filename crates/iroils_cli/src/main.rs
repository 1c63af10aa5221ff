//! Operator CLI for the evaluation store.
//!
//! # Responsibility
//! - Provide a minimal executable to inspect and maintain a store file.
//! - Print machine-readable JSON so results can be piped into other tools.

use clap::{Parser, Subcommand};
use iroils_core::db::{open_db, Connection};
use iroils_core::{
    core_version, default_log_level, init_logging, EntryService, EntrySnapshot,
    EvaluationService, InstitutionService, SqliteEntryRepository, SqliteEvaluationRepository,
    SqliteInstitutionRepository,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "iroils",
    version,
    about = "Inspect and maintain an incident evaluation store"
)]
struct Cli {
    /// SQLite store file; created and initialized when missing.
    db_path: PathBuf,

    /// Absolute directory for rotating log files; logging is off when unset.
    #[arg(long, env = "IROILS_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the schema.
    Init,
    /// List distinct evaluator identities.
    Evaluators,
    /// Print running totals and averages.
    Stats { institution: String },
    /// Compare running totals against evaluation rows.
    Audit { institution: String },
    /// Recompute running totals from evaluation rows.
    Rebuild { institution: String },
    /// Delete all entries, evaluations and stats of an institution.
    Reset { institution: String },
    /// Count entries per selection status.
    Selected { institution: String },
    /// Write the institution's entry documents to a JSON file.
    Snapshot { institution: String, file: PathBuf },
    /// Upsert entry documents from a snapshot file into an institution.
    Restore { institution: String, file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = init_logging(default_log_level(), log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<serde_json::Value, String> {
    let mut conn = open_db(&cli.db_path)
        .map_err(|err| format!("cannot open `{}`: {err}", cli.db_path.display()))?;

    match cli.cmd {
        Command::Init => Ok(json!({ "status": "ok", "version": core_version() })),
        Command::Evaluators => {
            let service = EvaluationService::new(evaluation_repo(&mut conn)?);
            Ok(json!(service.list_evaluators()))
        }
        Command::Stats { institution } => {
            let service = InstitutionService::new(institution_repo(&mut conn)?);
            let stats = service.get_institution_stats(&institution);
            Ok(json!({
                "stats": stats,
                "average_summary": stats.average_summary(),
                "average_tag": stats.average_tag(),
            }))
        }
        Command::Audit { institution } => {
            let service = InstitutionService::new(institution_repo(&mut conn)?);
            let drift = service
                .audit_institution_stats(&institution)
                .map_err(|err| err.to_string())?;
            Ok(json!({ "consistent": drift.is_none(), "expected": drift }))
        }
        Command::Rebuild { institution } => {
            let mut service = InstitutionService::new(institution_repo(&mut conn)?);
            let stats = service
                .rebuild_institution_stats(&institution)
                .map_err(|err| err.to_string())?;
            Ok(json!(stats))
        }
        Command::Reset { institution } => {
            let mut service = InstitutionService::new(institution_repo(&mut conn)?);
            let report = service
                .reset_institution(&institution)
                .map_err(|err| err.to_string())?;
            Ok(json!(report))
        }
        Command::Selected { institution } => {
            let service = EntryService::new(entry_repo(&mut conn)?);
            Ok(json!(service.selected_status_counts(&institution)))
        }
        Command::Snapshot { institution, file } => {
            let service = EntryService::new(entry_repo(&mut conn)?);
            let snapshot = service
                .export_snapshot(&institution)
                .map_err(|err| err.to_string())?;
            let text = serde_json::to_string_pretty(&snapshot).map_err(|err| err.to_string())?;
            std::fs::write(&file, text)
                .map_err(|err| format!("cannot write `{}`: {err}", file.display()))?;
            Ok(json!({ "institution": snapshot.institution, "entries": snapshot.entries.len() }))
        }
        Command::Restore { institution, file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|err| format!("cannot read `{}`: {err}", file.display()))?;
            let snapshot: EntrySnapshot = serde_json::from_str(&text)
                .map_err(|err| format!("invalid snapshot `{}`: {err}", file.display()))?;
            let mut service = EntryService::new(entry_repo(&mut conn)?);
            let report = service
                .import_snapshot(&institution, &snapshot)
                .map_err(|err| err.to_string())?;
            Ok(json!(report))
        }
    }
}

fn entry_repo(conn: &mut Connection) -> Result<SqliteEntryRepository<'_>, String> {
    SqliteEntryRepository::try_new(conn).map_err(|err| err.to_string())
}

fn evaluation_repo(conn: &mut Connection) -> Result<SqliteEvaluationRepository<'_>, String> {
    SqliteEvaluationRepository::try_new(conn).map_err(|err| err.to_string())
}

fn institution_repo(conn: &mut Connection) -> Result<SqliteInstitutionRepository<'_>, String> {
    SqliteInstitutionRepository::try_new(conn).map_err(|err| err.to_string())
}

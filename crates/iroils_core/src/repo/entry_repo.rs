//! Entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert entry documents keyed by `(institution, event_number)`.
//! - Read documents back with normalized institution lookup.
//!
//! # Invariants
//! - Documents without an event number are skipped, never stored.
//! - `update_entry` never creates rows.
//! - `save_entries` and `save_entries_batch` leave identical table state for
//!   identical input, including duplicate keys (last document wins).

use crate::model::entry::{event_number_of, Entry, EntryDocument, NOT_SELECTED};
use crate::model::evaluation::ValidationError;
use crate::model::institution::normalize_institution;
use crate::repo::{ensure_tables_ready, RepoError, RepoResult};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Params, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// Rows per multi-row upsert statement in batch mode.
pub const ENTRY_BATCH_PAGE_SIZE: usize = 100;

const UPSERT_ENTRY_SQL: &str = "INSERT INTO entries (institution, event_number, data)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (institution, event_number) DO UPDATE
     SET data = excluded.data;";

// Non-text `Selected` values count as not selected, matching `Entry::selected`.
const SELECTED_STATUS_SQL: &str = "CASE
        WHEN json_type(data, '$.Selected') = 'text' THEN json_extract(data, '$.Selected')
        ELSE ?2
    END";

/// Outcome of a multi-entry save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEntriesReport {
    /// Documents written (inserted or replaced).
    pub saved: usize,
    /// Documents skipped for lacking an event number.
    pub skipped: usize,
}

/// Count of entries sharing one selection status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedStatusCount {
    pub status: String,
    pub count: i64,
}

/// Repository interface for entry documents.
pub trait EntryRepository {
    /// Upserts each document with its own statement inside one transaction.
    fn save_entries(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport>;
    /// Upserts all documents through paged multi-row statements.
    fn save_entries_batch(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport>;
    /// Replaces the document of an existing entry. Returns whether a row changed.
    fn update_entry(&self, institution: &str, document: &EntryDocument) -> RepoResult<bool>;
    fn get_entries(&self, institution: &str) -> RepoResult<Vec<Entry>>;
    fn get_entry(&self, institution: &str, event_number: &str) -> RepoResult<Option<Entry>>;
    /// Lists entries whose selection status is not [`NOT_SELECTED`].
    fn get_selected_entries(&self, institution: &str) -> RepoResult<Vec<Entry>>;
    fn selected_status_counts(&self, institution: &str) -> RepoResult<Vec<SelectedStatusCount>>;
}

/// SQLite-backed entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Constructs a repository from an initialized connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["entries"])?;
        Ok(Self { conn })
    }

    fn upsert_each(
        &mut self,
        institution: &str,
        keyed: &[(String, String)],
    ) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_ENTRY_SQL)?;
            for (event_number, data) in keyed {
                stmt.execute(params![institution, event_number, data])
                    .map_err(|err| {
                        RepoError::from(err).for_write(
                            "save_entries",
                            institution,
                            event_number.as_str(),
                        )
                    })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_pages(&mut self, institution: &str, keyed: &[(String, String)]) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for page in keyed.chunks(ENTRY_BATCH_PAGE_SIZE) {
            let placeholders = vec!["(?, ?, ?)"; page.len()].join(", ");
            let sql = format!(
                "INSERT INTO entries (institution, event_number, data)
                 VALUES {placeholders}
                 ON CONFLICT (institution, event_number) DO UPDATE
                 SET data = excluded.data;"
            );
            let mut bind_values: Vec<Value> = Vec::with_capacity(page.len() * 3);
            for (event_number, data) in page {
                bind_values.push(Value::Text(institution.to_string()));
                bind_values.push(Value::Text(event_number.clone()));
                bind_values.push(Value::Text(data.clone()));
            }
            tx.execute(&sql, params_from_iter(bind_values)).map_err(|err| {
                let first = page.first().map_or("", |(key, _)| key.as_str());
                let last = page.last().map_or("", |(key, _)| key.as_str());
                RepoError::from(err).for_write(
                    "save_entries_batch",
                    institution,
                    format!("{first}..{last}"),
                )
            })?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_entries<P: Params>(&self, sql: &str, bind: P) -> RepoResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn save_entries(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport> {
        let institution = normalized_institution_for_write(institution)?;
        let (keyed, report) = key_documents(&institution, documents)?;
        self.upsert_each(&institution, &keyed)
            .map_err(|err| err.for_write("save_entries", &institution, "*"))?;
        Ok(report)
    }

    fn save_entries_batch(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport> {
        let institution = normalized_institution_for_write(institution)?;
        let (keyed, report) = key_documents(&institution, documents)?;
        self.upsert_pages(&institution, &keyed)
            .map_err(|err| err.for_write("save_entries_batch", &institution, "*"))?;
        Ok(report)
    }

    fn update_entry(&self, institution: &str, document: &EntryDocument) -> RepoResult<bool> {
        let institution = normalized_institution_for_write(institution)?;
        let Some(event_number) = event_number_of(document) else {
            warn!(
                "event=entry_update module=repo status=skipped reason=missing_event_number institution={}",
                institution
            );
            return Ok(false);
        };
        let data = encode_document(document)?;

        let changed = self
            .conn
            .execute(
                "UPDATE entries
                 SET data = ?3
                 WHERE institution = ?1
                   AND event_number = ?2;",
                params![institution, event_number, data],
            )
            .map_err(|err| {
                RepoError::from(err).for_write("update_entry", &institution, event_number.as_str())
            })?;

        Ok(changed > 0)
    }

    fn get_entries(&self, institution: &str) -> RepoResult<Vec<Entry>> {
        self.query_entries(
            "SELECT institution, event_number, data
             FROM entries
             WHERE institution = ?1
             ORDER BY id ASC;",
            params![normalize_institution(institution)],
        )
    }

    fn get_entry(&self, institution: &str, event_number: &str) -> RepoResult<Option<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT institution, event_number, data
             FROM entries
             WHERE institution = ?1
               AND event_number = ?2;",
        )?;
        let mut rows = stmt.query(params![normalize_institution(institution), event_number])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn get_selected_entries(&self, institution: &str) -> RepoResult<Vec<Entry>> {
        self.query_entries(
            &format!(
                "SELECT institution, event_number, data
                 FROM entries
                 WHERE institution = ?1
                   AND ({SELECTED_STATUS_SQL}) != ?2
                 ORDER BY id ASC;"
            ),
            params![normalize_institution(institution), NOT_SELECTED],
        )
    }

    fn selected_status_counts(&self, institution: &str) -> RepoResult<Vec<SelectedStatusCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECTED_STATUS_SQL} AS status, COUNT(*) AS count
             FROM entries
             WHERE institution = ?1
             GROUP BY status
             ORDER BY status ASC;"
        ))?;
        let mut rows = stmt.query(params![normalize_institution(institution), NOT_SELECTED])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            counts.push(SelectedStatusCount {
                status: row.get("status")?,
                count: row.get("count")?,
            });
        }
        Ok(counts)
    }
}

fn normalized_institution_for_write(institution: &str) -> RepoResult<String> {
    let normalized = normalize_institution(institution);
    if normalized.is_empty() {
        return Err(ValidationError::EmptyInstitution.into());
    }
    Ok(normalized)
}

/// Pairs each storable document with its key and encoded JSON text.
fn key_documents(
    institution: &str,
    documents: &[EntryDocument],
) -> RepoResult<(Vec<(String, String)>, SaveEntriesReport)> {
    let mut keyed = Vec::with_capacity(documents.len());
    let mut report = SaveEntriesReport::default();
    for (index, document) in documents.iter().enumerate() {
        match event_number_of(document) {
            Some(event_number) => {
                keyed.push((event_number, encode_document(document)?));
                report.saved += 1;
            }
            None => {
                warn!(
                    "event=entry_save module=repo status=skipped reason=missing_event_number institution={} index={}",
                    institution, index
                );
                report.skipped += 1;
            }
        }
    }
    Ok((keyed, report))
}

fn encode_document(document: &EntryDocument) -> RepoResult<String> {
    serde_json::to_string(document)
        .map_err(|err| RepoError::InvalidData(format!("entry document is not serializable: {err}")))
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let event_number: String = row.get("event_number")?;
    let data_text: String = row.get("data")?;
    let data = match serde_json::from_str(&data_text) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => {
            return Err(RepoError::InvalidData(format!(
                "entries.data for event `{event_number}` is not a JSON object"
            )));
        }
        Err(err) => {
            return Err(RepoError::InvalidData(format!(
                "entries.data for event `{event_number}` is not valid JSON: {err}"
            )));
        }
    };

    Ok(Entry {
        institution: row.get("institution")?,
        event_number,
        data,
    })
}

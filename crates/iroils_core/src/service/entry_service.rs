//! Entry use-case service.
//!
//! # Responsibility
//! - Store uploaded or edited entry documents.
//! - Serve entry lists to dashboards with the default-on-error read policy.
//! - Export and restore institution snapshots.

use crate::model::entry::{Entry, EntryDocument, EntrySnapshot};
use crate::model::institution::normalize_institution;
use crate::repo::entry_repo::{EntryRepository, SaveEntriesReport, SelectedStatusCount};
use crate::repo::RepoResult;
use crate::service::read_or_default;
use log::{debug, info};

/// Use-case service wrapper for entry persistence.
pub struct EntryService<R: EntryRepository> {
    repo: R,
}

impl<R: EntryRepository> EntryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Upserts documents one statement at a time; see [`EntryRepository::save_entries`].
    pub fn save_entries(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport> {
        let report = self.repo.save_entries(institution, documents)?;
        info!(
            "event=entries_save module=service status=ok mode=single institution={} saved={} skipped={}",
            normalize_institution(institution),
            report.saved,
            report.skipped
        );
        Ok(report)
    }

    /// Upserts documents through paged bulk statements.
    ///
    /// Resulting rows are identical to [`Self::save_entries`] on the same input.
    pub fn save_entries_batch(
        &mut self,
        institution: &str,
        documents: &[EntryDocument],
    ) -> RepoResult<SaveEntriesReport> {
        let report = self.repo.save_entries_batch(institution, documents)?;
        info!(
            "event=entries_save module=service status=ok mode=batch institution={} saved={} skipped={}",
            normalize_institution(institution),
            report.saved,
            report.skipped
        );
        Ok(report)
    }

    /// Replaces the document of an existing entry.
    ///
    /// Returns `Ok(false)` when no such entry exists; nothing is created.
    pub fn update_entry(&self, institution: &str, document: &EntryDocument) -> RepoResult<bool> {
        let updated = self.repo.update_entry(institution, document)?;
        debug!(
            "event=entry_update module=service status=ok institution={} updated={}",
            normalize_institution(institution),
            updated
        );
        Ok(updated)
    }

    /// All entries of the institution; empty on read failure.
    pub fn get_entries(&self, institution: &str) -> Vec<Entry> {
        read_or_default(
            "entries_get",
            institution,
            self.repo.get_entries(institution),
            Vec::new,
        )
    }

    /// All entry documents of the institution; empty on read failure.
    pub fn get_documents(&self, institution: &str) -> Vec<EntryDocument> {
        self.get_entries(institution)
            .into_iter()
            .map(|entry| entry.data)
            .collect()
    }

    /// Copies every entry document of the institution.
    ///
    /// Unlike the listing reads, a read failure is returned so a snapshot is
    /// never silently empty.
    pub fn export_snapshot(&self, institution: &str) -> RepoResult<EntrySnapshot> {
        let institution = normalize_institution(institution);
        let entries: Vec<EntryDocument> = self
            .repo
            .get_entries(&institution)?
            .into_iter()
            .map(|entry| entry.data)
            .collect();
        info!(
            "event=entries_snapshot_export module=service status=ok institution={} entries={}",
            institution,
            entries.len()
        );
        Ok(EntrySnapshot {
            institution,
            entries,
        })
    }

    /// Loads snapshot documents into `institution` through the batch upsert.
    ///
    /// The target may differ from the institution the snapshot was taken from.
    pub fn import_snapshot(
        &mut self,
        institution: &str,
        snapshot: &EntrySnapshot,
    ) -> RepoResult<SaveEntriesReport> {
        let report = self.repo.save_entries_batch(institution, &snapshot.entries)?;
        info!(
            "event=entries_snapshot_import module=service status=ok institution={} source={} saved={} skipped={}",
            normalize_institution(institution),
            snapshot.institution,
            report.saved,
            report.skipped
        );
        Ok(report)
    }

    pub fn get_entry(&self, institution: &str, event_number: &str) -> Option<Entry> {
        read_or_default(
            "entry_get",
            institution,
            self.repo.get_entry(institution, event_number),
            || None,
        )
    }

    pub fn get_selected_entries(&self, institution: &str) -> Vec<Entry> {
        read_or_default(
            "entries_selected_get",
            institution,
            self.repo.get_selected_entries(institution),
            Vec::new,
        )
    }

    pub fn selected_status_counts(&self, institution: &str) -> Vec<SelectedStatusCount> {
        let counts = read_or_default(
            "entries_selected_status",
            institution,
            self.repo.selected_status_counts(institution),
            Vec::new,
        );
        for count in &counts {
            debug!(
                "event=entries_selected_status module=service status=ok institution={} selected={} count={}",
                normalize_institution(institution),
                count.status,
                count.count
            );
        }
        counts
    }
}

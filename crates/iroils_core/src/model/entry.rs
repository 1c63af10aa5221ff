//! Entry (incident record) model.
//!
//! # Responsibility
//! - Carry the opaque entry document and its extracted key.
//!
//! # Invariants
//! - `event_number` always equals the document's `"Event Number"` rendering.
//! - The document is schema-on-read: fields other than the event number and
//!   the selection status are never inspected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-defined entry document (narrative, tags, selection status, ...).
pub type EntryDocument = Map<String, Value>;

/// Document field mirrored into the `event_number` key column.
pub const EVENT_NUMBER_FIELD: &str = "Event Number";
/// Document field holding the selection status.
pub const SELECTED_FIELD: &str = "Selected";
/// Selection status assumed when a document carries none.
pub const NOT_SELECTED: &str = "Do Not Select";

/// One stored incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Normalized institution name.
    pub institution: String,
    /// Key within the institution, mirrored from the document.
    pub event_number: String,
    /// Full document as uploaded or last edited.
    pub data: EntryDocument,
}

impl Entry {
    /// Returns the document's selection status, defaulting to [`NOT_SELECTED`].
    pub fn selected(&self) -> &str {
        self.data
            .get(SELECTED_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(NOT_SELECTED)
    }

    pub fn is_selected(&self) -> bool {
        self.selected() != NOT_SELECTED
    }
}

/// Portable copy of one institution's entry documents.
///
/// Restoring goes through the regular upsert path, so loading a snapshot over
/// existing rows replaces matching event numbers and keeps the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Normalized institution the documents were exported from.
    pub institution: String,
    pub entries: Vec<EntryDocument>,
}

/// Extracts the event number key from an entry document.
///
/// Strings are used verbatim unless blank; integers and floats use their JSON
/// text. Any other shape, or a missing field, yields `None`.
pub fn event_number_of(document: &EntryDocument) -> Option<String> {
    match document.get(EVENT_NUMBER_FIELD)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

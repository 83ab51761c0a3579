//! Typed key/value channel over the catalog item's note list.
//!
//! The catalog has no custom-field mechanism, so a handful of configured note
//! types carry machine-readable values: the workflow correlation key, the
//! requesting patron and a legacy usage count. All reads and writes of those
//! values go through [`NoteChannel`]; business logic never scans notes itself.

use crate::model::ItemRecord;
use serde_json::{Map, Value};

const NOTE_TYPE_FIELD: &str = "itemNoteTypeId";
const NOTE_TEXT_FIELD: &str = "note";
const STAFF_ONLY_FIELD: &str = "staffOnly";

/// The kinds of value carried in item notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    /// Workflow correlation key of an item awaiting a decision.
    Correlation,
    /// Username of the patron who asked for the replacement.
    PatronRequesting,
    /// Usage count carried over from a previous system.
    LegacyUsage,
    /// Free-text lifecycle comments (decision notes).
    Comment,
}

/// Maps each [`NoteKind`] to the catalog note type that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChannel {
    correlation: String,
    patron_requesting: String,
    comment: String,
    legacy_usage: Option<String>,
}

impl NoteChannel {
    /// Create a channel from the configured note type identifiers.
    #[must_use]
    pub const fn new(
        correlation: String,
        patron_requesting: String,
        comment: String,
        legacy_usage: Option<String>,
    ) -> Self {
        Self {
            correlation,
            patron_requesting,
            comment,
            legacy_usage,
        }
    }

    /// Note type identifier for a kind, if one is configured.
    #[must_use]
    pub fn type_id(&self, kind: NoteKind) -> Option<&str> {
        match kind {
            NoteKind::Correlation => Some(&self.correlation),
            NoteKind::PatronRequesting => Some(&self.patron_requesting),
            NoteKind::Comment => Some(&self.comment),
            NoteKind::LegacyUsage => self.legacy_usage.as_deref(),
        }
    }

    /// Text of the first note of this kind.
    #[must_use]
    pub fn read<'a>(&self, item: &'a ItemRecord, kind: NoteKind) -> Option<&'a str> {
        let type_id = self.type_id(kind)?;
        item.notes()
            .iter()
            .find(|note| note_type(note) == Some(type_id))
            .and_then(|note| note.get(NOTE_TEXT_FIELD))
            .and_then(Value::as_str)
    }

    /// Number of notes of this kind.
    #[must_use]
    pub fn count(&self, item: &ItemRecord, kind: NoteKind) -> usize {
        self.type_id(kind).map_or(0, |type_id| {
            item.notes()
                .iter()
                .filter(|note| note_type(note) == Some(type_id))
                .count()
        })
    }

    /// Set the single value of this kind, replacing any existing notes of it.
    ///
    /// Returns `false` when no note type is configured for the kind.
    pub fn write_unique(&self, item: &mut ItemRecord, kind: NoteKind, value: &str) -> bool {
        if self.clear(item, kind).is_none() {
            return false;
        }
        self.append(item, kind, value)
    }

    /// Append a staff-only note of this kind without touching existing ones.
    ///
    /// Returns `false` when no note type is configured for the kind.
    pub fn append(&self, item: &mut ItemRecord, kind: NoteKind, text: &str) -> bool {
        let Some(type_id) = self.type_id(kind) else {
            return false;
        };
        let mut note = Map::new();
        note.insert(NOTE_TYPE_FIELD.to_string(), Value::String(type_id.to_string()));
        note.insert(NOTE_TEXT_FIELD.to_string(), Value::String(text.to_string()));
        note.insert(STAFF_ONLY_FIELD.to_string(), Value::Bool(true));
        item.edit_notes(|notes| notes.push(Value::Object(note)));
        true
    }

    /// Remove every note of this kind.
    ///
    /// Returns the number removed, or `None` when no note type is configured.
    pub fn clear(&self, item: &mut ItemRecord, kind: NoteKind) -> Option<usize> {
        let type_id = self.type_id(kind)?.to_string();
        let removed = item.edit_notes(|notes| {
            let before = notes.len();
            notes.retain(|note| note_type(note) != Some(type_id.as_str()));
            before - notes.len()
        });
        Some(removed)
    }
}

fn note_type(note: &Value) -> Option<&str> {
    note.get(NOTE_TYPE_FIELD).and_then(Value::as_str)
}

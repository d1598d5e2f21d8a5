//! Annotation data model.
//!
//! The stored JSON shape is shared with existing extension data:
//! `{id, text, note, timestamp, contextBefore, contextAfter}`, where `note` is
//! `""` for an unconfirmed highlight and `" "` for a note saved blank.
//! In memory that encoding is replaced by [`NoteState`].

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// Opaque annotation id. Also the value of the highlight element's join attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(SmolStr);

impl AnnotationId {
    const SUFFIX_ALPHABET: &'static [u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    const SUFFIX_LEN: usize = 9;

    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id of the form `anno_<unix millis>_<9 base36 chars>`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..Self::SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..Self::SUFFIX_ALPHABET.len());
                Self::SUFFIX_ALPHABET[idx] as char
            })
            .collect();
        Self(format_smolstr!("anno_{}_{}", now.timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

/// Whether the reader has confirmed the note yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NoteState {
    /// Highlight exists but the note was never saved. Dropped on abandon.
    #[default]
    Pending,
    /// Saved, possibly with empty text.
    Saved(String),
}

impl NoteState {
    pub fn is_pending(&self) -> bool {
        matches!(self, NoteState::Pending)
    }

    /// Note text for display. Empty for pending and blank notes.
    pub fn text(&self) -> &str {
        match self {
            NoteState::Pending => "",
            NoteState::Saved(text) => text,
        }
    }

    /// Legacy string encoding.
    fn to_wire(&self) -> &str {
        match self {
            NoteState::Pending => "",
            NoteState::Saved(text) if text.trim().is_empty() => " ",
            NoteState::Saved(text) => text,
        }
    }

    fn from_wire(s: String) -> Self {
        if s.is_empty() {
            NoteState::Pending
        } else if s.trim().is_empty() {
            NoteState::Saved(String::new())
        } else {
            NoteState::Saved(s)
        }
    }
}

impl Serialize for NoteState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for NoteState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(NoteState::from_wire)
    }
}

/// One highlighted quotation and its note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    /// Quotation exactly as selected. Never normalized, never edited.
    pub text: String,
    pub note: NoteState,
    /// Creation time, bumped on every save.
    pub timestamp: DateTime<Utc>,
    /// Normalized page text just before the quotation at creation time.
    #[serde(default)]
    pub context_before: String,
    /// Normalized page text just after the quotation at creation time.
    #[serde(default)]
    pub context_after: String,
}

impl Annotation {
    pub fn pending(
        id: AnnotationId,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        context_before: impl Into<String>,
        context_after: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            note: NoteState::Pending,
            timestamp,
            context_before: context_before.into(),
            context_after: context_after.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.note.is_pending()
    }
}

/// All annotations for one page, in insertion order.
///
/// Ids are unique and at most one entry is pending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet(Vec<Annotation>);

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.0.iter()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.0.iter().find(|a| &a.id == id)
    }

    pub fn get_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        self.0.iter_mut().find(|a| &a.id == id)
    }

    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.get(id).is_some()
    }

    /// Add an annotation, replacing any entry with the same id.
    ///
    /// Returns the pending annotation that had to be evicted to keep at most
    /// one pending entry, if any.
    pub fn insert(&mut self, annotation: Annotation) -> Option<Annotation> {
        let evicted = if annotation.is_pending() {
            self.pending()
                .filter(|p| p.id != annotation.id)
                .map(|p| p.id.clone())
                .and_then(|id| self.remove(&id))
        } else {
            None
        };

        match self.get_mut(&annotation.id) {
            Some(existing) => *existing = annotation,
            None => self.0.push(annotation),
        }
        evicted
    }

    pub fn remove(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let idx = self.0.iter().position(|a| &a.id == id)?;
        Some(self.0.remove(idx))
    }

    /// The unconfirmed annotation, if one exists.
    pub fn pending(&self) -> Option<&Annotation> {
        self.0.iter().find(|a| a.is_pending())
    }

    /// The set as it should be written to storage: everything but the pending entry.
    pub fn persisted(&self) -> AnnotationSet {
        AnnotationSet(self.0.iter().filter(|a| !a.is_pending()).cloned().collect())
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        let mut set = AnnotationSet::new();
        for annotation in iter {
            set.insert(annotation);
        }
        set
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

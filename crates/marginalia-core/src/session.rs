//! Per-page annotation state and the user actions that change it.
//!
//! One [`AnnotationSession`] lives as long as the page. It owns the page's
//! annotation set and tracks which popup, if any, is showing. DOM and storage
//! are passed in per call so the session stays host-agnostic.
//!
//! Mutating actions come in two halves: a synchronous step that updates the
//! set and the tree and hands back a [`PendingWrite`], and the async commit of
//! that write. Hosts that keep the session behind a `RefCell` can drop the
//! borrow before awaiting storage.

use chrono::{DateTime, Utc};

use crate::annotation::{Annotation, AnnotationId, AnnotationSet, NoteState};
use crate::config::OverlayConfig;
use crate::dom::{ContentFilter, DomRange, HighlightDom};
use crate::error::{AnnotateError, StoreError};
use crate::highlight::{self, RestoreReport};
use crate::index::TextIndex;
use crate::store::{AnnotationStore, load_page_annotations, save_page_annotations};

/// Which popup the reader currently has open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    None,
    /// Note input is open for a new or edited annotation.
    Creating(AnnotationId),
    /// A saved note is being displayed.
    Viewing(AnnotationId),
}

/// Snapshot of the set to persist after a mutation.
#[derive(Debug, Clone)]
#[must_use = "the change is not stored until the write is committed"]
pub struct PendingWrite {
    pub page_url: String,
    pub annotations: AnnotationSet,
}

impl PendingWrite {
    pub async fn commit<S: AnnotationStore>(self, store: &S) -> Result<(), StoreError> {
        save_page_annotations(store, &self.page_url, &self.annotations).await
    }
}

/// Annotation state for one page.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    page_url: String,
    annotations: AnnotationSet,
    view: ViewMode,
    config: OverlayConfig,
    filter: ContentFilter,
    clock: fn() -> DateTime<Utc>,
}

impl AnnotationSession {
    pub fn new(page_url: impl Into<String>, config: OverlayConfig) -> Self {
        let filter = ContentFilter::new(config.excluded_tags.iter().cloned());
        Self {
            page_url: page_url.into(),
            annotations: AnnotationSet::new(),
            view: ViewMode::None,
            config,
            filter,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, for deterministic ids and timestamps.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    pub fn view_mode(&self) -> &ViewMode {
        &self.view
    }

    pub fn is_viewing(&self) -> bool {
        matches!(self.view, ViewMode::Viewing(_))
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Adopt a set loaded elsewhere. Any current pending entry is dropped.
    pub fn set_annotations(&mut self, annotations: AnnotationSet) {
        self.annotations = annotations;
    }

    /// Load this page's annotations from `store`. Returns how many were found.
    pub async fn load<S: AnnotationStore>(&mut self, store: &S) -> Result<usize, StoreError> {
        let set = load_page_annotations(store, &self.page_url).await?;
        let count = set.len();
        self.set_annotations(set);
        Ok(count)
    }

    /// Re-anchor every annotation onto the current tree.
    pub fn restore<D: HighlightDom>(&self, dom: &mut D) -> RestoreReport {
        if self.annotations.is_empty() {
            return RestoreReport::default();
        }
        highlight::restore(dom, &self.annotations, &self.filter, &self.config.locator)
    }

    /// Highlight the reader's selection as a new pending annotation.
    ///
    /// The range is wrapped directly; it is not re-located. Surrounding text is
    /// captured from the index so it matches what restore will search later.
    /// An existing pending annotation is discarded.
    pub fn create_from_selection<D: HighlightDom>(
        &mut self,
        dom: &mut D,
        range: &DomRange<D::Node>,
        selected_text: &str,
    ) -> Result<AnnotationId, AnnotateError> {
        let text = selected_text.trim();
        if text.is_empty() {
            return Err(AnnotateError::EmptySelection);
        }

        let (context_before, context_after) = self.capture_context(dom, range);
        let now = (self.clock)();
        let id = AnnotationId::generate(now);

        if let Err(e) = dom.wrap_range(range, &id) {
            tracing::warn!(error = %e, "session: could not highlight selection");
            return Err(e.into());
        }

        let annotation = Annotation::pending(id.clone(), text, now, context_before, context_after);
        if let Some(evicted) = self.annotations.insert(annotation) {
            tracing::debug!(id = %evicted.id, "session: discarding previous unsaved highlight");
            dom.unwrap_highlight(&evicted.id);
        }
        self.view = ViewMode::Creating(id.clone());
        Ok(id)
    }

    fn capture_context<D: HighlightDom>(
        &self,
        dom: &D,
        range: &DomRange<D::Node>,
    ) -> (String, String) {
        let Some(root) = dom.content_root() else {
            return Default::default();
        };
        let index = TextIndex::build(dom, &root, &self.filter);
        let (Some(mut start), Some(mut end)) = (
            index.normalized_position(&range.start_node, range.start_offset),
            index.normalized_position(&range.end_node, range.end_offset),
        ) else {
            tracing::debug!("session: selection outside indexed text, no context captured");
            return Default::default();
        };

        // Align with the trimmed quotation.
        let selected = index.slice(start..end);
        if selected.starts_with(' ') {
            start += 1;
        }
        if selected.ends_with(' ') && end > start {
            end -= 1;
        }

        let n = self.config.context_chars;
        (
            index.slice(start.saturating_sub(n)..start),
            index.slice(end..end + n),
        )
    }

    /// Record `note` for `id`. Blank notes are saved as empty but confirmed.
    pub fn set_note(
        &mut self,
        id: &AnnotationId,
        note: &str,
    ) -> Result<PendingWrite, AnnotateError> {
        let now = (self.clock)();
        let annotation = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| AnnotateError::UnknownAnnotation(id.clone()))?;
        annotation.note = if note.trim().is_empty() {
            NoteState::Saved(String::new())
        } else {
            NoteState::Saved(note.to_string())
        };
        annotation.timestamp = now;
        self.view = ViewMode::None;
        Ok(self.pending_write())
    }

    /// [`set_note`](Self::set_note) and persist the whole set.
    pub async fn save_note<S: AnnotationStore>(
        &mut self,
        id: &AnnotationId,
        note: &str,
        store: &S,
    ) -> Result<(), AnnotateError> {
        self.set_note(id, note)?.commit(store).await?;
        Ok(())
    }

    /// Close the note input. Removes the annotation only if it was never saved.
    ///
    /// Returns whether anything was removed.
    pub fn cancel_note<D: HighlightDom>(&mut self, id: &AnnotationId, dom: &mut D) -> bool {
        self.view = ViewMode::None;
        if !self.annotations.get(id).is_some_and(Annotation::is_pending) {
            return false;
        }
        self.annotations.remove(id);
        dom.unwrap_highlight(id);
        true
    }

    /// Show the note for `id`.
    pub fn open_viewer(&mut self, id: &AnnotationId) -> Result<&Annotation, AnnotateError> {
        let annotation = self
            .annotations
            .get(id)
            .ok_or_else(|| AnnotateError::UnknownAnnotation(id.clone()))?;
        self.view = ViewMode::Viewing(id.clone());
        Ok(annotation)
    }

    /// Switch from viewing to editing the note for `id`.
    pub fn begin_edit(&mut self, id: &AnnotationId) -> Result<&Annotation, AnnotateError> {
        let annotation = self
            .annotations
            .get(id)
            .ok_or_else(|| AnnotateError::UnknownAnnotation(id.clone()))?;
        self.view = ViewMode::Creating(id.clone());
        Ok(annotation)
    }

    pub fn close_viewer(&mut self) {
        self.view = ViewMode::None;
    }

    /// Remove `id` from the set and the tree.
    pub fn remove<D: HighlightDom>(
        &mut self,
        id: &AnnotationId,
        dom: &mut D,
    ) -> Result<PendingWrite, AnnotateError> {
        self.annotations
            .remove(id)
            .ok_or_else(|| AnnotateError::UnknownAnnotation(id.clone()))?;
        dom.unwrap_highlight(id);
        self.view = ViewMode::None;
        Ok(self.pending_write())
    }

    /// [`remove`](Self::remove) and persist the remaining set.
    pub async fn delete<D: HighlightDom, S: AnnotationStore>(
        &mut self,
        id: &AnnotationId,
        dom: &mut D,
        store: &S,
    ) -> Result<(), AnnotateError> {
        self.remove(id, dom)?.commit(store).await?;
        Ok(())
    }

    /// The reader clicked somewhere that is not a popup, button or highlight.
    ///
    /// Drops the unsaved highlight unless a saved note was on display.
    pub fn click_outside<D: HighlightDom>(&mut self, dom: &mut D) -> Option<AnnotationId> {
        let was_viewing = self.is_viewing();
        self.view = ViewMode::None;
        if was_viewing {
            return None;
        }
        self.remove_unsaved_annotation(dom)
    }

    /// Remove the pending annotation and its highlight, if there is one.
    pub fn remove_unsaved_annotation<D: HighlightDom>(
        &mut self,
        dom: &mut D,
    ) -> Option<AnnotationId> {
        let id = self.annotations.pending()?.id.clone();
        self.annotations.remove(&id);
        dom.unwrap_highlight(&id);
        tracing::debug!(%id, "session: removed unsaved highlight");
        Some(id)
    }

    fn pending_write(&self) -> PendingWrite {
        PendingWrite {
            page_url: self.page_url.clone(),
            annotations: self.annotations.persisted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::dom::DomTree;
    use crate::memory::{MemoryDom, NodeId};
    use crate::store::MemoryStore;

    const URL: &str = "https://example.com/story?ref=home";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn session() -> AnnotationSession {
        AnnotationSession::new(URL, OverlayConfig::default()).with_clock(fixed_now)
    }

    fn select(dom: &MemoryDom, needle: &str) -> DomRange<NodeId> {
        let node = dom.find_text(needle).unwrap();
        let text = dom.text(&node);
        let start = text[..text.find(needle).unwrap()].chars().count();
        DomRange::new(node, start, node, start + needle.chars().count())
    }

    fn page() -> MemoryDom {
        MemoryDom::from_html(
            "<article><p>The first sentence. The second sentence holds the quote.</p></article>",
        )
    }

    #[test]
    fn test_create_captures_context() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "second sentence");
        let id = s
            .create_from_selection(&mut dom, &range, " second sentence ")
            .unwrap();

        let anno = s.get(&id).unwrap();
        assert_eq!(anno.text, "second sentence");
        assert!(anno.is_pending());
        assert_eq!(anno.context_before, "The first sentence. The ");
        assert_eq!(anno.context_after, " holds the quote.");
        assert_eq!(s.view_mode(), &ViewMode::Creating(id.clone()));
        assert_eq!(dom.count_highlights(&id), 1);
    }

    #[test]
    fn test_context_is_bounded() {
        let mut dom = page();
        let mut s = AnnotationSession::new(
            URL,
            OverlayConfig {
                context_chars: 4,
                ..Default::default()
            },
        );
        let range = select(&dom, "holds");
        let id = s.create_from_selection(&mut dom, &range, "holds").unwrap();
        let anno = s.get(&id).unwrap();
        assert_eq!(anno.context_before, "nce ");
        assert_eq!(anno.context_after, " the");
    }

    #[test]
    fn test_blank_selection_rejected() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "first");
        let err = s.create_from_selection(&mut dom, &range, "  \n ").unwrap_err();
        assert!(matches!(err, AnnotateError::EmptySelection));
        assert!(s.annotations().is_empty());
    }

    #[test]
    fn test_wrap_failure_adds_nothing() {
        let mut dom = page();
        let mut s = session();
        let node = dom.find_text("first").unwrap();
        let range = DomRange::new(node, 10, node, 3);
        let err = s.create_from_selection(&mut dom, &range, "oops").unwrap_err();
        assert!(matches!(err, AnnotateError::Dom(_)));
        assert!(s.annotations().is_empty());
        assert_eq!(s.view_mode(), &ViewMode::None);
    }

    #[test]
    fn test_new_selection_discards_previous_pending() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "first");
        let first = s.create_from_selection(&mut dom, &range, "first").unwrap();
        let range = select(&dom, "quote");
        let second = s.create_from_selection(&mut dom, &range, "quote").unwrap();

        assert_eq!(s.annotations().len(), 1);
        assert!(s.get(&first).is_none());
        assert_eq!(dom.highlight_ids(), vec![second]);
    }

    #[test]
    fn test_blank_note_is_saved_not_pending() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "first");
        let id = s.create_from_selection(&mut dom, &range, "first").unwrap();

        let write = s.set_note(&id, "   ").unwrap();
        assert_eq!(write.annotations.len(), 1);
        assert_eq!(s.get(&id).unwrap().note, NoteState::Saved(String::new()));

        assert_eq!(s.remove_unsaved_annotation(&mut dom), None);
        assert_eq!(s.click_outside(&mut dom), None);
        assert!(s.get(&id).is_some());
        assert_eq!(dom.count_highlights(&id), 1);
    }

    #[test]
    fn test_cancel_only_removes_pending() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "first");
        let id = s.create_from_selection(&mut dom, &range, "first").unwrap();
        let _ = s.set_note(&id, "kept").unwrap();

        s.begin_edit(&id).unwrap();
        assert!(!s.cancel_note(&id, &mut dom));
        assert!(s.get(&id).is_some());

        let range = select(&dom, "quote");
        let pending = s.create_from_selection(&mut dom, &range, "quote").unwrap();
        assert!(s.cancel_note(&pending, &mut dom));
        assert!(s.get(&pending).is_none());
        assert_eq!(dom.count_highlights(&pending), 0);
    }

    #[test]
    fn test_click_outside_while_viewing_keeps_pending() {
        let mut dom = page();
        let mut s = session();
        let range = select(&dom, "first");
        let saved = s.create_from_selection(&mut dom, &range, "first").unwrap();
        let _ = s.set_note(&saved, "n").unwrap();
        let range = select(&dom, "quote");
        let pending = s.create_from_selection(&mut dom, &range, "quote").unwrap();

        s.open_viewer(&saved).unwrap();
        assert!(s.is_viewing());
        assert_eq!(s.click_outside(&mut dom), None);
        assert_eq!(s.view_mode(), &ViewMode::None);
        assert!(s.get(&pending).is_some());

        assert_eq!(s.click_outside(&mut dom), Some(pending.clone()));
        assert!(s.get(&pending).is_none());
    }

    #[test]
    fn test_unknown_ids() {
        let mut s = session();
        let missing = AnnotationId::from("missing");
        assert!(matches!(
            s.open_viewer(&missing),
            Err(AnnotateError::UnknownAnnotation(_))
        ));
        assert!(matches!(
            s.set_note(&missing, "x"),
            Err(AnnotateError::UnknownAnnotation(_))
        ));
    }

    #[tokio::test]
    async fn test_save_then_delete_round_trip() {
        let mut dom = page();
        let store = MemoryStore::new();
        let mut s = session();
        let range = select(&dom, "first");
        let id = s.create_from_selection(&mut dom, &range, "first").unwrap();
        s.save_note(&id, "note A", &store).await.unwrap();

        let mut reloaded = session();
        assert_eq!(reloaded.load(&store).await.unwrap(), 1);
        assert_eq!(reloaded.get(&id).unwrap().note.text(), "note A");

        s.delete(&id, &mut dom, &store).await.unwrap();
        assert!(dom.highlight_ids().is_empty());
        assert_eq!(reloaded.load(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_failure_surfaces() {
        let mut dom = page();
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut s = session();
        let range = select(&dom, "first");
        let id = s.create_from_selection(&mut dom, &range, "first").unwrap();
        let err = s.save_note(&id, "n", &store).await.unwrap_err();
        assert!(matches!(err, AnnotateError::Store(_)));
    }

    #[test]
    fn test_restore_empty_session_is_noop() {
        let mut dom = page();
        let before = dom.to_html();
        let report = session().restore(&mut dom);
        assert_eq!(report, RestoreReport::default());
        assert_eq!(dom.to_html(), before);
    }
}

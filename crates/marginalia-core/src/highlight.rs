//! Creating and removing highlight elements, and the restore pipeline that
//! re-anchors saved annotations onto a freshly loaded page.

use crate::annotation::{Annotation, AnnotationId, AnnotationSet};
use crate::config::LocatorConfig;
use crate::dom::{DomRange, ElementFilter, HighlightDom};
use crate::error::DomError;
use crate::index::TextIndex;
use crate::locate::{MatchStrategy, locate_with};
use crate::span_map::map_offsets_to_dom;

/// Wrap `range` in a highlight element tagged with `id`.
///
/// Failures are logged and reported as `false`; the tree is untouched.
pub fn wrap<D: HighlightDom>(dom: &mut D, range: &DomRange<D::Node>, id: &AnnotationId) -> bool {
    match dom.wrap_range(range, id) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(%id, error = %e, "highlight: failed to wrap range");
            false
        }
    }
}

/// Remove the highlight element tagged with `id`, keeping its contents.
///
/// Returns `false` when there was nothing to remove.
pub fn unwrap<D: HighlightDom>(dom: &mut D, id: &AnnotationId) -> bool {
    dom.unwrap_highlight(id)
}

/// Result of anchoring one annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    Anchored { strategy: MatchStrategy },
    /// No strategy found the quotation in the current text.
    NotFound,
    /// The match could not be mapped back onto text nodes.
    Unmappable,
    WrapFailed(DomError),
}

impl AnchorOutcome {
    pub fn is_anchored(&self) -> bool {
        matches!(self, AnchorOutcome::Anchored { .. })
    }
}

/// Locate one annotation in the current tree and wrap it.
///
/// Builds its own index, since every wrap invalidates the previous one.
pub fn anchor<D, F>(
    dom: &mut D,
    annotation: &Annotation,
    filter: &F,
    locator: &LocatorConfig,
) -> AnchorOutcome
where
    D: HighlightDom,
    F: ElementFilter + ?Sized,
{
    let Some(root) = dom.content_root() else {
        return AnchorOutcome::NotFound;
    };
    let index = TextIndex::build(dom, &root, filter);

    let Some(found) = locate_with(
        index.full_text(),
        &annotation.text,
        &annotation.context_before,
        &annotation.context_after,
        locator,
    ) else {
        tracing::debug!(id = %annotation.id, "anchor: quotation not found");
        return AnchorOutcome::NotFound;
    };

    let Some(range) = map_offsets_to_dom(index.records(), found.offset, found.len) else {
        tracing::debug!(
            id = %annotation.id,
            offset = found.offset,
            len = found.len,
            "anchor: match not mappable to text nodes"
        );
        return AnchorOutcome::Unmappable;
    };

    match dom.wrap_range(&range, &annotation.id) {
        Ok(_) => {
            tracing::debug!(id = %annotation.id, strategy = ?found.strategy, "anchor: restored");
            AnchorOutcome::Anchored {
                strategy: found.strategy,
            }
        }
        Err(e) => {
            tracing::warn!(id = %annotation.id, error = %e, "anchor: wrap failed");
            AnchorOutcome::WrapFailed(e)
        }
    }
}

/// Tally of one restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Stale highlights removed before anchoring.
    pub removed: usize,
    pub anchored: usize,
    /// Of the anchored ones, how many only matched on a single word.
    pub fuzzy: usize,
    pub not_found: usize,
    pub unmappable: usize,
    pub failed: usize,
}

impl RestoreReport {
    fn record(&mut self, outcome: &AnchorOutcome) {
        match outcome {
            AnchorOutcome::Anchored { strategy } => {
                self.anchored += 1;
                if *strategy == MatchStrategy::FuzzyWord {
                    self.fuzzy += 1;
                }
            }
            AnchorOutcome::NotFound => self.not_found += 1,
            AnchorOutcome::Unmappable => self.unmappable += 1,
            AnchorOutcome::WrapFailed(_) => self.failed += 1,
        }
    }

    /// Annotations that did not get a highlight this pass.
    pub fn missing(&self) -> usize {
        self.not_found + self.unmappable + self.failed
    }
}

/// Re-anchor every annotation in `annotations`.
///
/// Existing highlights for these ids are removed first, so running this again
/// over the same tree leaves exactly one highlight per anchored annotation.
/// Individual failures are logged and counted, never returned.
pub fn restore<D, F>(
    dom: &mut D,
    annotations: &AnnotationSet,
    filter: &F,
    locator: &LocatorConfig,
) -> RestoreReport
where
    D: HighlightDom,
    F: ElementFilter + ?Sized,
{
    let mut report = RestoreReport::default();

    // One unwrap per existing element, so a host that cannot detach an
    // element still lets the pass finish.
    let stale: Vec<AnnotationId> = dom
        .highlight_ids()
        .into_iter()
        .filter(|id| annotations.contains(id))
        .collect();
    for id in &stale {
        if dom.unwrap_highlight(id) {
            report.removed += 1;
        }
    }

    for annotation in annotations {
        let outcome = anchor(dom, annotation, filter, locator);
        report.record(&outcome);
    }

    tracing::debug!(?report, "restore: pass complete");
    report
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::dom::{ContentFilter, DomTree};
    use crate::memory::{MemoryDom, NodeId};

    fn annotation(id: &str, text: &str, before: &str, after: &str) -> Annotation {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Annotation::pending(id.into(), text, ts, before, after)
    }

    fn highlight_text(dom: &MemoryDom, id: &str) -> String {
        let el = dom.highlight_element(&id.into()).unwrap();
        dom.text_content(&el)
    }

    #[test]
    fn test_wrap_failure_reports_false() {
        let mut dom = MemoryDom::from_html("<p>abc</p>");
        let node = dom.find_text("abc").unwrap();
        assert!(!wrap(&mut dom, &DomRange::new(node, 2, node, 1), &"x".into()));
        assert_eq!(dom.to_html(), "<p>abc</p>");
        assert!(wrap(&mut dom, &DomRange::new(node, 0, node, 1), &"x".into()));
        assert!(unwrap(&mut dom, &"x".into()));
        assert!(!unwrap(&mut dom, &"x".into()));
    }

    #[test]
    fn test_anchor_outcomes() {
        let mut dom = MemoryDom::from_html("<article><p>The cat sat.</p></article>");
        let filter = ContentFilter::default();
        let locator = LocatorConfig::default();

        let missing = annotation("m", "a dog barked", "", "");
        assert_eq!(
            anchor(&mut dom, &missing, &filter, &locator),
            AnchorOutcome::NotFound
        );

        let hit = annotation("h", "cat sat", "", "");
        assert_eq!(
            anchor(&mut dom, &hit, &filter, &locator),
            AnchorOutcome::Anchored {
                strategy: MatchStrategy::Exact
            }
        );
        assert_eq!(highlight_text(&dom, "h"), "cat sat");
    }

    #[test]
    fn test_restore_across_formatting() {
        let mut dom =
            MemoryDom::from_html("<article><p>Read <em>this   part</em> carefully.</p></article>");
        let set: AnnotationSet = [annotation("a", "this part carefully", "", "")]
            .into_iter()
            .collect();
        let report = restore(
            &mut dom,
            &set,
            &ContentFilter::default(),
            &LocatorConfig::default(),
        );
        assert_eq!(report.anchored, 1);
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<article><p>Read <span class="marginalia-highlight" data-anno-id="a"><em>this   part</em> carefully</span>.</p></article>"#
        );
    }

    #[test]
    fn test_restore_counts_failures() {
        let mut dom = MemoryDom::from_html("<article><p>alpha beta</p></article>");
        let set: AnnotationSet = [
            annotation("a", "alpha", "", ""),
            annotation("b", "nowhere to be seen", "", ""),
        ]
        .into_iter()
        .map(|mut a| {
            a.note = crate::annotation::NoteState::Saved(String::new());
            a
        })
        .collect();
        let report = restore(
            &mut dom,
            &set,
            &ContentFilter::default(),
            &LocatorConfig::default(),
        );
        assert_eq!(report.anchored, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(report.missing(), 1);
    }

    #[test]
    fn test_restore_leaves_foreign_highlights() {
        let mut dom = MemoryDom::from_html(
            r#"<article><p><span class="marginalia-highlight" data-anno-id="other">kept</span> text</p></article>"#,
        );
        let set: AnnotationSet = [annotation("a", "text", "", "")].into_iter().collect();
        let report = restore(
            &mut dom,
            &set,
            &ContentFilter::default(),
            &LocatorConfig::default(),
        );
        assert_eq!(report.removed, 0);
        assert_eq!(
            dom.highlight_ids(),
            vec![AnnotationId::from("other"), AnnotationId::from("a")]
        );
    }

    /// Host whose highlight elements refuse to leave the tree.
    struct StuckDom(MemoryDom);

    impl DomTree for StuckDom {
        type Node = NodeId;

        fn node_kind(&self, node: &NodeId) -> crate::dom::NodeKind {
            self.0.node_kind(node)
        }
        fn parent(&self, node: &NodeId) -> Option<NodeId> {
            self.0.parent(node)
        }
        fn children(&self, node: &NodeId) -> Vec<NodeId> {
            self.0.children(node)
        }
        fn text(&self, node: &NodeId) -> String {
            self.0.text(node)
        }
        fn tag_name(&self, node: &NodeId) -> Option<smol_str::SmolStr> {
            self.0.tag_name(node)
        }
        fn highlight_id(&self, node: &NodeId) -> Option<AnnotationId> {
            self.0.highlight_id(node)
        }
        fn content_root(&self) -> Option<NodeId> {
            self.0.content_root()
        }
    }

    impl HighlightDom for StuckDom {
        fn wrap_range(
            &mut self,
            range: &DomRange<NodeId>,
            id: &AnnotationId,
        ) -> Result<NodeId, DomError> {
            self.0.wrap_range(range, id)
        }
        fn unwrap_highlight(&mut self, id: &AnnotationId) -> bool {
            self.0.highlight_element(id).is_some()
        }
        fn highlight_ids(&self) -> Vec<AnnotationId> {
            self.0.highlight_ids()
        }
    }

    #[test]
    fn test_restore_finishes_when_unwrap_cannot_detach() {
        let mut dom = StuckDom(MemoryDom::from_html(
            r#"<article><p><span class="marginalia-highlight" data-anno-id="a">alpha</span> beta</p></article>"#,
        ));
        let set: AnnotationSet = [annotation("a", "beta", "", "")].into_iter().collect();
        let report = restore(
            &mut dom,
            &set,
            &ContentFilter::default(),
            &LocatorConfig::default(),
        );
        assert_eq!(report.removed, 1);
        assert_eq!(report.anchored, 1);
    }
}

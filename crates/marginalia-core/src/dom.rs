//! Host DOM abstraction.
//!
//! These traits define the interface between the anchoring engine and a
//! concrete document tree: the browser DOM via `web-sys`, or the in-memory
//! [`MemoryDom`](crate::memory::MemoryDom) used by tests and native hosts.

use std::fmt::Debug;

use smol_str::SmolStr;

use crate::annotation::AnnotationId;
use crate::error::DomError;

/// Kind of a tree node, as far as anchoring cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, doctypes, processing instructions.
    Other,
}

/// What the indexer's element filter gets to see about an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    /// Lowercase tag name.
    pub tag: SmolStr,
    /// Set when the element is a highlight wrapper.
    pub highlight_id: Option<AnnotationId>,
}

/// Read access to a document tree.
pub trait DomTree {
    /// Cheap, comparable node handle.
    type Node: Clone + PartialEq + Debug;

    fn node_kind(&self, node: &Self::Node) -> NodeKind;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Child nodes in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Character data of a text node. Empty for other kinds.
    fn text(&self, node: &Self::Node) -> String;

    /// Lowercase tag name of an element.
    fn tag_name(&self, node: &Self::Node) -> Option<SmolStr>;

    /// Annotation id if `node` is a highlight wrapper.
    fn highlight_id(&self, node: &Self::Node) -> Option<AnnotationId>;

    /// Root to index: the preferred content element if present, else the body,
    /// else the whole document.
    fn content_root(&self) -> Option<Self::Node>;

    fn element_info(&self, node: &Self::Node) -> Option<ElementInfo> {
        Some(ElementInfo {
            tag: self.tag_name(node)?,
            highlight_id: self.highlight_id(node),
        })
    }

    /// Concatenated text of every descendant text node.
    fn text_content(&self, node: &Self::Node) -> String {
        match self.node_kind(node) {
            NodeKind::Text => self.text(node),
            NodeKind::Other => String::new(),
            NodeKind::Element => self
                .children(node)
                .iter()
                .map(|child| self.text_content(child))
                .collect(),
        }
    }
}

/// Mutations needed to show and remove highlights.
pub trait HighlightDom: DomTree {
    /// Move the contents of `range` into a new highlight element tagged with `id`,
    /// inserted where the contents were.
    ///
    /// On `Err` the tree must be exactly as before the call.
    fn wrap_range(
        &mut self,
        range: &DomRange<Self::Node>,
        id: &AnnotationId,
    ) -> Result<Self::Node, DomError>;

    /// Replace the highlight element tagged with `id` by its own children.
    ///
    /// Returns false when no such element exists or it could not be removed.
    fn unwrap_highlight(&mut self, id: &AnnotationId) -> bool;

    /// Ids of every highlight element currently in the tree, in document order.
    fn highlight_ids(&self) -> Vec<AnnotationId>;
}

/// A resolved span of text between two text-node positions.
///
/// Offsets are chars into the raw node text. `end_offset` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomRange<N> {
    pub start_node: N,
    pub start_offset: usize,
    pub end_node: N,
    pub end_offset: usize,
}

impl<N> DomRange<N> {
    pub fn new(start_node: N, start_offset: usize, end_node: N, end_offset: usize) -> Self {
        Self {
            start_node,
            start_offset,
            end_node,
            end_offset,
        }
    }
}

/// Decides which element subtrees the indexer walks into.
pub trait ElementFilter {
    /// True when the element and everything below it must be ignored.
    fn skip_subtree(&self, element: &ElementInfo) -> bool;
}

impl<F> ElementFilter for F
where
    F: Fn(&ElementInfo) -> bool,
{
    fn skip_subtree(&self, element: &ElementInfo) -> bool {
        self(element)
    }
}

/// Skips non-rendering elements and existing highlight wrappers.
///
/// Skipping wrappers keeps re-runs from indexing text that is already
/// highlighted, which is what makes repeated restores safe.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    excluded_tags: Vec<SmolStr>,
}

impl ContentFilter {
    pub fn new(excluded_tags: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            excluded_tags: excluded_tags
                .into_iter()
                .map(|t| {
                    let tag: SmolStr = t.into();
                    SmolStr::new(tag.to_ascii_lowercase())
                })
                .collect(),
        }
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(["script", "style"])
    }
}

impl ElementFilter for ContentFilter {
    fn skip_subtree(&self, element: &ElementInfo) -> bool {
        element.highlight_id.is_some() || self.excluded_tags.iter().any(|t| *t == element.tag)
    }
}

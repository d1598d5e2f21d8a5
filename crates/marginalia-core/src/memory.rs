//! Arena-backed document tree.
//!
//! `MemoryDom` implements [`DomTree`] and [`HighlightDom`] without a browser,
//! following DOM `Range.extractContents()` semantics for wrapping: boundary text
//! nodes are split, partially selected ancestors are split into two shallow
//! copies, and the selected nodes move into the highlight element.
//!
//! Detached nodes stay in the arena; ids are never reused.

use std::cmp::Ordering;

use markdown_weaver_escape::{escape_html, escape_html_body_text};
use scraper::{Html, Node};
use smol_str::SmolStr;

use crate::annotation::AnnotationId;
use crate::config::OverlayConfig;
use crate::dom::{DomRange, DomTree, HighlightDom, NodeKind};
use crate::error::DomError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript",
];
/// Leading markup that makes [`MemoryDom::from_html`] parse a whole document.
const DOCUMENT_PREFIXES: &[&str] = &["<!doctype", "<html", "<head", "<body"];

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element {
        tag: SmolStr,
        attrs: Vec<(SmolStr, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Slot>,
    root: NodeId,
    highlight_class: SmolStr,
    id_attribute: SmolStr,
    content_root_tag: SmolStr,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::with_config(&OverlayConfig::default())
    }
}

impl MemoryDom {
    /// Empty document using the default overlay config.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &OverlayConfig) -> Self {
        Self {
            nodes: vec![Slot {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            highlight_class: config.highlight_class.clone(),
            id_attribute: config.id_attribute.clone(),
            content_root_tag: config.content_root_tag.clone(),
        }
    }

    /// Parse markup the way a browser would, recovering from errors.
    ///
    /// Input starting with `<html>`, `<body>`, `<head>` or a doctype is parsed
    /// as a full document. Anything else is parsed as a `<body>` fragment and
    /// its nodes become the document's children, so `to_html` gives back the
    /// fragment.
    pub fn from_html(html: &str) -> Self {
        Self::from_html_with_config(html, &OverlayConfig::default())
    }

    pub fn from_html_with_config(html: &str, config: &OverlayConfig) -> Self {
        let mut dom = Self::with_config(config);
        let trimmed = html.trim_start();
        let lead = trimmed.get(..9).unwrap_or(trimmed).to_ascii_lowercase();
        let is_document = DOCUMENT_PREFIXES.iter().any(|p| {
            lead.strip_prefix(p)
                .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric()))
        });
        if is_document {
            dom.import(&Html::parse_document(html), false);
        } else {
            dom.import(&Html::parse_fragment(html), true);
        }
        dom
    }

    pub fn document(&self) -> NodeId {
        self.root
    }

    // === Construction ===

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Append `child` to `parent`, detaching it from any previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let idx = self.nodes[parent.0].children.len();
        self.insert_child(parent, idx, child);
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((SmolStr::new(name), value.to_string())),
            }
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Replace the character data of a text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeData::Text(t) = &mut self.nodes[node.0].data {
            *t = text.to_string();
        }
    }

    // === Queries ===

    /// First text node in document order whose text contains `needle`.
    pub fn find_text(&self, needle: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| matches!(&self.nodes[n.0].data, NodeData::Text(t) if t.contains(needle)))
    }

    /// First element in document order with the given tag.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root).into_iter().find(|&n| {
            matches!(&self.nodes[n.0].data, NodeData::Element { tag: t, .. } if t == tag)
        })
    }

    /// Highlight element tagged with `id`.
    pub fn highlight_element(&self, id: &AnnotationId) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attribute(*n, &self.id_attribute) == Some(id.as_str()))
    }

    /// Number of highlight elements tagged with `id`.
    pub fn count_highlights(&self, id: &AnnotationId) -> usize {
        self.highlight_ids().iter().filter(|h| *h == id).count()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    /// Serialize the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[node.0].children {
            self.write_html(child, &mut out);
        }
        out
    }

    // === Internals ===

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn text_len(&self, node: NodeId) -> Option<usize> {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => Some(t.chars().count()),
            _ => None,
        }
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev());
        }
        out
    }

    fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.nodes[node.0].parent?;
        self.nodes[parent.0].children.iter().position(|&c| c == node)
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn insert_child(&mut self, parent: NodeId, idx: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let idx = idx.min(children.len());
        children.insert(idx, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Child-index path from the root. Document order is the lexicographic order of paths.
    fn path(&self, node: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(idx) = self.index_in_parent(current) {
            path.push(idx);
            current = match self.nodes[current.0].parent {
                Some(p) => p,
                None => break,
            };
        }
        path.reverse();
        path
    }

    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[node.0].parent;
        while let Some(p) = current {
            out.push(p);
            current = self.nodes[p.0].parent;
        }
        out
    }

    /// Split a text node at char `offset`. The original keeps the prefix; the
    /// returned node holds the suffix and follows it.
    fn split_text(&mut self, node: NodeId, offset: usize) -> NodeId {
        let suffix = match &mut self.nodes[node.0].data {
            NodeData::Text(t) => {
                let byte_idx = t.char_indices().nth(offset).map_or(t.len(), |(b, _)| b);
                t.split_off(byte_idx)
            }
            _ => String::new(),
        };
        let new_node = self.push(NodeData::Text(suffix));
        if let (Some(parent), Some(idx)) = (self.nodes[node.0].parent, self.index_in_parent(node)) {
            self.insert_child(parent, idx + 1, new_node);
        }
        new_node
    }

    fn shallow_clone(&mut self, node: NodeId) -> NodeId {
        let data = self.nodes[node.0].data.clone();
        self.push(data)
    }

    /// Raise `first` until its parent is `common`, splitting ancestors that
    /// also hold content before it.
    fn lift_start(&mut self, mut first: NodeId, common: NodeId) -> NodeId {
        while let Some(parent) = self.nodes[first.0].parent.filter(|&p| p != common) {
            let idx = self.index_in_parent(first).unwrap_or(0);
            if idx == 0 {
                first = parent;
                continue;
            }
            let clone = self.shallow_clone(parent);
            let moved: Vec<NodeId> = self.nodes[parent.0].children[idx..].to_vec();
            for child in moved {
                self.append_child(clone, child);
            }
            if let (Some(grand), Some(pidx)) =
                (self.nodes[parent.0].parent, self.index_in_parent(parent))
            {
                self.insert_child(grand, pidx + 1, clone);
            }
            first = clone;
        }
        first
    }

    /// Raise `last` until its parent is `common`, splitting ancestors that
    /// also hold content after it.
    fn lift_end(&mut self, mut last: NodeId, common: NodeId) -> NodeId {
        while let Some(parent) = self.nodes[last.0].parent.filter(|&p| p != common) {
            let idx = self.index_in_parent(last).unwrap_or(0);
            if idx + 1 == self.nodes[parent.0].children.len() {
                last = parent;
                continue;
            }
            let clone = self.shallow_clone(parent);
            let moved: Vec<NodeId> = self.nodes[parent.0].children[..=idx].to_vec();
            for child in moved {
                self.append_child(clone, child);
            }
            if let (Some(grand), Some(pidx)) =
                (self.nodes[parent.0].parent, self.index_in_parent(parent))
            {
                self.insert_child(grand, pidx, clone);
            }
            last = clone;
        }
        last
    }

    /// Merge runs of adjacent text children and drop empty ones.
    fn merge_text_children(&mut self, parent: NodeId) {
        let children = self.nodes[parent.0].children.clone();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            let text = match &self.nodes[child.0].data {
                NodeData::Text(t) => t.clone(),
                _ => {
                    previous_text = None;
                    continue;
                }
            };
            match previous_text {
                Some(prev) => {
                    if let NodeData::Text(t) = &mut self.nodes[prev.0].data {
                        t.push_str(&text);
                    }
                    self.detach(child);
                }
                None if text.is_empty() => self.detach(child),
                None => previous_text = Some(child),
            }
        }
    }

    fn validate_range(&self, range: &DomRange<NodeId>) -> Result<(), DomError> {
        for (node, offset) in [
            (range.start_node, range.start_offset),
            (range.end_node, range.end_offset),
        ] {
            let len = self.text_len(node).ok_or(DomError::InvalidBoundary)?;
            if !self.is_attached(node) {
                return Err(DomError::InvalidBoundary);
            }
            if offset > len {
                return Err(DomError::OffsetOutOfBounds { offset, len });
            }
        }

        let order = if range.start_node == range.end_node {
            range.start_offset.cmp(&range.end_offset)
        } else {
            self.path(range.start_node).cmp(&self.path(range.end_node))
        };
        match order {
            Ordering::Less => Ok(()),
            Ordering::Equal => Err(DomError::EmptyRange),
            Ordering::Greater => Err(DomError::InvertedRange),
        }
    }

    // === Markup ===

    /// Copy a parsed tree into the arena under the document node.
    ///
    /// Fragments come wrapped in a synthetic `<html>` element; only its
    /// children are copied.
    fn import(&mut self, parsed: &Html, fragment: bool) {
        if !parsed.errors.is_empty() {
            tracing::trace!(count = parsed.errors.len(), "memory: recovered from markup errors");
        }
        let source = if fragment {
            *parsed.root_element()
        } else {
            parsed.tree.root()
        };
        let mut pending = vec![(self.root, source)];
        while let Some((target, source)) = pending.pop() {
            for child in source.children() {
                let node = match child.value() {
                    Node::Element(el) => {
                        let node = self.create_element(el.name());
                        for (name, value) in el.attrs() {
                            self.set_attribute(node, name, value);
                        }
                        pending.push((node, child));
                        node
                    }
                    Node::Text(text) => self.create_text(text),
                    Node::Comment(comment) => {
                        self.push(NodeData::Comment(String::from(&**comment)))
                    }
                    _ => continue,
                };
                self.append_child(target, node);
            }
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Document => out.push_str(&self.inner_html(node)),
            NodeData::Text(t) => {
                let raw = self.nodes[node.0]
                    .parent
                    .and_then(|p| self.tag_name(&p))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag.as_str()));
                if raw {
                    out.push_str(t);
                } else {
                    let _ = escape_html_body_text(&mut *out, t);
                }
            }
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    let _ = escape_html(&mut *out, value);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for &child in &self.nodes[node.0].children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl DomTree for MemoryDom {
    type Node = NodeId;

    fn node_kind(&self, node: &NodeId) -> NodeKind {
        match self.nodes[node.0].data {
            NodeData::Document | NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Other,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn text(&self, node: &NodeId) -> String {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => t.clone(),
            _ => String::new(),
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<SmolStr> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn highlight_id(&self, node: &NodeId) -> Option<AnnotationId> {
        self.attribute(*node, &self.id_attribute)
            .map(AnnotationId::from)
    }

    fn content_root(&self) -> Option<NodeId> {
        self.find_element(&self.content_root_tag)
            .or_else(|| self.find_element("body"))
            .or(Some(self.root))
    }
}

impl HighlightDom for MemoryDom {
    fn wrap_range(
        &mut self,
        range: &DomRange<NodeId>,
        id: &AnnotationId,
    ) -> Result<NodeId, DomError> {
        self.validate_range(range)?;

        let (first, last) = if range.start_node == range.end_node {
            let node = range.start_node;
            let len = self.text_len(node).unwrap_or(0);
            if range.end_offset < len {
                self.split_text(node, range.end_offset);
            }
            let selected = if range.start_offset > 0 {
                self.split_text(node, range.start_offset)
            } else {
                node
            };
            (selected, selected)
        } else {
            let end_len = self.text_len(range.end_node).unwrap_or(0);
            if range.end_offset < end_len {
                self.split_text(range.end_node, range.end_offset);
            }
            let first = if range.start_offset > 0 {
                self.split_text(range.start_node, range.start_offset)
            } else {
                range.start_node
            };
            (first, range.end_node)
        };

        let (first, last) = if first == last {
            (first, last)
        } else {
            let first_ancestors = self.ancestors(first);
            let common = self
                .ancestors(last)
                .into_iter()
                .find(|a| first_ancestors.contains(a))
                .unwrap_or(self.root);
            let first = self.lift_start(first, common);
            let last = self.lift_end(last, common);
            (first, last)
        };

        let parent = self.nodes[first.0].parent.unwrap_or(self.root);
        let start_idx = self.index_in_parent(first).unwrap_or(0);
        let end_idx = self.index_in_parent(last).unwrap_or(start_idx);

        let wrapper = self.create_element("span");
        let class = self.highlight_class.clone();
        let id_attribute = self.id_attribute.clone();
        self.set_attribute(wrapper, "class", &class);
        self.set_attribute(wrapper, &id_attribute, id.as_str());

        let moved: Vec<NodeId> = self.nodes[parent.0].children[start_idx..=end_idx].to_vec();
        self.insert_child(parent, start_idx, wrapper);
        for child in moved {
            self.append_child(wrapper, child);
        }
        Ok(wrapper)
    }

    fn unwrap_highlight(&mut self, id: &AnnotationId) -> bool {
        let Some(element) = self.highlight_element(id) else {
            return false;
        };
        let Some(parent) = self.nodes[element.0].parent else {
            return false;
        };
        let idx = self.index_in_parent(element).unwrap_or(0);
        let children = self.nodes[element.0].children.clone();
        self.detach(element);
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, idx + offset, child);
        }
        self.merge_text_children(parent);
        true
    }

    fn highlight_ids(&self) -> Vec<AnnotationId> {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|n| self.highlight_id(&n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_text(dom: &mut MemoryDom, needle: &str, id: &str) -> Result<NodeId, DomError> {
        let node = dom.find_text(needle).unwrap();
        let text = dom.text(&node);
        let start = text[..text.find(needle).unwrap()].chars().count();
        let end = start + needle.chars().count();
        dom.wrap_range(&DomRange::new(node, start, node, end), &id.into())
    }

    #[test]
    fn test_parse_and_serialize() {
        let html = r#"<article><h1 class="title">Head</h1><p>A &amp; B<br>next</p><!--c--></article>"#;
        let dom = MemoryDom::from_html(html);
        assert_eq!(dom.to_html(), html);
    }

    #[test]
    fn test_parse_raw_text_elements() {
        let dom = MemoryDom::from_html("<p>x</p><script>if (a < b) {}</script>");
        let script = dom.find_element("script").unwrap();
        assert_eq!(dom.text_content(&script), "if (a < b) {}");
    }

    #[test]
    fn test_parse_decodes_character_references() {
        let dom = MemoryDom::from_html("<article><p>don&#8217;t &mdash; stop</p></article>");
        let article = dom.find_element("article").unwrap();
        assert_eq!(dom.text_content(&article), "don’t — stop");
        assert_eq!(dom.to_html(), "<article><p>don’t — stop</p></article>");
    }

    #[test]
    fn test_parse_recovers_like_a_browser() {
        let dom = MemoryDom::from_html("<p>one<p>two");
        assert_eq!(dom.to_html(), "<p>one</p><p>two</p>");

        let dom = MemoryDom::from_html("<p>x</div> y");
        assert_eq!(dom.to_html(), "<p>x y</p>");
    }

    #[test]
    fn test_parse_full_document() {
        let dom =
            MemoryDom::from_html("<!DOCTYPE html><html><body><p>a &lt; b</p></body></html>");
        let body = dom.find_element("body").unwrap();
        assert_eq!(dom.inner_html(body), "<p>a &lt; b</p>");
        assert!(dom.find_element("head").is_some());

        let dom = MemoryDom::from_html("<header>h</header><p>x</p>");
        assert_eq!(dom.to_html(), "<header>h</header><p>x</p>");
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let mut dom = MemoryDom::from_html(r#"<a href="/x?a=1&amp;b=2">l</a>"#);
        let a = dom.find_element("a").unwrap();
        assert_eq!(dom.attribute(a, "href"), Some("/x?a=1&b=2"));
        dom.set_attribute(a, "title", r#"say "hi""#);
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<a href="/x?a=1&amp;b=2" title="say &quot;hi&quot;">l</a>"#
        );
    }

    #[test]
    fn test_content_root_preference() {
        let dom = MemoryDom::from_html("<body><nav>n</nav><article>a</article></body>");
        let root = dom.content_root().unwrap();
        assert_eq!(dom.tag_name(&root).as_deref(), Some("article"));

        let dom = MemoryDom::from_html("<body><p>b</p></body>");
        let root = dom.content_root().unwrap();
        assert_eq!(dom.tag_name(&root).as_deref(), Some("body"));

        let dom = MemoryDom::from_html("<p>bare</p>");
        assert_eq!(dom.content_root(), Some(dom.document()));
    }

    #[test]
    fn test_wrap_within_text_node() {
        let mut dom = MemoryDom::from_html("<p>hello world</p>");
        wrap_text(&mut dom, "world", "a1").unwrap();
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<p>hello <span class="marginalia-highlight" data-anno-id="a1">world</span></p>"#
        );
    }

    #[test]
    fn test_wrap_across_siblings() {
        let mut dom = MemoryDom::from_html("<p>one <b>two</b> three</p>");
        let start = dom.find_text("one").unwrap();
        let end = dom.find_text("three").unwrap();
        dom.wrap_range(&DomRange::new(start, 2, end, 3), &"a1".into())
            .unwrap();
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<p>on<span class="marginalia-highlight" data-anno-id="a1">e <b>two</b> th</span>ree</p>"#
        );
    }

    #[test]
    fn test_wrap_splits_partial_ancestors() {
        let mut dom = MemoryDom::from_html("<p><i>ab</i><b>cd</b></p>");
        let start = dom.find_text("ab").unwrap();
        let end = dom.find_text("cd").unwrap();
        dom.wrap_range(&DomRange::new(start, 1, end, 1), &"x".into())
            .unwrap();
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<p><i>a</i><span class="marginalia-highlight" data-anno-id="x"><i>b</i><b>c</b></span><b>d</b></p>"#
        );
    }

    #[test]
    fn test_wrap_whole_elements_are_moved_not_split() {
        let mut dom = MemoryDom::from_html("<div><p>first</p><p>second</p></div>");
        let start = dom.find_text("first").unwrap();
        let end = dom.find_text("second").unwrap();
        dom.wrap_range(&DomRange::new(start, 0, end, 6), &"x".into())
            .unwrap();
        insta::assert_snapshot!(
            dom.to_html(),
            @r#"<div><span class="marginalia-highlight" data-anno-id="x"><p>first</p><p>second</p></span></div>"#
        );
    }

    #[test]
    fn test_wrap_failures_leave_tree_untouched() {
        let html = "<p>one <b>two</b></p>";
        let mut dom = MemoryDom::from_html(html);
        let one = dom.find_text("one").unwrap();
        let two = dom.find_text("two").unwrap();
        let p = dom.find_element("p").unwrap();

        let cases = [
            (DomRange::new(two, 0, one, 2), DomError::InvertedRange),
            (DomRange::new(one, 2, one, 2), DomError::EmptyRange),
            (
                DomRange::new(one, 0, one, 9),
                DomError::OffsetOutOfBounds { offset: 9, len: 4 },
            ),
            (DomRange::new(p, 0, two, 1), DomError::InvalidBoundary),
        ];
        for (range, expected) in cases {
            assert_eq!(dom.wrap_range(&range, &"x".into()), Err(expected));
            assert_eq!(dom.to_html(), html);
        }
    }

    #[test]
    fn test_wrap_detached_node_fails() {
        let mut dom = MemoryDom::from_html("<p>text</p>");
        let loose = dom.create_text("loose");
        assert_eq!(
            dom.wrap_range(&DomRange::new(loose, 0, loose, 2), &"x".into()),
            Err(DomError::InvalidBoundary)
        );
    }

    #[test]
    fn test_unwrap_restores_markup() {
        let html = "<p>one <b>two</b> three</p>";
        let mut dom = MemoryDom::from_html(html);
        let start = dom.find_text("one").unwrap();
        let end = dom.find_text("three").unwrap();
        dom.wrap_range(&DomRange::new(start, 2, end, 3), &"a1".into())
            .unwrap();

        assert!(dom.unwrap_highlight(&"a1".into()));
        assert_eq!(dom.to_html(), html);
        let p = dom.find_element("p").unwrap();
        assert_eq!(dom.children(&p).len(), 3);
        assert!(!dom.unwrap_highlight(&"a1".into()));
    }

    #[test]
    fn test_highlight_ids_in_document_order() {
        let mut dom = MemoryDom::from_html("<p>alpha beta gamma</p>");
        wrap_text(&mut dom, "gamma", "g").unwrap();
        wrap_text(&mut dom, "alpha", "a").unwrap();
        assert_eq!(
            dom.highlight_ids(),
            vec![AnnotationId::from("a"), AnnotationId::from("g")]
        );
        assert_eq!(dom.count_highlights(&"g".into()), 1);
    }
}

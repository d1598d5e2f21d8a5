//! `web-sys` implementation of the core DOM traits.
//!
//! Core offsets are chars; the browser counts UTF-16 code units. Conversion
//! happens here and in [`selection`](crate::selection), nowhere else.

use marginalia_core::{
    AnnotationId, DomError, DomRange, DomTree, HighlightDom, NodeKind, OverlayConfig, SmolStr,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Node};

/// UTF-16 offset of the boundary before char `char_offset` of `text`.
pub fn char_to_utf16_offset(text: &str, char_offset: usize) -> u32 {
    text.chars()
        .take(char_offset)
        .map(|c| c.len_utf16() as u32)
        .sum()
}

/// Char offset of the boundary at UTF-16 `utf16_offset` of `text`.
///
/// An offset inside a surrogate pair rounds up to the end of that char.
pub fn utf16_to_char_offset(text: &str, utf16_offset: u32) -> usize {
    let mut units = 0u32;
    for (i, c) in text.chars().enumerate() {
        if units >= utf16_offset {
            return i;
        }
        units += c.len_utf16() as u32;
    }
    text.chars().count()
}

fn platform_error(e: JsValue) -> DomError {
    DomError::Platform(format!("{e:?}"))
}

/// The live page document.
#[derive(Debug, Clone)]
pub struct BrowserDom {
    document: Document,
    highlight_class: SmolStr,
    id_attribute: SmolStr,
    content_root_tag: SmolStr,
}

impl BrowserDom {
    pub fn new(document: Document, config: &OverlayConfig) -> Self {
        Self {
            document,
            highlight_class: config.highlight_class.clone(),
            id_attribute: config.id_attribute.clone(),
            content_root_tag: config.content_root_tag.clone(),
        }
    }

    /// Wrap the current window's document.
    pub fn from_window(config: &OverlayConfig) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self::new(document, config))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn highlight_class(&self) -> &str {
        &self.highlight_class
    }

    /// CSS selector matching every highlight element.
    pub fn highlight_selector(&self) -> String {
        format!("[{}]", self.id_attribute)
    }

    /// Every highlight element currently in the page, in document order.
    pub fn highlight_elements(&self) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(&self.highlight_selector()) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    /// First highlight element tagged with `id`.
    pub fn highlight_element(&self, id: &AnnotationId) -> Option<Element> {
        self.highlight_elements()
            .into_iter()
            .find(|el| el.get_attribute(&self.id_attribute).as_deref() == Some(id.as_str()))
    }

    /// Annotation id of the highlight containing `node`, if any.
    pub fn enclosing_highlight(&self, node: &Node) -> Option<AnnotationId> {
        let element = match node.dyn_ref::<Element>() {
            Some(el) => el.clone(),
            None => node.parent_element()?,
        };
        element
            .closest(&self.highlight_selector())
            .ok()
            .flatten()
            .and_then(|el| el.get_attribute(&self.id_attribute))
            .map(|id| AnnotationId::from(id.as_str()))
    }

    fn text_len(&self, node: &Node) -> Option<usize> {
        (node.node_type() == Node::TEXT_NODE)
            .then(|| node.node_value().unwrap_or_default().chars().count())
    }

    fn validate_range(&self, range: &DomRange<Node>) -> Result<(), DomError> {
        for (node, offset) in [
            (&range.start_node, range.start_offset),
            (&range.end_node, range.end_offset),
        ] {
            let len = self.text_len(node).ok_or(DomError::InvalidBoundary)?;
            if !self.document.contains(Some(node)) {
                return Err(DomError::InvalidBoundary);
            }
            if offset > len {
                return Err(DomError::OffsetOutOfBounds { offset, len });
            }
        }

        if range.start_node.is_same_node(Some(&range.end_node)) {
            return match range.start_offset.cmp(&range.end_offset) {
                std::cmp::Ordering::Less => Ok(()),
                std::cmp::Ordering::Equal => Err(DomError::EmptyRange),
                std::cmp::Ordering::Greater => Err(DomError::InvertedRange),
            };
        }
        let position = range.start_node.compare_document_position(&range.end_node);
        if position & Node::DOCUMENT_POSITION_FOLLOWING != 0 {
            Ok(())
        } else {
            Err(DomError::InvertedRange)
        }
    }

    fn to_web_range(&self, range: &DomRange<Node>) -> Result<web_sys::Range, DomError> {
        let start_text = range.start_node.node_value().unwrap_or_default();
        let end_text = range.end_node.node_value().unwrap_or_default();
        let web_range = self.document.create_range().map_err(platform_error)?;
        web_range
            .set_start(
                &range.start_node,
                char_to_utf16_offset(&start_text, range.start_offset),
            )
            .map_err(platform_error)?;
        web_range
            .set_end(
                &range.end_node,
                char_to_utf16_offset(&end_text, range.end_offset),
            )
            .map_err(platform_error)?;
        Ok(web_range)
    }

    fn create_wrapper(&self, id: &AnnotationId) -> Result<Element, DomError> {
        let span = self
            .document
            .create_element("span")
            .map_err(platform_error)?;
        span.set_class_name(&self.highlight_class);
        span.set_attribute(&self.id_attribute, id.as_str())
            .map_err(platform_error)?;
        Ok(span)
    }
}

impl DomTree for BrowserDom {
    type Node = Node;

    fn node_kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE | Node::DOCUMENT_NODE | Node::DOCUMENT_FRAGMENT_NODE => {
                NodeKind::Element
            }
            Node::TEXT_NODE | Node::CDATA_SECTION_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn text(&self, node: &Node) -> String {
        match self.node_kind(node) {
            NodeKind::Text => node.node_value().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn tag_name(&self, node: &Node) -> Option<SmolStr> {
        node.dyn_ref::<Element>()
            .map(|el| SmolStr::new(el.local_name().to_ascii_lowercase()))
    }

    fn highlight_id(&self, node: &Node) -> Option<AnnotationId> {
        node.dyn_ref::<Element>()?
            .get_attribute(&self.id_attribute)
            .map(|id| AnnotationId::from(id.as_str()))
    }

    fn content_root(&self) -> Option<Node> {
        let preferred = self
            .document
            .query_selector(&self.content_root_tag)
            .ok()
            .flatten()
            .map(Node::from);
        preferred
            .or_else(|| self.document.body().map(Node::from))
            .or_else(|| self.document.document_element().map(Node::from))
    }
}

impl HighlightDom for BrowserDom {
    fn wrap_range(&mut self, range: &DomRange<Node>, id: &AnnotationId) -> Result<Node, DomError> {
        self.validate_range(range)?;
        let web_range = self.to_web_range(range)?;
        let span = self.create_wrapper(id)?;

        let contents = web_range.extract_contents().map_err(platform_error)?;
        span.append_child(&contents).map_err(platform_error)?;

        if let Err(e) = web_range.insert_node(&span) {
            // Put the extracted nodes back where they came from.
            let fragment = self.document.create_document_fragment();
            while let Some(child) = span.first_child() {
                let _ = fragment.append_child(&child);
            }
            if let Err(restore_err) = web_range.insert_node(&fragment) {
                tracing::error!(?restore_err, "dom: could not reinsert extracted contents");
            }
            return Err(platform_error(e));
        }

        if let Some(parent) = span.parent_node() {
            parent.normalize();
        }
        Ok(span.into())
    }

    fn unwrap_highlight(&mut self, id: &AnnotationId) -> bool {
        let Some(element) = self.highlight_element(id) else {
            return false;
        };
        let Some(parent) = element.parent_node() else {
            return false;
        };
        while let Some(child) = element.first_child() {
            if let Err(e) = parent.insert_before(&child, Some(&element)) {
                tracing::warn!(%id, ?e, "dom: failed to move highlight contents out");
                return false;
            }
        }
        if let Err(e) = parent.remove_child(&element) {
            tracing::warn!(%id, ?e, "dom: failed to remove highlight element");
            return false;
        }
        parent.normalize();
        true
    }

    fn highlight_ids(&self) -> Vec<AnnotationId> {
        self.highlight_elements()
            .iter()
            .filter_map(|el| el.get_attribute(&self.id_attribute))
            .map(|id| AnnotationId::from(id.as_str()))
            .collect()
    }
}

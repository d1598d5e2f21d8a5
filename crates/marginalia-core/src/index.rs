//! Text-node indexing.
//!
//! Flattens a subtree into an ordered list of text-node records plus one
//! normalized string covering all of them. Offsets found in that string are
//! mapped back onto nodes by [`span_map`](crate::span_map).
//!
//! The index is a snapshot: any DOM mutation (including wrapping a highlight)
//! splits text nodes and invalidates it. Build a fresh one per pass.

use std::ops::Range;

use crate::dom::{DomTree, ElementFilter, NodeKind};

/// One indexed text node.
#[derive(Debug, Clone)]
pub struct TextNodeRecord<N> {
    pub node: N,
    pub raw_text: String,
    /// Whitespace-collapsed text as it appears in the full text.
    pub normalized_text: String,
    /// Char offset of `normalized_text` within the full text.
    pub normalized_start: usize,
    /// Raw char index of each normalized char.
    raw_positions: Vec<usize>,
    raw_len: usize,
}

impl<N> TextNodeRecord<N> {
    fn new(node: N, raw_text: String, normalized_start: usize, drop_leading_space: bool) -> Self {
        let mut normalized_text = String::with_capacity(raw_text.len());
        let mut raw_positions = Vec::with_capacity(raw_text.len());
        let mut in_run = false;
        let mut raw_len = 0;

        for (i, c) in raw_text.chars().enumerate() {
            raw_len += 1;
            if c.is_whitespace() {
                if in_run {
                    continue;
                }
                in_run = true;
                if i == 0 && drop_leading_space {
                    continue;
                }
                normalized_text.push(' ');
            } else {
                in_run = false;
                normalized_text.push(c);
            }
            raw_positions.push(i);
        }

        Self {
            node,
            raw_text,
            normalized_text,
            normalized_start,
            raw_positions,
            raw_len,
        }
    }

    /// Length of the normalized text in chars.
    pub fn normalized_len(&self) -> usize {
        self.raw_positions.len()
    }

    /// Exclusive end of this record in the full text.
    pub fn normalized_end(&self) -> usize {
        self.normalized_start + self.normalized_len()
    }

    /// Length of the raw node text in chars.
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    /// Raw position of the boundary before normalized char `offset`.
    pub fn raw_start_offset(&self, offset: usize) -> usize {
        self.raw_positions
            .get(offset)
            .copied()
            .unwrap_or(self.raw_len)
    }

    /// Raw position of the boundary after normalized char `offset - 1`.
    pub fn raw_end_offset(&self, offset: usize) -> usize {
        match offset {
            0 => self.raw_start_offset(0),
            n => self
                .raw_positions
                .get(n - 1)
                .map(|p| p + 1)
                .unwrap_or(self.raw_len),
        }
    }

    /// Normalized position of a raw boundary: the number of normalized chars
    /// that start before it.
    pub fn normalized_offset(&self, raw_offset: usize) -> usize {
        self.raw_positions.partition_point(|&p| p < raw_offset)
    }
}

/// Ordered text-node records and their concatenated normalized text.
#[derive(Debug, Clone)]
pub struct TextIndex<N> {
    records: Vec<TextNodeRecord<N>>,
    full_text: String,
    len_chars: usize,
}

impl<N: Clone + PartialEq> TextIndex<N> {
    /// Walk `root` in document order.
    ///
    /// Element subtrees rejected by `filter` are pruned. Whitespace-only text
    /// nodes carry no content and are left out.
    pub fn build<D, F>(dom: &D, root: &N, filter: &F) -> Self
    where
        D: DomTree<Node = N>,
        F: ElementFilter + ?Sized,
    {
        let mut records: Vec<TextNodeRecord<N>> = Vec::new();
        let mut full_text = String::new();
        let mut len_chars = 0;

        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            match dom.node_kind(&node) {
                NodeKind::Element => {
                    if &node != root {
                        if let Some(info) = dom.element_info(&node) {
                            if filter.skip_subtree(&info) {
                                tracing::trace!(tag = %info.tag, "index: skipping subtree");
                                continue;
                            }
                        }
                    }
                    stack.extend(dom.children(&node).into_iter().rev());
                }
                NodeKind::Text => {
                    let raw_text = dom.text(&node);
                    if raw_text.trim().is_empty() {
                        continue;
                    }
                    let drop_leading_space = full_text.ends_with(' ');
                    let record = TextNodeRecord::new(node, raw_text, len_chars, drop_leading_space);
                    full_text.push_str(&record.normalized_text);
                    len_chars += record.normalized_len();
                    records.push(record);
                }
                NodeKind::Other => {}
            }
        }

        tracing::trace!(
            records = records.len(),
            len_chars,
            "index: built text index"
        );

        Self {
            records,
            full_text,
            len_chars,
        }
    }
}

impl<N: PartialEq> TextIndex<N> {
    pub fn records(&self) -> &[TextNodeRecord<N>] {
        &self.records
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Length of the full text in chars.
    pub fn len_chars(&self) -> usize {
        self.len_chars
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_for(&self, node: &N) -> Option<&TextNodeRecord<N>> {
        self.records.iter().find(|r| &r.node == node)
    }

    /// Full-text position of a raw `(node, offset)` boundary.
    ///
    /// `None` for nodes that were not indexed (filtered or whitespace-only).
    pub fn normalized_position(&self, node: &N, raw_offset: usize) -> Option<usize> {
        let record = self.record_for(node)?;
        Some(record.normalized_start + record.normalized_offset(raw_offset))
    }

    /// Chars `range` of the full text, clamped to its length.
    pub fn slice(&self, range: Range<usize>) -> String {
        let start = range.start.min(self.len_chars);
        let end = range.end.clamp(start, self.len_chars);
        self.full_text.chars().skip(start).take(end - start).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ContentFilter;
    use crate::memory::MemoryDom;

    fn index(html: &str) -> (MemoryDom, TextIndex<crate::memory::NodeId>) {
        let dom = MemoryDom::from_html(html);
        let root = dom.content_root().unwrap();
        let index = TextIndex::build(&dom, &root, &ContentFilter::default());
        (dom, index)
    }

    #[test]
    fn test_record_maps_internal_whitespace() {
        let record = TextNodeRecord::new((), "a  \n b".to_string(), 0, false);
        assert_eq!(record.normalized_text, "a b");
        assert_eq!(record.raw_len(), 6);
        assert_eq!(record.raw_start_offset(2), 5);
        assert_eq!(record.raw_end_offset(3), 6);
        assert_eq!(record.raw_end_offset(2), 2);
        assert_eq!(record.normalized_offset(5), 2);
        assert_eq!(record.normalized_offset(3), 2);
    }

    #[test]
    fn test_record_drops_boundary_space() {
        let record = TextNodeRecord::new((), "  next".to_string(), 4, true);
        assert_eq!(record.normalized_text, "next");
        assert_eq!(record.raw_start_offset(0), 2);
        assert_eq!(record.normalized_end(), 8);
    }

    #[test]
    fn test_full_text_concatenates_nodes() {
        let (_, index) = index("<article><p>Hello <b>brave</b> new world</p></article>");
        assert_eq!(index.full_text(), "Hello brave new world");
        let starts: Vec<_> = index.records().iter().map(|r| r.normalized_start).collect();
        assert_eq!(starts, vec![0, 6, 11]);
    }

    #[test]
    fn test_skips_script_style_and_blank_nodes() {
        let (_, index) = index(
            "<article><style>p{}</style><p>one</p>\n  <script>var x;</script><p>two</p></article>",
        );
        assert_eq!(index.full_text(), "onetwo");
        assert_eq!(index.records().len(), 2);
    }

    #[test]
    fn test_skips_existing_highlights() {
        let (_, index) = index(
            r#"<article><p>keep <span class="marginalia-highlight" data-anno-id="a1">wrapped</span> tail</p></article>"#,
        );
        assert_eq!(index.full_text(), "keep tail");
    }

    #[test]
    fn test_collapses_whitespace_across_nodes() {
        let (_, index) = index("<article><p>end of line </p><p>\n  start</p></article>");
        assert_eq!(index.full_text(), "end of line start");
        assert_eq!(index.len_chars(), 17);
    }

    #[test]
    fn test_normalized_position_and_slice() {
        let (dom, index) = index("<article><p>alpha <i>beta</i> gamma</p></article>");
        let beta_text = index.records()[1].node;
        assert_eq!(dom.text(&beta_text), "beta");
        assert_eq!(index.normalized_position(&beta_text, 2), Some(8));
        assert_eq!(index.slice(6..10), "beta");
        assert_eq!(index.slice(12..100), "amma");
    }
}

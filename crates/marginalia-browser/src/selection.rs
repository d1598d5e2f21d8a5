//! Reading the reader's text selection as a core [`DomRange`].

use marginalia_core::DomRange;
use web_sys::{DomRect, Node, Window};

use crate::dom::utf16_to_char_offset;

/// A non-empty selection, captured before any DOM mutation.
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    /// Boundaries snapped onto text nodes, offsets in chars.
    pub range: DomRange<Node>,
    /// Selected text, trimmed.
    pub text: String,
    pub rect: Option<DomRect>,
}

/// Which end of a range a boundary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Read the first range of the window's selection.
///
/// `None` when nothing (or only whitespace) is selected, or when a boundary
/// cannot be placed on a text node.
pub fn read_selection(window: &Window) -> Option<SelectionSnapshot> {
    let selection = window.get_selection().ok()??;
    if selection.range_count() == 0 {
        return None;
    }
    let text = String::from(selection.to_string()).trim().to_string();
    if text.is_empty() {
        return None;
    }
    let range = selection.get_range_at(0).ok()?;

    let (start_node, start_offset) = snap_boundary(
        &range.start_container().ok()?,
        range.start_offset().ok()?,
        Edge::Start,
    )?;
    let (end_node, end_offset) = snap_boundary(
        &range.end_container().ok()?,
        range.end_offset().ok()?,
        Edge::End,
    )?;

    tracing::trace!(
        start_offset,
        end_offset,
        len = text.chars().count(),
        "selection: captured"
    );

    Some(SelectionSnapshot {
        range: DomRange::new(start_node, start_offset, end_node, end_offset),
        text,
        rect: Some(range.get_bounding_client_rect()),
    })
}

/// Clear the window's selection.
pub fn clear_selection(window: &Window) {
    if let Ok(Some(selection)) = window.get_selection() {
        let _ = selection.remove_all_ranges();
    }
}

/// Move a `(container, utf16 offset)` boundary onto a text node, returning a
/// char offset into it.
///
/// Element containers address a child index; the start lands at the beginning
/// of the next text node, the end at the end of the previous one.
fn snap_boundary(container: &Node, offset: u32, edge: Edge) -> Option<(Node, usize)> {
    if container.node_type() == Node::TEXT_NODE {
        let text = container.node_value().unwrap_or_default();
        return Some((container.clone(), utf16_to_char_offset(&text, offset)));
    }

    let children = container.child_nodes();
    match edge {
        Edge::Start => {
            let from = match children.get(offset) {
                Some(child) => child,
                None => next_outside(container)?,
            };
            let node = first_text_from(&from)?;
            Some((node, 0))
        }
        Edge::End => {
            let from = match offset.checked_sub(1).and_then(|i| children.get(i)) {
                Some(child) => child,
                None => previous_outside(container)?,
            };
            let node = last_text_from(&from)?;
            let len = node.node_value().unwrap_or_default().chars().count();
            Some((node, len))
        }
    }
}

fn is_text(node: &Node) -> bool {
    node.node_type() == Node::TEXT_NODE
}

/// Following node in document order that is not a descendant of `node`.
fn next_outside(node: &Node) -> Option<Node> {
    let mut current = node.clone();
    loop {
        if let Some(next) = current.next_sibling() {
            return Some(next);
        }
        current = current.parent_node()?;
    }
}

/// Preceding node in document order that is not an ancestor of `node`.
fn previous_outside(node: &Node) -> Option<Node> {
    let mut current = node.clone();
    loop {
        if let Some(prev) = current.previous_sibling() {
            return Some(prev);
        }
        current = current.parent_node()?;
    }
}

/// First text node at or after `start` in document order.
fn first_text_from(start: &Node) -> Option<Node> {
    let mut current = start.clone();
    loop {
        if is_text(&current) {
            return Some(current);
        }
        current = match current.first_child() {
            Some(child) => child,
            None => next_outside(&current)?,
        };
    }
}

/// Last text node at or before `start` in reverse document order.
fn last_text_from(start: &Node) -> Option<Node> {
    let mut current = start.clone();
    loop {
        if is_text(&current) {
            return Some(current);
        }
        current = match current.last_child() {
            Some(child) => child,
            None => previous_outside(&current)?,
        };
    }
}

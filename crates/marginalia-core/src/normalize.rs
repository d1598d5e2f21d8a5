//! Whitespace normalization shared by stored quotations and live page text.
//!
//! Both sides of every comparison must go through the same functions here.
//! Anchoring breaks quietly when they don't.

/// Collapse every maximal run of whitespace into a single ASCII space.
///
/// Leading and trailing whitespace is collapsed too, not removed.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Collapse whitespace and trim both ends. Used for the quotation itself.
pub fn normalize_quote(s: &str) -> String {
    let collapsed = collapse_whitespace(s);
    collapsed.trim_matches(' ').to_string()
}

/// Char index of the first occurrence of `needle` in `haystack`.
///
/// Offsets in this crate are counted in chars, `str::find` reports bytes.
pub fn find_char_index(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .find(needle)
        .map(|byte_idx| haystack[..byte_idx].chars().count())
}

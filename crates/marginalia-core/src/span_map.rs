//! Mapping normalized full-text offsets back onto DOM text nodes.

use crate::dom::DomRange;
use crate::index::TextNodeRecord;

/// Convert `[start, start + len)` in full-text space into a [`DomRange`].
///
/// The start lands in the first record whose span contains `start`, the end in
/// the first record at or after it whose span reaches `start + len`. Offsets
/// go through each record's whitespace map, so internal runs in the raw node
/// text are accounted for.
///
/// Returns `None` if either boundary lies outside the indexed text.
pub fn map_offsets_to_dom<N: Clone>(
    records: &[TextNodeRecord<N>],
    start: usize,
    len: usize,
) -> Option<DomRange<N>> {
    if len == 0 {
        return None;
    }
    let end = start + len;

    let start_idx = records
        .iter()
        .position(|r| r.normalized_start <= start && start < r.normalized_end())?;
    let start_record = &records[start_idx];
    let start_offset = start_record
        .raw_start_offset(start - start_record.normalized_start)
        .min(start_record.raw_len().saturating_sub(1));

    let end_record = records[start_idx..]
        .iter()
        .find(|r| r.normalized_end() >= end)?;
    let end_offset = end_record
        .raw_end_offset(end - end_record.normalized_start)
        .min(end_record.raw_len());

    tracing::trace!(
        start,
        end,
        start_offset,
        end_offset,
        "span_map: resolved boundaries"
    );

    Some(DomRange::new(
        start_record.node.clone(),
        start_offset,
        end_record.node.clone(),
        end_offset,
    ))
}

//! Gap-based size inference for tag records without a size field
//!
//! A tag's data runs until the next local tag's data begins, or to the end of
//! the file for the last one. Offsets are sorted once so each lookup is a
//! binary search for the first offset strictly greater than the entry's own.

use crate::tags::entry::TagEntry;

/// Fill in `size` for every local, non-empty entry
///
/// External and placeholder entries keep their size and are not used as gap
/// boundaries. Negative gaps clamp to zero.
pub fn infer_gap_sizes(entries: &mut [TagEntry], file_size: u32) {
    let mut boundaries: Vec<u32> = entries
        .iter()
        .filter(|e| !e.is_external() && !e.is_placeholder())
        .map(|e| e.file_offset)
        .collect();
    boundaries.sort_unstable();

    for entry in entries
        .iter_mut()
        .filter(|e| !e.is_external() && !e.is_placeholder())
    {
        let next = boundaries.partition_point(|&b| b <= entry.file_offset);
        let end = boundaries.get(next).copied().unwrap_or(file_size);
        entry.size = gap(entry.file_offset, end);
    }
}

fn gap(start: u32, end: u32) -> u32 {
    let size = i64::from(end) - i64::from(start);
    size.max(0) as u32
}

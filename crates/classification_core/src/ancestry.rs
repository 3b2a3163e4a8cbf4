//! crates/classification_core/src/ancestry.rs
//!
//! Joins each segment to the full ancestor chain of its category and flattens
//! the chain into fixed-width level columns.

use crate::domain::{Category, Segment, SegmentWithAncestry, LEVEL_COUNT};
use crate::tree::CategoryIndex;

/// Flattens a root-first path into exactly `LEVEL_COUNT` names, padding with
/// empty strings. Paths longer than the bound keep their shallowest levels.
pub fn flatten_path(path: &[&Category]) -> [String; LEVEL_COUNT] {
    let mut levels: [String; LEVEL_COUNT] = Default::default();
    for (slot, category) in levels.iter_mut().zip(path) {
        slot.clone_from(&category.name);
    }
    levels
}

/// Resolves one segment. A missing category yields empty levels; a broken
/// parent link truncates the chain at the break.
pub fn resolve_one(segment: Segment, index: &CategoryIndex) -> SegmentWithAncestry {
    let path = segment
        .category_id
        .map(|id| index.path(id))
        .unwrap_or_default();
    let category_name = path.last().map(|c| c.name.clone()).unwrap_or_default();

    SegmentWithAncestry {
        category_path: flatten_path(&path),
        category_name,
        segment,
    }
}

/// Resolves a batch, preserving input order. Never fails: bad references only
/// affect the row they appear on.
pub fn resolve(segments: Vec<Segment>, index: &CategoryIndex) -> Vec<SegmentWithAncestry> {
    segments
        .into_iter()
        .map(|segment| resolve_one(segment, index))
        .collect()
}

//! crates/classification_core/src/ordering.rs
//!
//! Owns the per-material `order_index` sequence: the append rule, bulk reorder
//! planning, and retrieval in any of the three segment orderings.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ReorderOutcome, Segment, SegmentOrder};
use crate::error::{CoreError, CoreResult};
use crate::ports::DatabaseService;

/// The index a newly appended segment receives: one past the current maximum,
/// or 0 for an empty material. Gaps left by deletions are not filled.
pub fn next_order_index(existing: impl IntoIterator<Item = i64>) -> i64 {
    existing.into_iter().max().map_or(0, |max| max + 1)
}

/// Turns the requested id order into `(segment id, position)` assignments.
///
/// Every id must belong to the material (`owned`) and appear at most once.
/// A partial list is allowed: only the listed segments are renumbered.
pub fn plan_reorder(owned: &[Segment], ordered_ids: &[Uuid]) -> CoreResult<Vec<(Uuid, i64)>> {
    if ordered_ids.is_empty() {
        return Err(CoreError::EmptyList);
    }

    let owned_ids: HashSet<Uuid> = owned.iter().map(|s| s.id).collect();
    let foreign: Vec<Uuid> = ordered_ids
        .iter()
        .filter(|id| !owned_ids.contains(*id))
        .copied()
        .collect();
    if !foreign.is_empty() {
        return Err(CoreError::InvalidReference(foreign));
    }

    let mut seen = HashSet::with_capacity(ordered_ids.len());
    if let Some(duplicate) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CoreError::validation(
            "ordered_ids",
            format!("segment {} is listed more than once", duplicate),
        ));
    }

    Ok(ordered_ids
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position as i64))
        .collect())
}

/// The comparison used for a given ordering. Ids break remaining ties so the
/// result is deterministic.
pub fn compare(order: SegmentOrder, a: &Segment, b: &Segment) -> Ordering {
    let primary = match order {
        SegmentOrder::Display => a
            .order_index
            .cmp(&b.order_index)
            .then(a.page_number.cmp(&b.page_number))
            .then(a.created_at.cmp(&b.created_at)),
        SegmentOrder::Page => a
            .page_number
            .cmp(&b.page_number)
            .then(a.created_at.cmp(&b.created_at)),
        SegmentOrder::Recent => b.created_at.cmp(&a.created_at),
    };
    primary.then(a.id.cmp(&b.id))
}

pub fn sort_segments(segments: &mut [Segment], order: SegmentOrder) {
    segments.sort_by(|a, b| compare(order, a, b));
}

/// A material's segments in the requested order.
pub async fn list(
    db: &dyn DatabaseService,
    material_id: Uuid,
    order: SegmentOrder,
) -> CoreResult<Vec<Segment>> {
    db.get_material(material_id).await?;
    let mut segments = db.segments_for_material(material_id).await?;
    sort_segments(&mut segments, order);
    Ok(segments)
}

/// Assigns `order_index = position` to each listed segment as one batch.
///
/// Ids are validated against the material before any write. Segments deleted
/// between validation and the write show up as `matched < requested`.
pub async fn reorder(
    db: &dyn DatabaseService,
    material_id: Uuid,
    ordered_ids: &[Uuid],
) -> CoreResult<ReorderOutcome> {
    if ordered_ids.is_empty() {
        return Err(CoreError::EmptyList);
    }
    db.get_material(material_id).await?;

    let owned = db.segments_for_material(material_id).await?;
    let plan = plan_reorder(&owned, ordered_ids)?;
    let outcome = db.apply_segment_order(material_id, &plan).await?;

    if outcome.is_partial() {
        warn!(
            material_id = %material_id,
            requested = outcome.requested,
            matched = outcome.matched,
            "Reorder applied partially"
        );
    } else {
        info!(
            material_id = %material_id,
            matched = outcome.matched,
            modified = outcome.modified,
            "Segments reordered"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn segment(order_index: i64, page_number: i32, age_minutes: i64) -> Segment {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Segment {
            id: Uuid::new_v4(),
            material_id: Uuid::nil(),
            content: format!("p{} o{}", page_number, order_index),
            page_number,
            category_id: None,
            order_index,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn next_index_appends_after_the_maximum() {
        assert_eq!(next_order_index(Vec::<i64>::new()), 0);
        assert_eq!(next_order_index(vec![0, 1, 2]), 3);
        // Gaps are not filled.
        assert_eq!(next_order_index(vec![0, 7]), 8);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(plan_reorder(&[], &[]), Err(CoreError::EmptyList)));
    }

    #[test]
    fn foreign_ids_are_reported() {
        let owned = vec![segment(0, 1, 0)];
        let stranger = Uuid::new_v4();
        match plan_reorder(&owned, &[owned[0].id, stranger]) {
            Err(CoreError::InvalidReference(ids)) => assert_eq!(ids, vec![stranger]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn duplicate_ids_are_a_validation_error() {
        let owned = vec![segment(0, 1, 0)];
        assert!(matches!(
            plan_reorder(&owned, &[owned[0].id, owned[0].id]),
            Err(CoreError::Validation { field: "ordered_ids", .. })
        ));
    }

    #[test]
    fn positions_follow_the_list() {
        let owned = vec![segment(0, 1, 0), segment(1, 2, 0), segment(2, 3, 0)];
        let requested = [owned[2].id, owned[0].id];
        let plan = plan_reorder(&owned, &requested).unwrap();
        assert_eq!(plan, vec![(owned[2].id, 0), (owned[0].id, 1)]);
    }

    #[test]
    fn orderings_do_not_conflate() {
        // order_index says b, a, c; pages say a, c, b; creation says c newest.
        let a = segment(1, 1, 30);
        let b = segment(0, 9, 20);
        let c = segment(2, 5, 10);
        let mut segments = vec![a.clone(), b.clone(), c.clone()];

        sort_segments(&mut segments, SegmentOrder::Display);
        let ids: Vec<Uuid> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);

        sort_segments(&mut segments, SegmentOrder::Page);
        let ids: Vec<Uuid> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, c.id, b.id]);

        sort_segments(&mut segments, SegmentOrder::Recent);
        let ids: Vec<Uuid> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[test]
    fn display_order_breaks_ties_by_page() {
        let late_page = segment(0, 7, 0);
        let early_page = segment(0, 2, 0);
        let mut segments = vec![late_page.clone(), early_page.clone()];
        sort_segments(&mut segments, SegmentOrder::Display);
        assert_eq!(segments[0].id, early_page.id);
    }
}

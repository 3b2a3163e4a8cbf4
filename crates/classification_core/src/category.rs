//! crates/classification_core/src/category.rs
//!
//! The category store: every mutation of the hierarchy goes through here so
//! that name, depth and acyclicity rules are checked before anything is written.

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Category, MAX_CATEGORY_DEPTH};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PortError};
use crate::tree::CategoryIndex;
use crate::validation;

//=========================================================================================
// Pure Rule Checks
//=========================================================================================

/// Rejects a placement whose deepest node would exceed the depth bound.
///
/// `parent_depth` is the path length of the new parent (0 for a root) and
/// `subtree_height` the number of levels being attached (1 for a single node).
pub fn check_depth(parent_depth: usize, subtree_height: usize) -> CoreResult<()> {
    let deepest = parent_depth + subtree_height;
    if deepest > MAX_CATEGORY_DEPTH {
        return Err(CoreError::DepthExceeded {
            depth: deepest,
            max: MAX_CATEGORY_DEPTH,
        });
    }
    Ok(())
}

/// Checks that a new node may be attached under `parent_id`.
pub fn plan_insert(index: &CategoryIndex, parent_id: Option<Uuid>) -> CoreResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if index.get(parent_id).is_none() {
        return Err(CoreError::NotFound(format!("Parent category {}", parent_id)));
    }
    check_depth(index.depth(parent_id), 1)
}

/// Checks that `id` may be moved under `new_parent` (or made a root).
///
/// The whole subtree moves with the node, so its height counts against the
/// depth bound, not just the node itself.
pub fn plan_reparent(
    index: &CategoryIndex,
    id: Uuid,
    new_parent: Option<Uuid>,
) -> CoreResult<()> {
    if new_parent == Some(id) {
        return Err(CoreError::SelfParent);
    }
    if index.get(id).is_none() {
        return Err(CoreError::NotFound(format!("Category {}", id)));
    }

    let parent_depth = match new_parent {
        None => 0,
        Some(parent_id) => {
            if index.get(parent_id).is_none() {
                return Err(CoreError::NotFound(format!("Parent category {}", parent_id)));
            }
            if index.is_on_path(id, parent_id) {
                return Err(CoreError::Cycle);
            }
            index.depth(parent_id)
        }
    };

    check_depth(parent_depth, index.subtree_height(id))
}

//=========================================================================================
// Store Operations
//=========================================================================================

pub async fn create(
    db: &dyn DatabaseService,
    name: &str,
    parent_id: Option<Uuid>,
) -> CoreResult<Category> {
    let name = validation::category_name(name)?;
    if parent_id.is_some() {
        let index = CategoryIndex::new(db.list_categories().await?);
        plan_insert(&index, parent_id)?;
    }

    let category = db.insert_category(&name, parent_id).await?;
    info!(category_id = %category.id, parent_id = ?parent_id, "Category created");
    Ok(category)
}

pub async fn rename(db: &dyn DatabaseService, id: Uuid, name: &str) -> CoreResult<Category> {
    let name = validation::category_name(name)?;
    let existing = db.get_category(id).await?;

    let category = db.update_category(id, &name, existing.parent_id).await?;
    debug!(category_id = %id, "Category renamed");
    Ok(category)
}

pub async fn reparent(
    db: &dyn DatabaseService,
    id: Uuid,
    new_parent: Option<Uuid>,
) -> CoreResult<Category> {
    let index = CategoryIndex::new(db.list_categories().await?);
    plan_reparent(&index, id, new_parent)?;

    // plan_reparent has already confirmed the node exists.
    let name = index
        .get(id)
        .map(|c| c.name.clone())
        .ok_or_else(|| CoreError::NotFound(format!("Category {}", id)))?;
    let category = db.update_category(id, &name, new_parent).await?;
    info!(category_id = %id, parent_id = ?new_parent, "Category moved");
    Ok(category)
}

/// Renames and reparents in one write. All checks run before the write.
pub async fn update(
    db: &dyn DatabaseService,
    id: Uuid,
    name: &str,
    new_parent: Option<Uuid>,
) -> CoreResult<Category> {
    let name = validation::category_name(name)?;
    let index = CategoryIndex::new(db.list_categories().await?);
    let unchanged_parent = index.get(id).map(|c| c.parent_id) == Some(new_parent);
    if unchanged_parent {
        debug!(category_id = %id, "Parent unchanged, skipping hierarchy checks");
    } else {
        plan_reparent(&index, id, new_parent)?;
    }

    let category = db.update_category(id, &name, new_parent).await?;
    info!(category_id = %id, parent_id = ?new_parent, "Category updated");
    Ok(category)
}

/// Deletes a category. The store refuses while a child or segment still
/// points at it, and the blockers are counted after that refusal.
pub async fn delete(db: &dyn DatabaseService, id: Uuid) -> CoreResult<()> {
    match db.delete_category(id).await {
        Ok(()) => {
            info!(category_id = %id, "Category deleted");
            Ok(())
        }
        Err(PortError::StillReferenced(_)) => Err(delete_blocker(db, id).await?),
        Err(e) => Err(e.into()),
    }
}

/// Children take precedence over segments.
async fn delete_blocker(db: &dyn DatabaseService, id: Uuid) -> CoreResult<CoreError> {
    let children = db.count_child_categories(id).await?;
    if children > 0 {
        return Ok(CoreError::HasChildren(children));
    }
    let segments = db.count_segments_in_category(id).await?;
    debug!(category_id = %id, segments, "Category delete refused");
    Ok(CoreError::InUse(segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chain(len: usize) -> Vec<Category> {
        let now = Utc::now();
        let mut nodes: Vec<Category> = Vec::new();
        for level in 0..len {
            nodes.push(Category {
                id: Uuid::new_v4(),
                name: format!("L{}", level + 1),
                parent_id: nodes.last().map(|p| p.id),
                created_at: now,
                updated_at: now,
            });
        }
        nodes
    }

    #[test]
    fn sixth_level_is_allowed_seventh_is_not() {
        let nodes = chain(6);
        let index = CategoryIndex::new(nodes.clone());

        assert!(plan_insert(&index, Some(nodes[4].id)).is_ok());
        assert!(matches!(
            plan_insert(&index, Some(nodes[5].id)),
            Err(CoreError::DepthExceeded { depth: 7, max: 6 })
        ));
    }

    #[test]
    fn insert_under_missing_parent_is_not_found() {
        let index = CategoryIndex::new(chain(2));
        assert!(matches!(
            plan_insert(&index, Some(Uuid::new_v4())),
            Err(CoreError::NotFound(_))
        ));
        assert!(plan_insert(&index, None).is_ok());
    }

    #[test]
    fn self_parent_is_rejected_first() {
        let nodes = chain(1);
        let index = CategoryIndex::new(nodes.clone());
        assert!(matches!(
            plan_reparent(&index, nodes[0].id, Some(nodes[0].id)),
            Err(CoreError::SelfParent)
        ));
    }

    #[test]
    fn moving_under_a_descendant_is_a_cycle() {
        let nodes = chain(3);
        let index = CategoryIndex::new(nodes.clone());
        assert!(matches!(
            plan_reparent(&index, nodes[0].id, Some(nodes[2].id)),
            Err(CoreError::Cycle)
        ));
    }

    #[test]
    fn moving_a_subtree_counts_its_height() {
        // L1..L4 on one branch, a separate 3-level branch X1..X3.
        let deep = chain(4);
        let other = chain(3);
        let mut all = deep.clone();
        all.extend(other.clone());
        let index = CategoryIndex::new(all);

        // X1 (height 3) under L3 (depth 3) reaches depth 6: fine.
        assert!(plan_reparent(&index, other[0].id, Some(deep[2].id)).is_ok());
        // Under L4 (depth 4) the leaf would land at depth 7.
        assert!(matches!(
            plan_reparent(&index, other[0].id, Some(deep[3].id)),
            Err(CoreError::DepthExceeded { depth: 7, .. })
        ));
    }

    #[test]
    fn making_a_node_a_root_is_allowed() {
        let nodes = chain(4);
        let index = CategoryIndex::new(nodes.clone());
        assert!(plan_reparent(&index, nodes[2].id, None).is_ok());
    }
}

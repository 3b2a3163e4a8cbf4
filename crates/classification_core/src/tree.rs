//! crates/classification_core/src/tree.rs
//!
//! Converts between the flat, parent-pointer category collection and the
//! nested hierarchy, and answers ancestry questions about single nodes.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::{Category, CategoryNode};

//=========================================================================================
// Flat Index
//=========================================================================================

/// An id-keyed view over the flat category collection.
///
/// Every walk tolerates dangling parent references (the walk simply stops) and
/// guards against corrupted cyclic data by never visiting a node twice.
#[derive(Debug, Default)]
pub struct CategoryIndex {
    by_id: HashMap<Uuid, Category>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl CategoryIndex {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut by_id = HashMap::new();
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for category in categories {
            if let Some(parent_id) = category.parent_id {
                children.entry(parent_id).or_default().push(category.id);
            }
            by_id.insert(category.id, category);
        }
        Self { by_id, children }
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// The root-first path ending at `id`, or an empty path if `id` is unknown.
    ///
    /// If a parent reference points at a missing category the path starts at
    /// the last node that could be resolved.
    pub fn path(&self, id: Uuid) -> Vec<&Category> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.by_id.get(&id);

        while let Some(category) = current {
            if !seen.insert(category.id) {
                break;
            }
            path.push(category);
            current = category.parent_id.and_then(|parent| self.by_id.get(&parent));
        }

        path.reverse();
        path
    }

    /// Number of nodes on the root-first path ending at `id` (0 if unknown).
    pub fn depth(&self, id: Uuid) -> usize {
        self.path(id).len()
    }

    /// True when `ancestor` lies on the path from the root to `id`, `id` included.
    pub fn is_on_path(&self, ancestor: Uuid, id: Uuid) -> bool {
        self.path(id).iter().any(|c| c.id == ancestor)
    }

    /// Number of levels in the subtree rooted at `id`: 1 for a leaf.
    pub fn subtree_height(&self, id: Uuid) -> usize {
        let mut height = 0;
        let mut seen = HashSet::from([id]);
        let mut level = vec![id];

        while !level.is_empty() {
            height += 1;
            level = level
                .iter()
                .filter_map(|node| self.children.get(node))
                .flatten()
                .copied()
                .filter(|child| seen.insert(*child))
                .collect();
        }

        height
    }
}

//=========================================================================================
// Nested Tree
//=========================================================================================

/// Materializes the forest of categories from their parent pointers.
///
/// Roots are the categories without a parent. Siblings are ordered by name,
/// then id. Categories whose parent does not exist are not reachable from any
/// root and are left out.
pub fn build_tree(categories: &[Category]) -> Vec<CategoryNode> {
    let mut groups: HashMap<Option<Uuid>, Vec<&Category>> = HashMap::new();
    for category in categories {
        groups.entry(category.parent_id).or_default().push(category);
    }
    for siblings in groups.values_mut() {
        siblings.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    }

    let mut placed = HashSet::new();
    assemble(None, &groups, &mut placed)
}

fn assemble(
    parent: Option<Uuid>,
    groups: &HashMap<Option<Uuid>, Vec<&Category>>,
    placed: &mut HashSet<Uuid>,
) -> Vec<CategoryNode> {
    let Some(siblings) = groups.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(siblings.len());
    for category in siblings {
        if !placed.insert(category.id) {
            continue;
        }
        nodes.push(CategoryNode {
            category: (*category).clone(),
            children: assemble(Some(category.id), groups, placed),
        });
    }
    nodes
}

/// A node located in a tree together with the chain of its ancestors.
#[derive(Debug)]
pub struct TreeMatch<'a> {
    pub node: &'a CategoryNode,
    /// Root-first, not including the node itself.
    pub ancestors: Vec<&'a Category>,
}

impl<'a> TreeMatch<'a> {
    /// Root-first chain ending at the matched node.
    pub fn breadcrumb(&self) -> Vec<&'a Category> {
        let mut crumbs = self.ancestors.clone();
        crumbs.push(&self.node.category);
        crumbs
    }
}

/// Depth-first search for `target`, returning the node and its ancestors.
pub fn find_in_tree(tree: &[CategoryNode], target: Uuid) -> Option<TreeMatch<'_>> {
    fn walk<'a>(
        nodes: &'a [CategoryNode],
        target: Uuid,
        trail: &mut Vec<&'a Category>,
    ) -> Option<&'a CategoryNode> {
        for node in nodes {
            if node.category.id == target {
                return Some(node);
            }
            trail.push(&node.category);
            if let Some(found) = walk(&node.children, target, trail) {
                return Some(found);
            }
            trail.pop();
        }
        None
    }

    let mut trail = Vec::new();
    let node = walk(tree, target, &mut trail)?;
    Some(TreeMatch {
        node,
        ancestors: trail,
    })
}

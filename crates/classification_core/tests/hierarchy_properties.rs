//! Property-based checks of the category hierarchy under random sequences of
//! creates, reparents and deletes.

mod common;

use proptest::prelude::*;
use tokio::runtime::Runtime;
use uuid::Uuid;

use classification_core::tree::{build_tree, find_in_tree, CategoryIndex};
use classification_core::{Catalog, Category, CategoryNode, MAX_CATEGORY_DEPTH};
use common::catalog;

#[derive(Debug, Clone)]
enum Op {
    /// Parent is an index into the categories created so far, wrapped.
    Create { parent: Option<usize> },
    Reparent { node: usize, parent: Option<usize> },
    Delete { node: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::option::weighted(0.85, 0usize..64).prop_map(|parent| Op::Create { parent }),
        3 => (0usize..64, proptest::option::weighted(0.8, 0usize..64))
            .prop_map(|(node, parent)| Op::Reparent { node, parent }),
        1 => (0usize..64).prop_map(|node| Op::Delete { node }),
    ]
}

fn pick(ids: &[Uuid], slot: usize) -> Option<Uuid> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[slot % ids.len()])
    }
}

async fn snapshot(catalog: &Catalog) -> Vec<Category> {
    catalog.list_categories().await.unwrap()
}

fn count_nodes(nodes: &[CategoryNode]) -> usize {
    nodes.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

/// Runs one op. Returns whether the store accepted it.
async fn apply(catalog: &Catalog, ids: &mut Vec<Uuid>, op: &Op, step: usize) -> bool {
    match *op {
        Op::Create { parent } => {
            let parent = parent.and_then(|slot| pick(ids, slot));
            match catalog.create_category(&format!("c{}", step), parent).await {
                Ok(created) => {
                    ids.push(created.id);
                    true
                }
                Err(_) => false,
            }
        }
        Op::Reparent { node, parent } => {
            let Some(id) = pick(ids, node) else {
                return false;
            };
            let parent = parent.and_then(|slot| pick(ids, slot));
            catalog.reparent_category(id, parent).await.is_ok()
        }
        Op::Delete { node } => {
            let Some(id) = pick(ids, node) else {
                return false;
            };
            let deleted = catalog.delete_category(id).await.is_ok();
            if deleted {
                ids.retain(|existing| *existing != id);
            }
            deleted
        }
    }
}

fn check_invariants(categories: &[Category]) -> Result<(), TestCaseError> {
    let index = CategoryIndex::new(categories.iter().cloned());
    let tree = build_tree(categories);

    // Every category is reachable from a root, so the tree holds all of them.
    prop_assert_eq!(count_nodes(&tree), categories.len());

    for category in categories {
        let path = index.path(category.id);
        prop_assert!(!path.is_empty());
        prop_assert!(path.len() <= MAX_CATEGORY_DEPTH);
        prop_assert!(path[0].parent_id.is_none(), "path does not start at a root");
        prop_assert_eq!(path.last().map(|c| c.id), Some(category.id));

        let found = find_in_tree(&tree, category.id);
        prop_assert!(found.is_some());
        let crumbs: Vec<Uuid> = found.unwrap().breadcrumb().iter().map(|c| c.id).collect();
        let expected: Vec<Uuid> = path.iter().map(|c| c.id).collect();
        prop_assert_eq!(crumbs, expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hierarchy_stays_bounded_and_acyclic(ops in prop::collection::vec(arb_op(), 1..60)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let catalog = catalog();
            let mut ids: Vec<Uuid> = Vec::new();

            for (step, op) in ops.iter().enumerate() {
                let before = snapshot(&catalog).await;
                let accepted = apply(&catalog, &mut ids, op, step).await;
                let after = snapshot(&catalog).await;

                if !accepted {
                    prop_assert_eq!(&before, &after, "rejected {:?} changed the store", op);
                }
                check_invariants(&after)?;
            }
            Ok(())
        })?;
    }
}

//! Shared fixtures for the catalog integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use classification_core::{Actor, Catalog, Category, Material, MemoryStore};
use uuid::Uuid;

pub fn catalog() -> Catalog {
    Catalog::new(Arc::new(MemoryStore::new()))
}

pub fn admin() -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        is_admin: true,
        can_edit_categories: true,
        assigned_materials: Vec::new(),
    }
}

pub async fn material(catalog: &Catalog, title: &str) -> Material {
    catalog
        .create_material(title, "Ibn Example")
        .await
        .expect("material is valid")
}

/// Creates `names` as a single chain, each under the previous one.
pub async fn chain(catalog: &Catalog, names: &[&str]) -> Vec<Category> {
    let mut created: Vec<Category> = Vec::new();
    for name in names {
        let parent = created.last().map(|c| c.id);
        created.push(
            catalog
                .create_category(name, parent)
                .await
                .expect("chain level is valid"),
        );
    }
    created
}

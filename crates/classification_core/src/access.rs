//! crates/classification_core/src/access.rs
//!
//! Who may touch what. The rules are evaluated by callers before they invoke
//! catalog operations; the catalog itself is permission-agnostic.

use uuid::Uuid;

use crate::domain::{Material, User};
use crate::error::{CoreError, CoreResult};

/// The authenticated user on whose behalf a request runs.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub can_edit_categories: bool,
    pub assigned_materials: Vec<Uuid>,
}

impl From<User> for Actor {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            is_admin: user.is_admin,
            can_edit_categories: user.can_edit_categories,
            assigned_materials: user.assigned_materials,
        }
    }
}

impl Actor {
    pub fn can_access_material(&self, material_id: Uuid) -> bool {
        self.is_admin || self.assigned_materials.contains(&material_id)
    }

    /// The materials this actor may see, or `None` for all of them.
    pub fn material_scope(&self) -> Option<Vec<Uuid>> {
        if self.is_admin {
            None
        } else {
            Some(self.assigned_materials.clone())
        }
    }

    pub fn require_material(&self, material_id: Uuid) -> CoreResult<()> {
        if self.can_access_material(material_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }

    pub fn require_category_editor(&self) -> CoreResult<()> {
        if self.is_admin || self.can_edit_categories {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }

    /// Keeps only the materials this actor may see.
    pub fn visible_materials(&self, materials: Vec<Material>) -> Vec<Material> {
        materials
            .into_iter()
            .filter(|m| self.can_access_material(m.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor(is_admin: bool, can_edit_categories: bool, assigned: Vec<Uuid>) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            is_admin,
            can_edit_categories,
            assigned_materials: assigned,
        }
    }

    fn material() -> Material {
        let now = Utc::now();
        Material {
            id: Uuid::new_v4(),
            title: "t".into(),
            author: "a".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admins_see_everything() {
        let admin = actor(true, false, vec![]);
        assert!(admin.require_material(Uuid::new_v4()).is_ok());
        assert!(admin.require_category_editor().is_ok());
        assert!(admin.require_admin().is_ok());
    }

    #[test]
    fn editors_only_see_assigned_materials() {
        let assigned = material();
        let other = material();
        let editor = actor(false, false, vec![assigned.id]);

        assert!(editor.require_material(assigned.id).is_ok());
        assert!(matches!(
            editor.require_material(other.id),
            Err(CoreError::Forbidden)
        ));

        let visible = editor.visible_materials(vec![assigned.clone(), other]);
        assert_eq!(visible, vec![assigned]);
    }

    #[test]
    fn category_editing_needs_the_flag() {
        assert!(actor(false, false, vec![]).require_category_editor().is_err());
        assert!(actor(false, true, vec![]).require_category_editor().is_ok());
        assert!(actor(false, true, vec![]).require_admin().is_err());
    }
}

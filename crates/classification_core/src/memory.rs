//! crates/classification_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used by the
//! test suites and for running the service without a database.
//!
//! All state sits behind one `RwLock`, so every operation, including the
//! read-max-then-write of `append_segment`, is atomic with respect to others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Category, Material, NewSegment, NewUser, ReorderOutcome, Segment, SegmentFilter,
    SegmentOrder, SegmentPatch, User, UserCredentials, UserPatch,
};
use crate::ordering;
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct State {
    categories: HashMap<Uuid, Category>,
    materials: HashMap<Uuid, Material>,
    segments: HashMap<Uuid, Segment>,
    users: HashMap<Uuid, (User, String)>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    last_tick: Option<DateTime<Utc>>,
}

impl State {
    /// A strictly increasing timestamp, so creation order is never ambiguous.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn next_order_index(&self, material_id: Uuid) -> i64 {
        ordering::next_order_index(
            self.segments
                .values()
                .filter(|s| s.material_id == material_id)
                .map(|s| s.order_index),
        )
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    // --- Categories ---
    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> PortResult<Category> {
        let state = self.state.read().await;
        state
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Category", id))
    }

    async fn insert_category(&self, name: &str, parent_id: Option<Uuid>) -> PortResult<Category> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> PortResult<Category> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found("Category", id))?;
        category.name = name.to_string();
        category.parent_id = parent_id;
        category.updated_at = now;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&id) {
            return Err(not_found("Category", id));
        }
        // Mirrors the ON DELETE RESTRICT foreign keys of the SQL schema.
        let referenced = state.categories.values().any(|c| c.parent_id == Some(id))
            || state.segments.values().any(|s| s.category_id == Some(id));
        if referenced {
            return Err(PortError::StillReferenced(format!("Category {}", id)));
        }
        state.categories.remove(&id);
        Ok(())
    }

    async fn count_child_categories(&self, id: Uuid) -> PortResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .categories
            .values()
            .filter(|c| c.parent_id == Some(id))
            .count() as u64)
    }

    async fn count_segments_in_category(&self, id: Uuid) -> PortResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .segments
            .values()
            .filter(|s| s.category_id == Some(id))
            .count() as u64)
    }

    // --- Materials ---
    async fn list_materials(&self) -> PortResult<Vec<Material>> {
        let state = self.state.read().await;
        let mut materials: Vec<Material> = state.materials.values().cloned().collect();
        materials.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(materials)
    }

    async fn get_material(&self, id: Uuid) -> PortResult<Material> {
        let state = self.state.read().await;
        state
            .materials
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Material", id))
    }

    async fn insert_material(&self, title: &str, author: &str) -> PortResult<Material> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let material = Material {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.materials.insert(material.id, material.clone());
        Ok(material)
    }

    async fn update_material(&self, id: Uuid, title: &str, author: &str) -> PortResult<Material> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let material = state
            .materials
            .get_mut(&id)
            .ok_or_else(|| not_found("Material", id))?;
        material.title = title.to_string();
        material.author = author.to_string();
        material.updated_at = now;
        Ok(material.clone())
    }

    async fn delete_material(&self, id: Uuid) -> PortResult<u64> {
        let mut state = self.state.write().await;
        if state.materials.remove(&id).is_none() {
            return Err(not_found("Material", id));
        }
        let before = state.segments.len();
        state.segments.retain(|_, s| s.material_id != id);
        let removed = (before - state.segments.len()) as u64;
        for (user, _) in state.users.values_mut() {
            user.assigned_materials.retain(|m| *m != id);
        }
        Ok(removed)
    }

    // --- Segments ---
    async fn append_segment(&self, segment: NewSegment) -> PortResult<Segment> {
        let mut state = self.state.write().await;
        if !state.materials.contains_key(&segment.material_id) {
            return Err(not_found("Material", segment.material_id));
        }
        let now = state.tick();
        let order_index = state.next_order_index(segment.material_id);
        let segment = Segment {
            id: Uuid::new_v4(),
            material_id: segment.material_id,
            content: segment.content,
            page_number: segment.page_number,
            category_id: segment.category_id,
            order_index,
            created_at: now,
            updated_at: now,
        };
        state.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    async fn get_segment(&self, id: Uuid) -> PortResult<Segment> {
        let state = self.state.read().await;
        state
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Segment", id))
    }

    async fn update_segment(&self, id: Uuid, patch: SegmentPatch) -> PortResult<Segment> {
        let mut state = self.state.write().await;
        let current_material = state
            .segments
            .get(&id)
            .map(|s| s.material_id)
            .ok_or_else(|| not_found("Segment", id))?;

        let moved_to = patch.material_id.filter(|m| *m != current_material);
        let new_index = match moved_to {
            Some(target) => {
                if !state.materials.contains_key(&target) {
                    return Err(not_found("Material", target));
                }
                Some(state.next_order_index(target))
            }
            None => None,
        };

        let now = state.tick();
        let segment = state
            .segments
            .get_mut(&id)
            .ok_or_else(|| not_found("Segment", id))?;
        if let Some(content) = patch.content {
            segment.content = content;
        }
        if let Some(page_number) = patch.page_number {
            segment.page_number = page_number;
        }
        if let Some(category_id) = patch.category_id {
            segment.category_id = category_id;
        }
        if let (Some(target), Some(index)) = (moved_to, new_index) {
            segment.material_id = target;
            segment.order_index = index;
        }
        segment.updated_at = now;
        Ok(segment.clone())
    }

    async fn delete_segment(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state.write().await;
        state
            .segments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Segment", id))
    }

    async fn segments_for_material(&self, material_id: Uuid) -> PortResult<Vec<Segment>> {
        let state = self.state.read().await;
        Ok(state
            .segments
            .values()
            .filter(|s| s.material_id == material_id)
            .cloned()
            .collect())
    }

    async fn query_segments(&self, filter: &SegmentFilter) -> PortResult<(Vec<Segment>, u64)> {
        let state = self.state.read().await;
        let mut matching: Vec<Segment> = state
            .segments
            .values()
            .filter(|s| filter.material_id.map_or(true, |m| s.material_id == m))
            .filter(|s| filter.category_id.map_or(true, |c| s.category_id == Some(c)))
            .filter(|s| {
                filter
                    .material_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&s.material_id))
            })
            .cloned()
            .collect();
        ordering::sort_segments(&mut matching, SegmentOrder::Recent);

        let total = matching.len() as u64;
        let skip = (filter.page.saturating_sub(1) as usize) * filter.limit as usize;
        let items = matching
            .into_iter()
            .skip(skip)
            .take(filter.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn apply_segment_order(
        &self,
        material_id: Uuid,
        assignments: &[(Uuid, i64)],
    ) -> PortResult<ReorderOutcome> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let mut outcome = ReorderOutcome {
            requested: assignments.len() as u64,
            ..Default::default()
        };

        for (id, index) in assignments {
            let Some(segment) = state
                .segments
                .get_mut(id)
                .filter(|s| s.material_id == material_id)
            else {
                continue;
            };
            outcome.matched += 1;
            if segment.order_index != *index {
                segment.order_index = *index;
                segment.updated_at = now;
                outcome.modified += 1;
            }
        }
        Ok(outcome)
    }

    // --- Users ---
    async fn list_users(&self) -> PortResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().map(|(u, _)| u.clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| not_found("User", id))
    }

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|(u, _)| u.username == username)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                username: u.username.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| not_found("User", username))
    }

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|(u, _)| u.username == user.username) {
            return Err(PortError::Conflict(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        let now = state.tick();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            is_admin: user.is_admin,
            can_edit_categories: user.can_edit_categories,
            assigned_materials: user.assigned_materials,
            created_at: now,
        };
        state
            .users
            .insert(created.id, (created.clone(), user.hashed_password));
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> PortResult<User> {
        let mut state = self.state.write().await;
        let (user, hash) = state
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found("User", id))?;
        if let Some(new_hash) = patch.hashed_password {
            *hash = new_hash;
        }
        if let Some(is_admin) = patch.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(can_edit) = patch.can_edit_categories {
            user.can_edit_categories = can_edit;
        }
        if let Some(assigned) = patch.assigned_materials {
            user.assigned_materials = assigned;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state.write().await;
        state.users.remove(&id).ok_or_else(|| not_found("User", id))?;
        state.auth_sessions.retain(|_, (user_id, _)| *user_id != id);
        Ok(())
    }

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        let mut state = self.state.write().await;
        state
            .auth_sessions
            .insert(session.id.clone(), (session.user_id, session.expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let state = self.state.read().await;
        match state.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut state = self.state.write().await;
        state.auth_sessions.remove(session_id);
        Ok(())
    }
}

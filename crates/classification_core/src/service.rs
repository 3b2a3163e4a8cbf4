//! crates/classification_core/src/service.rs
//!
//! `Catalog` is the single entry point the HTTP layer talks to. It validates
//! input, delegates the hierarchy, ordering, ancestry and export rules to their
//! modules, and maps store failures into `CoreError`.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::access::Actor;
use crate::ancestry;
use crate::category;
use crate::domain::{
    Category, CategoryNode, ExportArtifact, Material, MaterialSegments, NewSegment, NewUser,
    Paged, ReorderOutcome, Segment, SegmentFilter, SegmentOrder, SegmentPatch, User,
    UserPatch,
};
use crate::error::{CoreError, CoreResult};
use crate::export;
use crate::ordering;
use crate::ports::DatabaseService;
use crate::tree::{self, CategoryIndex};
use crate::validation;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// The category hierarchy, segment ordering and export operations, bound to a store.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<dyn DatabaseService>,
}

impl Catalog {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub fn store(&self) -> &dyn DatabaseService {
        self.db.as_ref()
    }

    //=====================================================================================
    // Categories
    //=====================================================================================

    pub async fn create_category(&self, name: &str, parent_id: Option<Uuid>) -> CoreResult<Category> {
        category::create(self.store(), name, parent_id).await
    }

    pub async fn rename_category(&self, id: Uuid, name: &str) -> CoreResult<Category> {
        category::rename(self.store(), id, name).await
    }

    pub async fn reparent_category(&self, id: Uuid, new_parent: Option<Uuid>) -> CoreResult<Category> {
        category::reparent(self.store(), id, new_parent).await
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        new_parent: Option<Uuid>,
    ) -> CoreResult<Category> {
        category::update(self.store(), id, name, new_parent).await
    }

    pub async fn delete_category(&self, id: Uuid) -> CoreResult<()> {
        category::delete(self.store(), id).await
    }

    /// All categories, name ascending.
    pub async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        Ok(self.db.list_categories().await?)
    }

    pub async fn category_tree(&self) -> CoreResult<Vec<CategoryNode>> {
        let categories = self.db.list_categories().await?;
        Ok(tree::build_tree(&categories))
    }

    /// Root-first path ending at `id`. Unknown ids and broken links give a
    /// shorter (possibly empty) path rather than an error.
    pub async fn category_path(&self, id: Uuid) -> CoreResult<Vec<Category>> {
        let index = CategoryIndex::new(self.db.list_categories().await?);
        Ok(index.path(id).into_iter().cloned().collect())
    }

    /// A single category and its breadcrumb. Unlike `category_path`, an
    /// unknown id is reported as not found.
    pub async fn category_with_path(&self, id: Uuid) -> CoreResult<(Category, Vec<Category>)> {
        let index = CategoryIndex::new(self.db.list_categories().await?);
        let category = index
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Category {}", id)))?;
        let path = index.path(id).into_iter().cloned().collect();
        Ok((category, path))
    }

    //=====================================================================================
    // Materials
    //=====================================================================================

    pub async fn create_material(&self, title: &str, author: &str) -> CoreResult<Material> {
        let title = validation::material_title(title)?;
        let author = validation::material_author(author)?;
        let material = self.db.insert_material(&title, &author).await?;
        info!(material_id = %material.id, "Material created");
        Ok(material)
    }

    pub async fn update_material(&self, id: Uuid, title: &str, author: &str) -> CoreResult<Material> {
        let title = validation::material_title(title)?;
        let author = validation::material_author(author)?;
        Ok(self.db.update_material(id, &title, &author).await?)
    }

    pub async fn get_material(&self, id: Uuid) -> CoreResult<Material> {
        Ok(self.db.get_material(id).await?)
    }

    /// Materials visible to `actor`, newest first.
    pub async fn list_materials(&self, actor: &Actor) -> CoreResult<Vec<Material>> {
        let materials = self.db.list_materials().await?;
        Ok(actor.visible_materials(materials))
    }

    /// Deletes the material and all of its segments. Returns the number of
    /// segments removed.
    pub async fn delete_material(&self, id: Uuid) -> CoreResult<u64> {
        let removed = self.db.delete_material(id).await?;
        info!(material_id = %id, segments_removed = removed, "Material deleted");
        Ok(removed)
    }

    //=====================================================================================
    // Segments
    //=====================================================================================

    async fn ensure_category(&self, category_id: Option<Uuid>) -> CoreResult<()> {
        if let Some(id) = category_id {
            self.db.get_category(id).await?;
        }
        Ok(())
    }

    /// Creates a segment at the end of its material's display order.
    pub async fn create_segment(
        &self,
        material_id: Uuid,
        content: &str,
        page_number: i32,
        category_id: Option<Uuid>,
    ) -> CoreResult<Segment> {
        let content = validation::segment_content(content)?;
        let page_number = validation::page_number(page_number)?;
        self.db.get_material(material_id).await?;
        self.ensure_category(category_id).await?;

        let segment = self
            .db
            .append_segment(NewSegment {
                material_id,
                content,
                page_number,
                category_id,
            })
            .await?;
        debug!(
            segment_id = %segment.id,
            material_id = %material_id,
            order_index = segment.order_index,
            "Segment appended"
        );
        Ok(segment)
    }

    pub async fn get_segment(&self, id: Uuid) -> CoreResult<Segment> {
        Ok(self.db.get_segment(id).await?)
    }

    pub async fn update_segment(&self, id: Uuid, mut patch: SegmentPatch) -> CoreResult<Segment> {
        if patch.is_empty() {
            return self.get_segment(id).await;
        }
        if let Some(content) = patch.content.as_deref() {
            patch.content = Some(validation::segment_content(content)?);
        }
        if let Some(page) = patch.page_number {
            validation::page_number(page)?;
        }
        if let Some(category_id) = patch.category_id {
            self.ensure_category(category_id).await?;
        }
        Ok(self.db.update_segment(id, patch).await?)
    }

    /// Deletes one segment. Remaining indices are not compacted.
    pub async fn delete_segment(&self, id: Uuid) -> CoreResult<()> {
        self.db.delete_segment(id).await?;
        debug!(segment_id = %id, "Segment deleted");
        Ok(())
    }

    pub async fn list_segments(&self, material_id: Uuid, order: SegmentOrder) -> CoreResult<Vec<Segment>> {
        ordering::list(self.store(), material_id, order).await
    }

    /// Newest-first, paginated segment search.
    pub async fn query_segments(&self, mut filter: SegmentFilter) -> CoreResult<Paged<Segment>> {
        filter.page = filter.page.max(1);
        filter.limit = match filter.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        };

        let (items, total) = self.db.query_segments(&filter).await?;
        Ok(Paged {
            items,
            page: filter.page,
            limit: filter.limit,
            total,
            total_pages: total.div_ceil(u64::from(filter.limit)),
        })
    }

    /// The newest segments, optionally restricted to a set of materials
    /// before the limit is applied.
    pub async fn recent_segments(
        &self,
        limit: Option<u32>,
        material_ids: Option<Vec<Uuid>>,
    ) -> CoreResult<Vec<Segment>> {
        let page = self
            .query_segments(SegmentFilter {
                material_ids,
                page: 1,
                limit: limit.unwrap_or(DEFAULT_RECENT_LIMIT),
                ..Default::default()
            })
            .await?;
        Ok(page.items)
    }

    pub async fn reorder_segments(
        &self,
        material_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> CoreResult<ReorderOutcome> {
        ordering::reorder(self.store(), material_id, ordered_ids).await
    }

    /// The material's segments in display order, each with its flattened
    /// category ancestry.
    pub async fn segments_with_ancestry(&self, material_id: Uuid) -> CoreResult<MaterialSegments> {
        let material = self.db.get_material(material_id).await?;
        let (categories, mut segments) = futures::try_join!(
            self.db.list_categories(),
            self.db.segments_for_material(material_id),
        )?;

        ordering::sort_segments(&mut segments, SegmentOrder::Display);
        let index = CategoryIndex::new(categories);
        Ok(MaterialSegments {
            material,
            segments: ancestry::resolve(segments, &index),
        })
    }

    /// Renders the material into an `.xlsx` workbook.
    pub async fn export_material(&self, material_id: Uuid) -> CoreResult<ExportArtifact> {
        let MaterialSegments { material, segments } =
            self.segments_with_ancestry(material_id).await?;
        let rows = export::build_rows(&segments);
        let bytes = export::render_workbook(&rows)?;

        info!(material_id = %material_id, rows = rows.len(), "Material exported");
        Ok(ExportArtifact {
            filename: export::export_filename(&material.title),
            bytes,
        })
    }

    //=====================================================================================
    // Users
    //=====================================================================================

    /// Loads the access profile for an authenticated user id.
    pub async fn actor(&self, user_id: Uuid) -> CoreResult<Actor> {
        let user = self.db.get_user(user_id).await.map_err(|e| match e {
            crate::ports::PortError::NotFound(_) => CoreError::Unauthorized,
            other => other.into(),
        })?;
        Ok(Actor::from(user))
    }

    pub async fn list_users(&self) -> CoreResult<Vec<User>> {
        Ok(self.db.list_users().await?)
    }

    /// Creates a user. The password must already be hashed; check its plain
    /// form with `validation::password` first.
    pub async fn create_user(&self, mut user: NewUser) -> CoreResult<User> {
        user.username = validation::username(&user.username)?;
        let created = self.db.create_user(user).await?;
        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> CoreResult<User> {
        Ok(self.db.update_user(id, patch).await?)
    }

    pub async fn delete_user(&self, id: Uuid) -> CoreResult<()> {
        self.db.delete_user(id).await?;
        info!(user_id = %id, "User deleted");
        Ok(())
    }
}

//! services/api/src/web/dto.rs
//!
//! JSON request and response payloads for the REST API, and their
//! conversions from the core domain types.

use chrono::{DateTime, Utc};
use classification_core::domain::{
    Category, CategoryNode, Material, MaterialSegments, Paged, ReorderOutcome, Segment,
    SegmentOrder, SegmentPatch, SegmentWithAncestry, User,
};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Categories
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            parent_id: c.parent_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTreeNode {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    #[schema(no_recursion)]
    pub children: Vec<CategoryTreeNode>,
}

impl From<CategoryNode> for CategoryTreeNode {
    fn from(node: CategoryNode) -> Self {
        Self {
            id: node.category.id,
            name: node.category.name,
            parent_id: node.category.parent_id,
            children: node.children.into_iter().map(Self::from).collect(),
        }
    }
}

/// One breadcrumb entry.
#[derive(Serialize, ToSchema)]
pub struct PathEntry {
    pub id: Uuid,
    pub name: String,
}

impl From<Category> for PathEntry {
    fn from(c: Category) -> Self {
        Self { id: c.id, name: c.name }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CategoryDetail {
    pub category: CategoryDto,
    /// Root-first, ending at the category itself.
    pub path: Vec<PathEntry>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Full replacement of a category's name and parent.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

//=========================================================================================
// Materials
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Material> for MaterialDto {
    fn from(m: Material) -> Self {
        Self {
            id: m.id,
            title: m.title,
            author: m.author,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct MaterialRequest {
    pub title: String,
    pub author: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMaterialResponse {
    pub deleted_segments: u64,
}

//=========================================================================================
// Segments
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDto {
    pub id: Uuid,
    pub material_id: Uuid,
    pub content: String,
    pub page_number: i32,
    pub category_id: Option<Uuid>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Segment> for SegmentDto {
    fn from(s: Segment) -> Self {
        Self {
            id: s.id,
            material_id: s.material_id,
            content: s.content,
            page_number: s.page_number,
            category_id: s.category_id,
            order_index: s.order_index,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentWithAncestryDto {
    #[serde(flatten)]
    pub segment: SegmentDto,
    /// Six level names, root first, padded with empty strings.
    pub category_path: Vec<String>,
    pub category_name: String,
}

impl From<SegmentWithAncestry> for SegmentWithAncestryDto {
    fn from(s: SegmentWithAncestry) -> Self {
        Self {
            segment: s.segment.into(),
            category_path: s.category_path.into_iter().collect(),
            category_name: s.category_name,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MaterialPreview {
    pub material: MaterialDto,
    pub segments: Vec<SegmentWithAncestryDto>,
}

impl From<MaterialSegments> for MaterialPreview {
    fn from(m: MaterialSegments) -> Self {
        Self {
            material: m.material.into(),
            segments: m.segments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPage {
    pub items: Vec<SegmentDto>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl From<Paged<Segment>> for SegmentPage {
    fn from(p: Paged<Segment>) -> Self {
        Self {
            items: p.items.into_iter().map(Into::into).collect(),
            page: p.page,
            limit: p.limit,
            total: p.total,
            total_pages: p.total_pages,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentRequest {
    pub material_id: Uuid,
    pub content: String,
    pub page_number: i32,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

/// Partial update. An explicit `"categoryId": null` clears the category;
/// leaving the key out keeps it.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSegmentRequest {
    pub content: Option<String>,
    pub page_number: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Uuid>)]
    pub category_id: Option<Option<Uuid>>,
    pub material_id: Option<Uuid>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

impl From<UpdateSegmentRequest> for SegmentPatch {
    fn from(r: UpdateSegmentRequest) -> Self {
        Self {
            content: r.content,
            page_number: r.page_number,
            category_id: r.category_id,
            material_id: r.material_id,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    #[serde(alias = "orderedIds")]
    pub segment_ids: Vec<Uuid>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderResponse {
    pub requested: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    /// True when some ids no longer matched a segment at write time.
    pub partial: bool,
}

impl From<ReorderOutcome> for ReorderResponse {
    fn from(o: ReorderOutcome) -> Self {
        Self {
            requested: o.requested,
            matched_count: o.matched,
            modified_count: o.modified,
            partial: o.is_partial(),
        }
    }
}

#[derive(Deserialize, ToSchema, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderParam {
    #[default]
    Display,
    Page,
    Recent,
}

impl From<OrderParam> for SegmentOrder {
    fn from(o: OrderParam) -> Self {
        match o {
            OrderParam::Display => SegmentOrder::Display,
            OrderParam::Page => SegmentOrder::Page,
            OrderParam::Recent => SegmentOrder::Recent,
        }
    }
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct OrderQuery {
    /// `display` (default), `page` or `recent`.
    pub order: Option<OrderParam>,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQuery {
    pub material_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// 1-based, defaults to 1.
    pub page: Option<u32>,
    /// Defaults to 50, capped at 200.
    pub limit: Option<u32>,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    /// Defaults to 10.
    pub limit: Option<u32>,
}

//=========================================================================================
// Users & Auth
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub can_edit_categories: bool,
    pub assigned_materials: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            is_admin: u.is_admin,
            can_edit_categories: u.can_edit_categories,
            assigned_materials: u.assigned_materials,
            created_at: u.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub can_edit_categories: bool,
    #[serde(default)]
    pub assigned_materials: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub is_admin: Option<bool>,
    pub can_edit_categories: Option<bool>,
    pub assigned_materials: Option<Vec<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_id_distinguishes_null_from_missing() {
        let kept: UpdateSegmentRequest = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert_eq!(kept.category_id, None);

        let cleared: UpdateSegmentRequest =
            serde_json::from_str(r#"{"categoryId":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateSegmentRequest =
            serde_json::from_str(&format!(r#"{{"categoryId":"{}"}}"#, id)).unwrap();
        assert_eq!(set.category_id, Some(Some(id)));
    }

    #[test]
    fn reorder_takes_either_id_key() {
        let id = Uuid::new_v4();
        for key in ["segmentIds", "orderedIds"] {
            let req: ReorderRequest =
                serde_json::from_str(&format!(r#"{{"{}":["{}"]}}"#, key, id)).unwrap();
            assert_eq!(req.segment_ids, vec![id]);
        }
    }

    #[test]
    fn order_param_is_lowercase() {
        let q: OrderQuery = serde_json::from_str(r#"{"order":"page"}"#).unwrap();
        assert!(matches!(q.order, Some(OrderParam::Page)));
    }
}

//! crates/classification_core/src/domain.rs
//!
//! Defines the pure, core data structures for the classification dashboard.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum number of nodes on any root-to-node category path.
pub const MAX_CATEGORY_DEPTH: usize = 6;

/// Number of category level columns produced by ancestry flattening.
pub const LEVEL_COUNT: usize = MAX_CATEGORY_DEPTH;

/// A node in the classification hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category together with its nested children, as produced by the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// A book or reference document being segmented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page-referenced excerpt of a material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: Uuid,
    pub material_id: Uuid,
    pub content: String,
    pub page_number: i32,
    pub category_id: Option<Uuid>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new segment. The store assigns `order_index`.
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub material_id: Uuid,
    pub content: String,
    pub page_number: i32,
    pub category_id: Option<Uuid>,
}

/// A partial update to a segment. `None` leaves the field untouched;
/// `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub content: Option<String>,
    pub page_number: Option<i32>,
    pub category_id: Option<Option<Uuid>>,
    pub material_id: Option<Uuid>,
}

impl SegmentPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.page_number.is_none()
            && self.category_id.is_none()
            && self.material_id.is_none()
    }
}

/// The three independent orderings segments can be retrieved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentOrder {
    /// `order_index` ascending, page number as tie-break.
    #[default]
    Display,
    /// Page number ascending, creation time as tie-break.
    Page,
    /// Newest first.
    Recent,
}

/// Filter for the paginated segment listing.
#[derive(Debug, Clone, Default)]
pub struct SegmentFilter {
    pub material_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// When set, only segments of these materials match.
    pub material_ids: Option<Vec<Uuid>>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

/// A page of results plus the numbers a client needs to paginate.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Result of a bulk reorder. `matched < requested` signals stale ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReorderOutcome {
    pub requested: u64,
    pub matched: u64,
    pub modified: u64,
}

impl ReorderOutcome {
    pub fn is_partial(&self) -> bool {
        self.matched < self.requested
    }
}

/// A segment joined with its flattened category ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentWithAncestry {
    pub segment: Segment,
    /// Root-first category names, padded with empty strings.
    pub category_path: [String; LEVEL_COUNT],
    /// Name of the segment's own category, empty when uncategorized or dangling.
    pub category_name: String,
}

/// A material's segments with ancestry, as shown on the preview page.
#[derive(Debug, Clone)]
pub struct MaterialSegments {
    pub material: Material,
    pub segments: Vec<SegmentWithAncestry>,
}

/// The rendered export workbook and the filename suggested to the client.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub can_edit_categories: bool,
    pub assigned_materials: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
}

/// Input for creating a user. The password is already hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub hashed_password: String,
    pub is_admin: bool,
    pub can_edit_categories: bool,
    pub assigned_materials: Vec<Uuid>,
}

/// A partial update to a user's flags, assignments or password hash.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub hashed_password: Option<String>,
    pub is_admin: Option<bool>,
    pub can_edit_categories: Option<bool>,
    pub assigned_materials: Option<Vec<Uuid>>,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

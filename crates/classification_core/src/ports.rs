//! crates/classification_core/src/ports.rs
//!
//! Defines the storage contract the core logic runs against.
//! This trait forms the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store behind the
//! materials / categories / segments collections.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Category, Material, NewSegment, NewUser, ReorderOutcome, Segment, SegmentFilter,
    SegmentPatch, User, UserCredentials, UserPatch,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A delete refused because other rows still point at the target.
    #[error("Still referenced: {0}")]
    StillReferenced(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The document store. Implementations only persist and fetch; every business
/// rule (depth, cycles, ordering plans, access) lives in the core.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Categories ---
    /// All categories, name ascending.
    async fn list_categories(&self) -> PortResult<Vec<Category>>;

    async fn get_category(&self, id: Uuid) -> PortResult<Category>;

    async fn insert_category(&self, name: &str, parent_id: Option<Uuid>) -> PortResult<Category>;

    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> PortResult<Category>;

    async fn delete_category(&self, id: Uuid) -> PortResult<()>;

    async fn count_child_categories(&self, id: Uuid) -> PortResult<u64>;

    async fn count_segments_in_category(&self, id: Uuid) -> PortResult<u64>;

    // --- Materials ---
    /// All materials, newest first.
    async fn list_materials(&self) -> PortResult<Vec<Material>>;

    async fn get_material(&self, id: Uuid) -> PortResult<Material>;

    async fn insert_material(&self, title: &str, author: &str) -> PortResult<Material>;

    async fn update_material(&self, id: Uuid, title: &str, author: &str) -> PortResult<Material>;

    /// Deletes the material and every segment it owns. Returns the number of
    /// segments removed.
    async fn delete_material(&self, id: Uuid) -> PortResult<u64>;

    // --- Segments ---
    /// Persists a segment at the end of its material's display order.
    ///
    /// Implementations must serialize concurrent appends for the same material
    /// so that no two segments receive the same `order_index`.
    async fn append_segment(&self, segment: NewSegment) -> PortResult<Segment>;

    async fn get_segment(&self, id: Uuid) -> PortResult<Segment>;

    /// Applies a partial update. When the patch moves the segment to another
    /// material, it is appended at the end of that material's order.
    async fn update_segment(&self, id: Uuid, patch: SegmentPatch) -> PortResult<Segment>;

    async fn delete_segment(&self, id: Uuid) -> PortResult<()>;

    /// Every segment of a material, in no particular order.
    async fn segments_for_material(&self, material_id: Uuid) -> PortResult<Vec<Segment>>;

    /// Newest-first page of segments matching the filter, plus the total match count.
    async fn query_segments(&self, filter: &SegmentFilter) -> PortResult<(Vec<Segment>, u64)>;

    /// Writes `order_index = position` for each `(segment id, position)` pair
    /// that belongs to `material_id`, as one batch.
    async fn apply_segment_order(
        &self,
        material_id: Uuid,
        assignments: &[(Uuid, i64)],
    ) -> PortResult<ReorderOutcome>;

    // --- Users ---
    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn get_user(&self, id: Uuid) -> PortResult<User>;

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials>;

    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> PortResult<User>;

    async fn delete_user(&self, id: Uuid) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

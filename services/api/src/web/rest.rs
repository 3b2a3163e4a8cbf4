//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{AppError, ErrorBody};
use crate::web::auth;
use crate::web::dto::*;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use classification_core::domain::{SegmentFilter, SegmentPatch};
use classification_core::export::CONTENT_TYPE;
use classification_core::Actor;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::list_users_handler,
        auth::create_user_handler,
        auth::update_user_handler,
        auth::delete_user_handler,
        list_categories_handler,
        category_tree_handler,
        create_category_handler,
        get_category_handler,
        update_category_handler,
        delete_category_handler,
        list_materials_handler,
        create_material_handler,
        get_material_handler,
        update_material_handler,
        delete_material_handler,
        material_segments_handler,
        material_preview_handler,
        reorder_segments_handler,
        export_material_handler,
        query_segments_handler,
        recent_segments_handler,
        create_segment_handler,
        get_segment_handler,
        update_segment_handler,
        delete_segment_handler,
    ),
    components(
        schemas(
            ErrorBody,
            CategoryDto, CategoryTreeNode, CategoryDetail, PathEntry,
            CreateCategoryRequest, UpdateCategoryRequest,
            MaterialDto, MaterialRequest, DeleteMaterialResponse, MaterialPreview,
            SegmentDto, SegmentWithAncestryDto, SegmentPage,
            CreateSegmentRequest, UpdateSegmentRequest, ReorderRequest, ReorderResponse, OrderParam,
            UserDto, LoginRequest, CreateUserRequest, UpdateUserRequest,
        )
    ),
    tags(
        (name = "Classification API", description = "Categories, materials and segments of the classification dashboard.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Categories
//=========================================================================================

/// Flat list of every category, name ascending.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories", body = [CategoryDto]))
)]
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let categories = state.catalog.list_categories().await?;
    Ok(Json(categories.into_iter().map(CategoryDto::from).collect::<Vec<_>>()))
}

/// The category forest. Categories whose parent is missing are left out.
#[utoipa::path(
    get,
    path = "/categories/tree",
    responses((status = 200, description = "Nested category tree", body = [CategoryTreeNode]))
)]
pub async fn category_tree_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let tree = state.catalog.category_tree().await?;
    Ok(Json(tree.into_iter().map(CategoryTreeNode::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryDto),
        (status = 400, description = "Invalid name or depth exceeded", body = ErrorBody),
        (status = 403, description = "Not allowed to edit categories", body = ErrorBody),
        (status = 404, description = "Parent not found", body = ErrorBody)
    )
)]
pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_category_editor()?;
    let category = state.catalog.create_category(&req.name, req.parent_id).await?;
    Ok((StatusCode::CREATED, Json(CategoryDto::from(category))))
}

/// A category with its root-first breadcrumb.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category and path", body = CategoryDetail),
        (status = 404, description = "No such category", body = ErrorBody)
    )
)]
pub async fn get_category_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (category, path) = state.catalog.category_with_path(id).await?;
    Ok(Json(CategoryDetail {
        category: category.into(),
        path: path.into_iter().map(PathEntry::from).collect(),
    }))
}

/// Renames and/or moves a category.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryDto),
        (status = 400, description = "Self parent, cycle, depth exceeded or invalid name", body = ErrorBody),
        (status = 403, description = "Not allowed to edit categories", body = ErrorBody),
        (status = 404, description = "Category or parent not found", body = ErrorBody)
    )
)]
pub async fn update_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_category_editor()?;
    let category = state
        .catalog
        .update_category(id, &req.name, req.parent_id)
        .await?;
    Ok(Json(CategoryDto::from(category)))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Not allowed to edit categories", body = ErrorBody),
        (status = 404, description = "No such category", body = ErrorBody),
        (status = 409, description = "Category has children or is used by segments", body = ErrorBody)
    )
)]
pub async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_category_editor()?;
    state.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Materials
//=========================================================================================

/// Materials visible to the caller, newest first.
#[utoipa::path(
    get,
    path = "/materials",
    responses((status = 200, description = "Visible materials", body = [MaterialDto]))
)]
pub async fn list_materials_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let materials = state.catalog.list_materials(&actor).await?;
    Ok(Json(materials.into_iter().map(MaterialDto::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/materials",
    request_body = MaterialRequest,
    responses(
        (status = 201, description = "Material created", body = MaterialDto),
        (status = 400, description = "Invalid title or author", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn create_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<MaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    let material = state.catalog.create_material(&req.title, &req.author).await?;
    Ok((StatusCode::CREATED, Json(MaterialDto::from(material))))
}

#[utoipa::path(
    get,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "The material", body = MaterialDto),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn get_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(id)?;
    let material = state.catalog.get_material(id).await?;
    Ok(Json(MaterialDto::from(material)))
}

#[utoipa::path(
    put,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    request_body = MaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = MaterialDto),
        (status = 400, description = "Invalid title or author", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn update_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<MaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    let material = state
        .catalog
        .update_material(id, &req.title, &req.author)
        .await?;
    Ok(Json(MaterialDto::from(material)))
}

/// Deletes a material together with all of its segments.
#[utoipa::path(
    delete,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material and its segments deleted", body = DeleteMaterialResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn delete_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    let deleted_segments = state.catalog.delete_material(id).await?;
    Ok(Json(DeleteMaterialResponse { deleted_segments }))
}

/// The material's segments in the requested order.
#[utoipa::path(
    get,
    path = "/materials/{id}/segments",
    params(("id" = Uuid, Path, description = "Material id"), OrderQuery),
    responses(
        (status = 200, description = "Segments of the material", body = [SegmentDto]),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn material_segments_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<OrderQuery>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(id)?;
    let order = query.order.unwrap_or_default().into();
    let segments = state.catalog.list_segments(id, order).await?;
    Ok(Json(segments.into_iter().map(SegmentDto::from).collect::<Vec<_>>()))
}

/// The material's segments in display order, each with its six category levels.
#[utoipa::path(
    get,
    path = "/materials/{id}/preview",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material with resolved segment ancestry", body = MaterialPreview),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn material_preview_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(id)?;
    let preview = state.catalog.segments_with_ancestry(id).await?;
    Ok(Json(MaterialPreview::from(preview)))
}

/// Replaces the display order of a material's segments.
#[utoipa::path(
    post,
    path = "/materials/{id}/reorder",
    params(("id" = Uuid, Path, description = "Material id")),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Order applied", body = ReorderResponse),
        (status = 400, description = "Empty list, duplicates or ids from another material", body = ErrorBody),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn reorder_segments_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(id)?;
    let outcome = state.catalog.reorder_segments(id, &req.segment_ids).await?;
    if outcome.is_partial() {
        warn!(
            material_id = %id,
            requested = outcome.requested,
            matched = outcome.matched,
            "Reorder matched fewer segments than requested"
        );
    }
    Ok(Json(ReorderResponse::from(outcome)))
}

/// Downloads the material as an `.xlsx` workbook.
#[utoipa::path(
    get,
    path = "/materials/{id}/export",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "The `.xlsx` workbook as an attachment"),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such material", body = ErrorBody)
    )
)]
pub async fn export_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(id)?;
    let artifact = state.catalog.export_material(id).await?;
    info!(material_id = %id, bytes = artifact.bytes.len(), "Export served");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        encode_filename(&artifact.filename)
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    ))
}

/// Percent-encodes everything outside the URI-component unreserved set.
pub fn encode_filename(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

//=========================================================================================
// Segments
//=========================================================================================

/// Paginated, newest-first segment search.
///
/// Non-admins must filter by one of their assigned materials.
#[utoipa::path(
    get,
    path = "/segments",
    params(SegmentQuery),
    responses(
        (status = 200, description = "One page of segments", body = SegmentPage),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody)
    )
)]
pub async fn query_segments_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SegmentQuery>,
) -> Result<impl IntoResponse, AppError> {
    match query.material_id {
        Some(material_id) => actor.require_material(material_id)?,
        None => actor.require_admin()?,
    }
    let page = state
        .catalog
        .query_segments(SegmentFilter {
            material_id: query.material_id,
            category_id: query.category_id,
            material_ids: None,
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(0),
        })
        .await?;
    Ok(Json(SegmentPage::from(page)))
}

/// The most recently created segments the caller can see.
#[utoipa::path(
    get,
    path = "/segments/recent",
    params(RecentQuery),
    responses((status = 200, description = "Newest segments", body = [SegmentDto]))
)]
pub async fn recent_segments_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let segments = state
        .catalog
        .recent_segments(query.limit, actor.material_scope())
        .await?;
    Ok(Json(segments.into_iter().map(SegmentDto::from).collect::<Vec<_>>()))
}

/// Adds a segment at the end of its material's display order.
#[utoipa::path(
    post,
    path = "/segments",
    request_body = CreateSegmentRequest,
    responses(
        (status = 201, description = "Segment created", body = SegmentDto),
        (status = 400, description = "Empty content or page below 1", body = ErrorBody),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "Material or category not found", body = ErrorBody)
    )
)]
pub async fn create_segment_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateSegmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_material(req.material_id)?;
    let segment = state
        .catalog
        .create_segment(req.material_id, &req.content, req.page_number, req.category_id)
        .await?;
    Ok((StatusCode::CREATED, Json(SegmentDto::from(segment))))
}

#[utoipa::path(
    get,
    path = "/segments/{id}",
    params(("id" = Uuid, Path, description = "Segment id")),
    responses(
        (status = 200, description = "The segment", body = SegmentDto),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such segment", body = ErrorBody)
    )
)]
pub async fn get_segment_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let segment = state.catalog.get_segment(id).await?;
    actor.require_material(segment.material_id)?;
    Ok(Json(SegmentDto::from(segment)))
}

/// Partial update; setting `materialId` moves the segment to the end of that material.
#[utoipa::path(
    put,
    path = "/segments/{id}",
    params(("id" = Uuid, Path, description = "Segment id")),
    request_body = UpdateSegmentRequest,
    responses(
        (status = 200, description = "Segment updated", body = SegmentDto),
        (status = 400, description = "Empty content or page below 1", body = ErrorBody),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "Segment, material or category not found", body = ErrorBody)
    )
)]
pub async fn update_segment_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSegmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = state.catalog.get_segment(id).await?;
    actor.require_material(current.material_id)?;
    if let Some(target) = req.material_id {
        actor.require_material(target)?;
    }
    let segment = state
        .catalog
        .update_segment(id, SegmentPatch::from(req))
        .await?;
    Ok(Json(SegmentDto::from(segment)))
}

#[utoipa::path(
    delete,
    path = "/segments/{id}",
    params(("id" = Uuid, Path, description = "Segment id")),
    responses(
        (status = 204, description = "Segment deleted"),
        (status = 403, description = "Material not assigned to the caller", body = ErrorBody),
        (status = 404, description = "No such segment", body = ErrorBody)
    )
)]
pub async fn delete_segment_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let segment = state.catalog.get_segment(id).await?;
    actor.require_material(segment.material_id)?;
    state.catalog.delete_segment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_percent_encoded_like_uri_components() {
        assert_eq!(encode_filename("Fiqh_101.xlsx"), "Fiqh_101.xlsx");
        assert_eq!(encode_filename("a b.xlsx"), "a%20b.xlsx");
        assert_eq!(encode_filename("ب.xlsx"), "%D8%A8.xlsx");
    }
}

pub mod auth;
pub mod dto;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
use state::AppState;

/// Builds the API routes. CORS and the Swagger UI are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/users",
            get(auth::list_users_handler).post(auth::create_user_handler),
        )
        .route(
            "/users/{id}",
            put(auth::update_user_handler).delete(auth::delete_user_handler),
        )
        .route(
            "/categories",
            get(rest::list_categories_handler).post(rest::create_category_handler),
        )
        .route("/categories/tree", get(rest::category_tree_handler))
        .route(
            "/categories/{id}",
            get(rest::get_category_handler)
                .put(rest::update_category_handler)
                .delete(rest::delete_category_handler),
        )
        .route(
            "/materials",
            get(rest::list_materials_handler).post(rest::create_material_handler),
        )
        .route(
            "/materials/{id}",
            get(rest::get_material_handler)
                .put(rest::update_material_handler)
                .delete(rest::delete_material_handler),
        )
        .route("/materials/{id}/segments", get(rest::material_segments_handler))
        .route("/materials/{id}/preview", get(rest::material_preview_handler))
        .route("/materials/{id}/reorder", post(rest::reorder_segments_handler))
        .route("/materials/{id}/export", get(rest::export_material_handler))
        .route(
            "/segments",
            get(rest::query_segments_handler).post(rest::create_segment_handler),
        )
        .route("/segments/recent", get(rest::recent_segments_handler))
        .route(
            "/segments/{id}",
            get(rest::get_segment_handler)
                .put(rest::update_segment_handler)
                .delete(rest::delete_segment_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

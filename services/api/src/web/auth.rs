//! services/api/src/web/auth.rs
//!
//! Authentication endpoints (login, logout, current user) and the admin-only
//! user management endpoints.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use classification_core::domain::{AuthSession, NewUser, UserPatch};
use classification_core::ports::PortError;
use classification_core::{validation, Actor, Catalog, CoreError};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::error::{AppError, ErrorBody};
use crate::web::dto::{CreateUserRequest, LoginRequest, UpdateUserRequest, UserDto};
use crate::web::middleware::{session_id, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes a plain password with argon2 and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            CoreError::Infrastructure("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed: &str) -> Result<bool, CoreError> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        CoreError::Infrastructure("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn session_cookie(id: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, id, max_age_seconds
    )
}

/// Creates the configured admin account unless a user with that name exists.
pub async fn ensure_bootstrap_admin(catalog: &Catalog, admin: &BootstrapAdmin) -> Result<(), CoreError> {
    match catalog.store().get_user_credentials(admin.username.trim()).await {
        Ok(_) => {
            info!("Bootstrap admin '{}' already exists", admin.username.trim());
            return Ok(());
        }
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    validation::password(&admin.password)?;
    let user = catalog
        .create_user(NewUser {
            username: admin.username.clone(),
            hashed_password: hash_password(&admin.password)?,
            is_admin: true,
            can_edit_categories: true,
            assigned_materials: Vec::new(),
        })
        .await?;
    info!(user_id = %user.id, "Bootstrap admin '{}' created", user.username);
    Ok(())
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// POST /auth/login - Login with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserDto),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Look up the credentials; an unknown name is reported like a wrong password.
    let creds = match state.db.get_user_credentials(req.username.trim()).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(CoreError::Unauthorized.into()),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    if !verify_password(&req.password, &creds.hashed_password)? {
        warn!("Failed login for '{}'", creds.username);
        return Err(CoreError::Unauthorized.into());
    }

    // 3. Create the auth session
    let ttl = Duration::days(state.config.session_ttl_days);
    let session = AuthSession {
        id: Uuid::new_v4().to_string(),
        user_id: creds.user_id,
        expires_at: Utc::now() + ttl,
    };
    state.db.create_auth_session(&session).await?;

    // 4. Return the user with the session cookie
    let user = state.db.get_user(creds.user_id).await?;
    info!(user_id = %user.id, "User logged in");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.id, ttl.num_seconds()))],
        Json(UserDto::from(user)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth_session_id = session_id(&headers).ok_or(CoreError::Unauthorized)?;
    state.db.delete_auth_session(auth_session_id).await?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}

/// GET /auth/me - The logged-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.db.get_user(actor.user_id).await?;
    Ok(Json(UserDto::from(user)))
}

//=========================================================================================
// User Management (admin only)
//=========================================================================================

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [UserDto]),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    let users = state.catalog.list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserDto),
        (status = 400, description = "Invalid or duplicate username, short password", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    validation::password(&req.password)?;
    let user = state
        .catalog
        .create_user(NewUser {
            username: req.username,
            hashed_password: hash_password(&req.password)?,
            is_admin: req.is_admin,
            can_edit_categories: req.can_edit_categories,
            assigned_materials: req.assigned_materials,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserDto),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    let hashed_password = match req.password.as_deref() {
        Some(password) => {
            validation::password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };
    let user = state
        .catalog
        .update_user(
            id,
            UserPatch {
                hashed_password,
                is_admin: req.is_admin,
                can_edit_categories: req.can_edit_categories,
                assigned_materials: req.assigned_materials,
            },
        )
        .await?;
    Ok(Json(UserDto::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Admins cannot delete themselves", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin()?;
    if id == actor.user_id {
        return Err(CoreError::validation("id", "cannot delete the logged-in user").into());
    }
    state.catalog.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hash).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
    }

    #[test]
    fn logout_cookie_expires_immediately() {
        assert!(session_cookie("", 0).ends_with("Max-Age=0"));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let catalog = Catalog::new(Arc::new(classification_core::MemoryStore::new()));
        let admin = BootstrapAdmin {
            username: "admin".to_string(),
            password: "secret1".to_string(),
        };
        ensure_bootstrap_admin(&catalog, &admin).await.unwrap();
        ensure_bootstrap_admin(&catalog, &admin).await.unwrap();

        let users = catalog.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
    }
}

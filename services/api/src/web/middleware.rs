//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use classification_core::CoreError;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppError;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Pulls the session id out of the `Cookie` header, if any.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and resolves it to an `Actor`.
///
/// If valid, inserts the actor into request extensions for handlers to use.
/// If invalid, expired or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_session_id = session_id(req.headers()).ok_or(CoreError::Unauthorized)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {:?}", e);
            AppError::from(e)
        })?;

    // The session may outlive its user; `actor` turns that into Unauthorized.
    let actor = state.catalog.actor(user_id).await?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn finds_the_session_among_other_cookies() {
        let h = headers("theme=dark; session=abc-123; lang=ar");
        assert_eq!(session_id(&h), Some("abc-123"));
    }

    #[test]
    fn ignores_lookalike_and_empty_cookies() {
        assert_eq!(session_id(&headers("session_old=x")), None);
        assert_eq!(session_id(&headers("session=")), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }
}

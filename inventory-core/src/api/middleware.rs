use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;
use uuid::Uuid;

use crate::auth::extract_bearer_token;
use crate::error::AppError;
use crate::models::UserProfile;
use crate::services::profiles;
use crate::AppState;

/// Authenticated identity stored in request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

impl CurrentUser {
    /// Active admin or super_admin profile of this user, or `Forbidden`.
    pub async fn require_admin(&self, state: &AppState) -> Result<UserProfile, AppError> {
        profiles::require_admin(state.store.as_ref(), self.id).await
    }
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
}

/// Middleware to validate a Bearer access token in the `Authorization` header.
///
/// On success the [`CurrentUser`] is attached to the request; on failure a
/// `401` is returned.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    let user = state.auth.verify(token).await.map_err(|e| {
        warn!(error = %e, "Rejected access token");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
    });

    Ok(next.run(req).await)
}

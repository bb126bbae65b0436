use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::middleware::bearer_token;
use crate::auth::{AuthClient, AuthSession};
use crate::error::{AppError, AppResult};
use crate::models::ProfileWithCompany;
use crate::session::{MemoryStorage, SessionContext};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub session: AuthSession,
    pub profile: Option<ProfileWithCompany>,
}

/// Login endpoint handler.
///
/// Runs the same session flow a client would: sign in, then load the
/// profile joined with its company. Inactive profiles are refused.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let client = Arc::new(AuthClient::new(state.auth.clone()));
    let context = SessionContext::mount(
        client,
        state.store.clone(),
        Arc::new(MemoryStorage::new()),
    );

    if !context.login(&request.email, &request.password).await? {
        return Err(AppError::Busy("Login already in progress".to_string()));
    }

    let snapshot = context.state();
    context.unmount();

    let session = snapshot
        .session
        .ok_or_else(|| AppError::Internal("Session missing after login".to_string()))?;
    info!(user_id = %session.user.id, "Login succeeded");

    Ok(Json(LoginResponse {
        success: true,
        session,
        profile: snapshot.profile,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<AuthSession>> {
    let session = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    state.auth.sign_out(token).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

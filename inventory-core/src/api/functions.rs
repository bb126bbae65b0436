use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Serialize;

use super::middleware::bearer_token;
use crate::error::{AppError, AppResult};
use crate::models::profile::CreateUserRequest;
use crate::provisioning::ProvisionedUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub user: ProvisionedUser,
}

/// `POST /functions/create-user`.
///
/// Verifies the bearer token itself rather than going through the API
/// middleware so every failure uses the function's JSON error shape. The
/// caller is checked before the body is parsed.
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let admin = state
        .provisioner
        .authorize_caller(bearer_token(&headers))
        .await?;

    let request: CreateUserRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::CreationFailed(format!("Invalid request body: {}", e)))?;

    let user = state.provisioner.provision(&admin, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            success: true,
            user,
        }),
    ))
}

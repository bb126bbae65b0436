use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use tracing::info;

use super::middleware::CurrentUser;
use crate::backup::RestoreSummary;
use crate::error::AppResult;
use crate::AppState;

/// Backup download handler.
///
/// Returns the backup document as a JSON attachment named
/// `inventory-backup-<timestamp>.json`.
pub async fn download_backup(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    user.require_admin(&state).await?;

    let document = state.backup.create_backup().await?;
    let body = serde_json::to_vec_pretty(&document)?;
    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    info!(user_id = %user.id, size = body.len(), "Backup downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Restore handler. The request body is the raw backup file.
pub async fn restore_backup(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> AppResult<Json<RestoreSummary>> {
    user.require_admin(&state).await?;

    info!(user_id = %user.id, size = body.len(), "Restore requested");
    let summary = state.backup.restore_from_backup(&body).await?;
    Ok(Json(summary))
}

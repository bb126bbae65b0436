use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Application-level error returned by every service mutation.
///
/// Each variant is one of the user-visible failure categories; callers pick
/// the presentation, HTTP handlers map them to a status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Malformed input: {0}")]
    Parse(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique constraint violation.
    #[error("{0}")]
    AlreadyExists(String),

    /// Foreign key violation on delete or update.
    #[error("{0}")]
    InUse(String),

    /// A latched operation is already running.
    #[error("{0}")]
    Busy(String),

    #[error("{0}")]
    CreationFailed(String),

    #[error("Database unavailable: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Parse(_) | AppError::CreationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::InUse(_) | AppError::Busy(_) => {
                StatusCode::CONFLICT
            }
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { table, .. } => {
                AppError::AlreadyExists(format!("Record may already exist in {}", table))
            }
            StoreError::ForeignKeyViolation { table, .. } => {
                AppError::InUse(format!("Record in {} may be in use", table))
            }
            StoreError::NotFound { table, id } => {
                AppError::NotFound(format!("No record {} in {}", id, table))
            }
            StoreError::InvalidRow(msg) | StoreError::UnknownColumn(msg) => {
                AppError::Validation(msg)
            }
            StoreError::Connection(msg) | StoreError::Query(msg) => AppError::Store(msg),
            StoreError::Decode(msg) => AppError::Internal(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::InvalidToken(msg) => AppError::Unauthorized(msg),
            AuthError::EmailTaken(email) => {
                AppError::AlreadyExists(format!("A user with email {} may already exist", email))
            }
            AuthError::InvalidInput(msg) => AppError::Validation(msg),
            AuthError::NotFound(id) => AppError::NotFound(format!("No identity {}", id)),
            AuthError::Database(msg) => AppError::Store(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Failed to decode record: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violations_map_to_conflict() {
        let dup: AppError = StoreError::UniqueViolation {
            table: "categories".to_string(),
            constraint: "categories_name_key".to_string(),
        }
        .into();
        assert!(matches!(dup, AppError::AlreadyExists(_)));
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);

        let in_use: AppError = StoreError::ForeignKeyViolation {
            table: "units".to_string(),
            message: "products_unit_id_fkey".to_string(),
        }
        .into();
        assert!(matches!(in_use, AppError::InUse(_)));
    }

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        let err: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: AppError = AuthError::InvalidInput("weak password".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}

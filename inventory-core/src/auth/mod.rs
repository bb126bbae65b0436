//! Authentication identities.
//!
//! An identity (email + password) is separate from the application profile in
//! `user_profiles`. [`AuthProvider`] is the seam between the two: it issues and
//! verifies bearer tokens and creates or deletes identities.

pub mod client;
pub mod jwt;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use client::{AuthClient, AuthEvent};
pub use jwt::{extract_bearer_token, JwtManager};
pub use memory::MemoryAuthProvider;
pub use postgres::PgAuthProvider;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Identity not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Token pair handed out at sign-in and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

/// Identity backend.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    /// Exchange a refresh token for a fresh session.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    /// Resolve a bearer access token to its identity.
    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser>;

    async fn create_identity(&self, email: &str, password: &str) -> AuthResult<AuthUser>;

    async fn delete_identity(&self, id: Uuid) -> AuthResult<()>;
}

/// Reject obviously unusable credentials before touching the backend.
pub fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput(format!("Invalid email address: {}", email)));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("owner@shop.test", "secret1").is_ok());
        assert!(matches!(
            validate_credentials("not-an-email", "secret1"),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_credentials("owner@shop.test", "123"),
            Err(AuthError::InvalidInput(_))
        ));
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, JwtManager,
};

/// Row of the `auth_users` table.
#[derive(Debug, Clone, FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

impl From<IdentityRow> for AuthUser {
    fn from(row: IdentityRow) -> Self {
        AuthUser {
            id: row.id,
            email: row.email,
        }
    }
}

/// Identities stored in `auth_users` with bcrypt password hashes.
pub struct PgAuthProvider {
    pool: PgPool,
    jwt: JwtManager,
    hash_cost: u32,
}

impl PgAuthProvider {
    pub fn new(pool: PgPool, jwt: JwtManager) -> Self {
        Self {
            pool,
            jwt,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<IdentityRow>> {
        sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash FROM auth_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))
    }

    async fn require_live_session(&self, session_id: Uuid) -> AuthResult<()> {
        let revoked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM revoked_sessions WHERE session_id = $1)",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

        if revoked {
            return Err(AuthError::InvalidToken("session has been signed out".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for PgAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let identity = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, password_hash FROM auth_users WHERE lower(email) = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?
        .ok_or(AuthError::InvalidCredentials)?;

        let valid = bcrypt::verify(password, &identity.password_hash)
            .map_err(|e| AuthError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            warn!(email = %email, "Rejected sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %identity.id, "Identity signed in");
        self.jwt.issue_session(identity.into())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        let session_id = claims.session_id()?;
        self.require_live_session(session_id).await?;
        let user = claims.user()?;

        let identity = self
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("identity no longer exists".to_string()))?;

        self.jwt.continue_session(identity.into(), session_id)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let claims = self.jwt.validate_access_token(access_token)?;
        let user = claims.user()?;
        let session_id = claims.session_id()?;

        // The session's refresh token can outlive the access token.
        let expires_at = Utc::now() + self.jwt.refresh_lifetime();
        sqlx::query(
            r#"
            INSERT INTO revoked_sessions (session_id, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(user.id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

        let pruned = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .rows_affected();

        info!(user_id = %user.id, session_id = %session_id, pruned, "Identity signed out");
        Ok(())
    }

    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser> {
        let claims = self.jwt.validate_access_token(access_token)?;
        self.require_live_session(claims.session_id()?).await?;
        let user = claims.user()?;

        self.find_by_id(user.id)
            .await?
            .map(AuthUser::from)
            .ok_or_else(|| AuthError::InvalidToken("identity no longer exists".to_string()))
    }

    async fn create_identity(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        validate_credentials(email, password)?;

        let password_hash = bcrypt::hash(password, self.hash_cost)
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?;

        let identity = sqlx::query_as::<_, IdentityRow>(
            r#"
            INSERT INTO auth_users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AuthError::EmailTaken(email.to_string())
            }
            other => AuthError::Database(other.to_string()),
        })?;

        info!(user_id = %identity.id, "Created identity");
        Ok(identity.into())
    }

    async fn delete_identity(&self, id: Uuid) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM auth_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(id));
        }

        info!(user_id = %id, "Deleted identity");
        Ok(())
    }
}

//! JWT issuing and validation.

use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, AuthResult, AuthSession, AuthUser};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the identity's UUID as a string.
    pub sub: String,

    pub email: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Unique token id
    pub jti: String,

    /// Session the token belongs to; shared by an access/refresh pair and
    /// kept across refreshes.
    pub sid: String,

    /// "access" or "refresh"
    pub token_type: String,
}

impl Claims {
    pub fn user(&self) -> AuthResult<AuthUser> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a UUID".to_string()))?;
        Ok(AuthUser {
            id,
            email: self.email.clone(),
        })
    }

    pub fn session_id(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sid)
            .map_err(|_| AuthError::InvalidToken("session id is not a UUID".to_string()))
    }
}

/// HS256 token manager.
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, access_lifetime_secs: i64, refresh_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn refresh_lifetime(&self) -> Duration {
        Duration::seconds(self.refresh_lifetime_secs)
    }

    fn generate(
        &self,
        user: &AuthUser,
        session_id: Uuid,
        token_type: &str,
        lifetime_secs: i64,
    ) -> AuthResult<(String, i64)> {
        let now = Utc::now();
        let exp = (now + Duration::seconds(lifetime_secs)).timestamp();

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
            sid: session_id.to_string(),
            token_type: token_type.to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to generate {} token: {}", token_type, e)))?;

        Ok((token, exp))
    }

    /// Issue an access/refresh pair for `user` under a new session id.
    pub fn issue_session(&self, user: AuthUser) -> AuthResult<AuthSession> {
        self.continue_session(user, Uuid::new_v4())
    }

    /// Issue a fresh pair that stays in `session_id`, so revoking the session
    /// also revokes tokens handed out by earlier refreshes.
    pub fn continue_session(&self, user: AuthUser, session_id: Uuid) -> AuthResult<AuthSession> {
        let (access_token, exp) =
            self.generate(&user, session_id, ACCESS, self.access_lifetime_secs)?;
        let (refresh_token, _) =
            self.generate(&user, session_id, REFRESH, self.refresh_lifetime_secs)?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_at,
            user,
        })
    }

    /// Validate and decode a token of any type.
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(decoded.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != ACCESS {
            return Err(AuthError::InvalidToken("Expected access token".to_string()));
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != REFRESH {
            return Err(AuthError::InvalidToken("Expected refresh token".to_string()));
        }
        Ok(claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret-for-jwt-manager".to_string(), 3600, 86400)
    }

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "clerk@shop.test".to_string(),
        }
    }

    #[test]
    fn test_session_tokens_roundtrip() {
        let manager = manager();
        let user = user();
        let session = manager.issue_session(user.clone()).unwrap();

        let claims = manager.validate_access_token(&session.access_token).unwrap();
        assert_eq!(claims.user().unwrap(), user);

        let claims = manager.validate_refresh_token(&session.refresh_token).unwrap();
        assert_eq!(claims.token_type, "refresh");
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_pair_shares_session_across_refresh() {
        let manager = manager();
        let session = manager.issue_session(user()).unwrap();
        let access = manager.validate_access_token(&session.access_token).unwrap();
        let refresh = manager.validate_refresh_token(&session.refresh_token).unwrap();
        assert_eq!(access.sid, refresh.sid);
        assert_ne!(access.jti, refresh.jti);

        let sid = refresh.session_id().unwrap();
        let renewed = manager.continue_session(refresh.user().unwrap(), sid).unwrap();
        let claims = manager.validate_access_token(&renewed.access_token).unwrap();
        assert_eq!(claims.session_id().unwrap(), sid);

        let other = manager.issue_session(user()).unwrap();
        let claims = manager.validate_access_token(&other.access_token).unwrap();
        assert_ne!(claims.session_id().unwrap(), sid);
    }

    #[test]
    fn test_wrong_token_type() {
        let manager = manager();
        let session = manager.issue_session(user()).unwrap();

        assert!(manager.validate_refresh_token(&session.access_token).is_err());
        assert!(manager.validate_access_token(&session.refresh_token).is_err());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let session = manager().issue_session(user()).unwrap();
        let other = JwtManager::new("another-secret-entirely".to_string(), 3600, 86400);
        assert!(matches!(
            other.validate_access_token(&session.access_token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}

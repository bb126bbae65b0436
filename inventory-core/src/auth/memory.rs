use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use super::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, JwtManager,
};

/// Lowest cost bcrypt accepts.
const HASH_COST: u32 = 4;

#[derive(Debug, Clone)]
struct Identity {
    email: String,
    password_hash: String,
}

/// In-process identity store.
///
/// Same token handling as `PgAuthProvider`, with identities held in a map.
/// Counts sign-in and creation requests so callers can observe traffic.
pub struct MemoryAuthProvider {
    jwt: JwtManager,
    identities: Mutex<HashMap<Uuid, Identity>>,
    revoked_sessions: Mutex<HashSet<Uuid>>,
    sign_in_requests: AtomicUsize,
    create_requests: AtomicUsize,
    sign_in_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryAuthProvider {
    pub fn new(jwt: JwtManager) -> Self {
        Self {
            jwt,
            identities: Mutex::new(HashMap::new()),
            revoked_sessions: Mutex::new(HashSet::new()),
            sign_in_requests: AtomicUsize::new(0),
            create_requests: AtomicUsize::new(0),
            sign_in_gate: Mutex::new(None),
        }
    }

    pub fn identity_count(&self) -> usize {
        self.identities.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn contains_email(&self, email: &str) -> bool {
        self.identities
            .lock()
            .map(|ids| ids.values().any(|identity| identity.email.eq_ignore_ascii_case(email)))
            .unwrap_or(false)
    }

    pub fn sign_in_requests(&self) -> usize {
        self.sign_in_requests.load(Ordering::SeqCst)
    }

    pub fn create_requests(&self) -> usize {
        self.create_requests.load(Ordering::SeqCst)
    }

    /// Hold every subsequent `sign_in` until the returned handle is notified.
    #[cfg(test)]
    pub(crate) fn gate_sign_in(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        if let Ok(mut slot) = self.sign_in_gate.lock() {
            *slot = Some(gate.clone());
        }
        gate
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, HashMap<Uuid, Identity>>> {
        self.identities
            .lock()
            .map_err(|_| AuthError::Internal("identity map poisoned".to_string()))
    }

    fn revoked(&self) -> AuthResult<std::sync::MutexGuard<'_, HashSet<Uuid>>> {
        self.revoked_sessions
            .lock()
            .map_err(|_| AuthError::Internal("revocation set poisoned".to_string()))
    }

    fn require_live_session(&self, session_id: Uuid) -> AuthResult<()> {
        if self.revoked()?.contains(&session_id) {
            return Err(AuthError::InvalidToken("session has been signed out".to_string()));
        }
        Ok(())
    }

    fn user_for(&self, id: Uuid) -> AuthResult<Option<AuthUser>> {
        Ok(self.lock()?.get(&id).map(|identity| AuthUser {
            id,
            email: identity.email.clone(),
        }))
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.sign_in_requests.fetch_add(1, Ordering::SeqCst);

        let gate = self.sign_in_gate.lock().ok().and_then(|slot| slot.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let found = self
            .lock()?
            .iter()
            .find(|(_, identity)| identity.email.eq_ignore_ascii_case(email.trim()))
            .map(|(id, identity)| (*id, identity.clone()));
        let (id, identity) = found.ok_or(AuthError::InvalidCredentials)?;

        let valid = bcrypt::verify(password, &identity.password_hash)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        self.jwt.issue_session(AuthUser {
            id,
            email: identity.email,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        let session_id = claims.session_id()?;
        self.require_live_session(session_id)?;

        let user = self
            .user_for(claims.user()?.id)?
            .ok_or_else(|| AuthError::InvalidToken("identity no longer exists".to_string()))?;
        self.jwt.continue_session(user, session_id)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let claims = self.jwt.validate_access_token(access_token)?;
        let session_id = claims.session_id()?;
        self.revoked()?.insert(session_id);
        Ok(())
    }

    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser> {
        let claims = self.jwt.validate_access_token(access_token)?;
        self.require_live_session(claims.session_id()?)?;
        let user = claims.user()?;
        self.user_for(user.id)?
            .ok_or_else(|| AuthError::InvalidToken("identity no longer exists".to_string()))
    }

    async fn create_identity(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        self.create_requests.fetch_add(1, Ordering::SeqCst);
        validate_credentials(email, password)?;

        let email = email.trim().to_lowercase();
        if self.contains_email(&email) {
            return Err(AuthError::EmailTaken(email));
        }

        let password_hash = bcrypt::hash(password, HASH_COST)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let id = Uuid::new_v4();
        self.lock()?.insert(
            id,
            Identity {
                email: email.clone(),
                password_hash,
            },
        );

        Ok(AuthUser { id, email })
    }

    async fn delete_identity(&self, id: Uuid) -> AuthResult<()> {
        self.lock()?
            .remove(&id)
            .map(|_| ())
            .ok_or(AuthError::NotFound(id))
    }
}

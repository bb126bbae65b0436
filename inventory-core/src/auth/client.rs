use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use super::{AuthProvider, AuthResult, AuthSession};

/// Capacity of the auth event channel.
const EVENT_CAPACITY: usize = 16;

/// Authentication state change published by an [`AuthClient`].
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

/// One client's view of authentication.
///
/// Holds the current session and broadcasts every change to subscribers.
/// Each client owns its own channel, so events never leak between clients
/// sharing a provider.
pub struct AuthClient {
    provider: Arc<dyn AuthProvider>,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            session: RwLock::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine; the session is still tracked locally.
        if self.events.send(event).is_err() {
            debug!("Auth event dropped: no subscribers");
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let session = self.provider.sign_in(email, password).await?;
        *self.session.write().await = Some(session.clone());
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Refresh the current session. Returns `None` when signed out.
    pub async fn refresh_session(&self) -> AuthResult<Option<AuthSession>> {
        let refresh_token = match self.session.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Ok(None),
        };

        let session = self.provider.refresh(&refresh_token).await?;
        *self.session.write().await = Some(session.clone());
        self.publish(AuthEvent::TokenRefreshed(session.clone()));
        Ok(Some(session))
    }

    /// Forget the local session, then revoke it remotely.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let previous = self.session.write().await.take();
        self.publish(AuthEvent::SignedOut);

        if let Some(session) = previous {
            self.provider.sign_out(&session.access_token).await?;
            info!(user_id = %session.user.id, "Signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtManager, MemoryAuthProvider};

    #[tokio::test]
    async fn test_events_follow_session_changes() {
        let provider = Arc::new(MemoryAuthProvider::new(JwtManager::new(
            "client-test-secret".to_string(),
            60,
            120,
        )));
        provider.create_identity("owner@shop.test", "password1").await.unwrap();

        let client = AuthClient::new(provider);
        let mut events = client.subscribe();

        let session = client.sign_in("owner@shop.test", "password1").await.unwrap();
        match events.recv().await.unwrap() {
            AuthEvent::SignedIn(s) => assert_eq!(s.user, session.user),
            other => panic!("unexpected event {:?}", other),
        }

        client.refresh_session().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed(_)));

        client.sign_out().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
        assert!(client.session().await.is_none());
        assert!(client.refresh_session().await.unwrap().is_none());
    }
}

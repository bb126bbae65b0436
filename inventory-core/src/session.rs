//! Client-side session mirror.
//!
//! A [`SessionContext`] is mounted against an [`AuthClient`]: it listens to the
//! client's auth events, loads the profile (joined with its company) for every
//! event that carries a session, and publishes the result on a watch channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthClient, AuthEvent, AuthSession};
use crate::error::{AppError, AppResult};
use crate::latch::Latch;
use crate::models::{ProfileWithCompany, Role};
use crate::services::profiles::find_profile_with_company;
use crate::store::Store;

/// Local storage key holding the cached profile.
pub const PROFILE_STORAGE_KEY: &str = "inventory.user_profile";

/// How long `login` waits for the listener to load the profile.
const PROFILE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Key/value persistence surviving a reload (browser local storage).
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().ok().and_then(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) {
        if let Ok(mut items) = self.items.write() {
            items.insert(key.to_string(), value);
        }
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.write() {
            items.remove(key);
        }
    }
}

/// Snapshot of the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session: Option<AuthSession>,
    pub profile: Option<ProfileWithCompany>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct SessionContext {
    client: Arc<AuthClient>,
    storage: Arc<dyn LocalStorage>,
    state: Arc<watch::Sender<SessionState>>,
    login_latch: Latch,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    /// Subscribe to `client` and start the listener task.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn mount(
        client: Arc<AuthClient>,
        store: Arc<dyn Store>,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        let (sender, _) = watch::channel(SessionState {
            loading: true,
            ..SessionState::default()
        });
        let state = Arc::new(sender);

        // Subscribe before spawning so no event published after mount is missed.
        let events = client.subscribe();
        let listener = tokio::spawn(listen(
            client.clone(),
            events,
            store,
            storage.clone(),
            state.clone(),
        ));

        Self {
            client,
            storage,
            state,
            login_latch: Latch::new(),
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Stop listening for auth events. Idempotent.
    pub fn unmount(&self) {
        let handle = self.listener.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
            debug!("Session listener stopped");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.listener
            .lock()
            .map(|slot| slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    /// Sign in and wait for the profile to load.
    ///
    /// # Returns
    /// `Ok(false)` without contacting the provider when another login on this
    /// context is still in flight, `Ok(true)` once the profile is loaded.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<bool> {
        let Some(_guard) = self.login_latch.try_acquire() else {
            debug!("Login already in progress");
            return Ok(false);
        };

        if !self.is_mounted() {
            return Err(AppError::Internal("Session context is not mounted".to_string()));
        }

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        let mut updates = self.state.subscribe();

        let session = match self.client.sign_in(email, password).await {
            Ok(session) => session,
            Err(e) => {
                let err = AppError::from(e);
                warn!(error = %err, "Login failed");
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(err.to_string());
                });
                return Err(err);
            }
        };

        let token = session.access_token.clone();
        let loaded = tokio::time::timeout(
            PROFILE_LOAD_TIMEOUT,
            updates.wait_for(|state| {
                !state.loading
                    && state.session.as_ref().map(|s| s.access_token.as_str()) == Some(token.as_str())
            }),
        )
        .await
        .ok()
        .and_then(|result| result.ok().map(|state| state.clone()));

        let Some(state) = loaded else {
            return Err(AppError::Internal("Profile did not load after sign-in".to_string()));
        };

        match &state.profile {
            Some(profile) if !profile.profile.is_active => {
                warn!(user_id = %session.user.id, "Login refused for inactive profile");
                self.logout().await?;
                let err = AppError::Forbidden("Account is inactive".to_string());
                self.state.send_modify(|state| state.error = Some(err.to_string()));
                Err(err)
            }
            Some(_) => {
                info!(user_id = %session.user.id, "Logged in");
                Ok(true)
            }
            None => {
                let message = state
                    .error
                    .clone()
                    .unwrap_or_else(|| "No profile for this account".to_string());
                Err(AppError::NotFound(message))
            }
        }
    }

    /// Clear local state, drop the cached profile, then sign out remotely.
    pub async fn logout(&self) -> AppResult<()> {
        self.state.send_replace(SessionState::default());
        self.storage.remove_item(PROFILE_STORAGE_KEY);

        self.client.sign_out().await?;
        Ok(())
    }

    /// Refresh the session token; the listener reloads the profile.
    pub async fn refresh(&self) -> AppResult<Option<AuthSession>> {
        Ok(self.client.refresh_session().await?)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state
            .borrow()
            .profile
            .as_ref()
            .map(|p| p.profile.has_permission(permission))
            .unwrap_or(false)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state
            .borrow()
            .profile
            .as_ref()
            .map(|p| p.profile.has_role(role))
            .unwrap_or(false)
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn listen(
    client: Arc<AuthClient>,
    mut events: broadcast::Receiver<AuthEvent>,
    store: Arc<dyn Store>,
    storage: Arc<dyn LocalStorage>,
    state: Arc<watch::Sender<SessionState>>,
) {
    // Pick up a session that existed before mount. A login racing the mount
    // may already have queued the event for this same session.
    let mut preloaded = None;
    match client.session().await {
        Some(session) => {
            preloaded = Some(session.access_token.clone());
            load_profile(store.as_ref(), storage.as_ref(), &state, session).await;
        }
        None => state.send_modify(|state| state.loading = false),
    }

    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(session)) | Ok(AuthEvent::TokenRefreshed(session)) => {
                if preloaded.take().as_deref() == Some(session.access_token.as_str()) {
                    debug!(user_id = %session.user.id, "Profile already loaded for session");
                    continue;
                }
                load_profile(store.as_ref(), storage.as_ref(), &state, session).await;
            }
            Ok(AuthEvent::SignedOut) => {
                preloaded = None;
                state.send_replace(SessionState::default());
                storage.remove_item(PROFILE_STORAGE_KEY);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Session listener lagged behind auth events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn load_profile(
    store: &dyn Store,
    storage: &dyn LocalStorage,
    state: &watch::Sender<SessionState>,
    session: AuthSession,
) {
    state.send_modify(|state| state.loading = true);

    let (profile, error) = match find_profile_with_company(store, session.user.id).await {
        Ok(Some(profile)) => {
            match serde_json::to_string(&profile) {
                Ok(cached) => storage.set_item(PROFILE_STORAGE_KEY, cached),
                Err(e) => warn!(error = %e, "Failed to cache profile"),
            }
            (Some(profile), None)
        }
        Ok(None) => {
            warn!(user_id = %session.user.id, "No profile for signed-in user");
            (None, Some("No profile for this account".to_string()))
        }
        Err(e) => {
            error!(user_id = %session.user.id, error = %e, "Failed to load profile");
            (None, Some(e.to_string()))
        }
    };

    state.send_replace(SessionState {
        session: Some(session),
        profile,
        loading: false,
        error,
    });
}

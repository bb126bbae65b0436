//! Privileged user creation.
//!
//! Creating a user is two writes in two systems: an authentication identity
//! and a `user_profiles` row. If the profile insert fails the identity is
//! deleted again so no login exists without a profile.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthProvider, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::profile::CreateUserRequest;
use crate::models::{Role, UserProfile};
use crate::services::{decode_row, profiles};
use crate::store::{Store, Table};

/// Identity plus profile of a freshly created user.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedUser {
    pub id: Uuid,
    pub email: String,
    pub profile: UserProfile,
}

pub struct UserProvisioner {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn Store>,
}

impl UserProvisioner {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn Store>) -> Self {
        Self { auth, store }
    }

    /// Create an identity and its profile on behalf of an administrator.
    ///
    /// # Arguments
    /// * `bearer` - Caller's access token, without the `Bearer ` prefix
    /// * `request` - New user's credentials, name, role and company
    ///
    /// # Returns
    /// * `Unauthorized` - token missing or invalid
    /// * `Forbidden` - caller is not an active admin or super_admin
    /// * `CreationFailed` - identity or profile could not be created
    /// * `Internal` - anything else, including a failed cleanup
    pub async fn create_user(
        &self,
        bearer: Option<&str>,
        request: CreateUserRequest,
    ) -> AppResult<ProvisionedUser> {
        let admin = self.authorize_caller(bearer).await?;
        self.provision(&admin, request).await
    }

    /// Resolve the bearer token to an active admin or super_admin profile.
    ///
    /// Runs before the request body is looked at, so a bad token or a
    /// non-admin caller is reported as such whatever they sent.
    pub async fn authorize_caller(&self, bearer: Option<&str>) -> AppResult<UserProfile> {
        let caller = self.authenticate(bearer).await?;
        self.authorize(&caller).await
    }

    /// Create the identity and profile for an already authorized `admin`.
    pub async fn provision(
        &self,
        admin: &UserProfile,
        request: CreateUserRequest,
    ) -> AppResult<ProvisionedUser> {
        if request.role == Role::SuperAdmin && admin.role != Role::SuperAdmin {
            warn!(user_id = %admin.user_id, "Admin attempted to create a super admin");
            return Err(AppError::Forbidden(
                "Only a super admin can create another super admin".to_string(),
            ));
        }

        if request.username.trim().is_empty() {
            return Err(AppError::CreationFailed("Username is required".to_string()));
        }

        let identity = self
            .auth
            .create_identity(&request.email, &request.password)
            .await
            .map_err(|e| {
                warn!(email = %request.email, error = %e, "Identity creation failed");
                AppError::CreationFailed(format!("Failed to create user: {}", e))
            })?;

        let row = json!({
            "user_id": identity.id,
            "username": request.username.trim(),
            "role": request.role,
            "company_id": request.company_id,
            "permissions": [],
            "is_active": true,
        });

        let inserted = match self.store.insert(Table::UserProfiles, vec![row]).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Profile insert failed; removing identity");
                self.remove_identity(&identity).await?;
                return Err(AppError::CreationFailed(format!(
                    "Failed to create user profile: {}",
                    e
                )));
            }
        };

        let profile: UserProfile = match inserted.into_iter().next().map(decode_row).transpose() {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return Err(AppError::Internal("Profile insert returned no row".to_string()));
            }
            Err(e) => return Err(AppError::Internal(e.to_string())),
        };

        info!(
            created_by = %admin.user_id,
            user_id = %identity.id,
            role = %profile.role,
            "User provisioned"
        );
        Ok(ProvisionedUser {
            id: identity.id,
            email: identity.email,
            profile,
        })
    }

    async fn authenticate(&self, bearer: Option<&str>) -> AppResult<AuthUser> {
        let token = bearer
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

        self.auth.verify(token).await.map_err(|e| {
            warn!(error = %e, "Rejected provisioning token");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
    }

    /// Re-reads the caller's profile on every call.
    async fn authorize(&self, caller: &AuthUser) -> AppResult<UserProfile> {
        match profiles::require_admin(self.store.as_ref(), caller.id).await {
            Ok(profile) => Ok(profile),
            Err(AppError::Forbidden(msg)) => {
                warn!(user_id = %caller.id, "Non-admin attempted to create a user");
                Err(AppError::Forbidden(msg))
            }
            Err(e) => Err(AppError::Internal(e.to_string())),
        }
    }

    async fn remove_identity(&self, identity: &AuthUser) -> AppResult<()> {
        self.auth.delete_identity(identity.id).await.map_err(|e| {
            error!(user_id = %identity.id, error = %e, "Failed to remove orphaned identity");
            AppError::Internal(format!("Failed to clean up identity {}: {}", identity.id, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtManager, MemoryAuthProvider};
    use crate::store::MemoryStore;

    struct Fixture {
        auth: Arc<MemoryAuthProvider>,
        store: Arc<MemoryStore>,
        provisioner: UserProvisioner,
    }

    fn fixture() -> Fixture {
        let auth = Arc::new(MemoryAuthProvider::new(JwtManager::new(
            "provisioning-test-secret".to_string(),
            60,
            120,
        )));
        let store = Arc::new(MemoryStore::new());
        let provisioner = UserProvisioner::new(auth.clone(), store.clone());
        Fixture {
            auth,
            store,
            provisioner,
        }
    }

    /// Create a caller with `role` and return their access token.
    async fn caller(f: &Fixture, email: &str, role: Role) -> String {
        let user = f.auth.create_identity(email, "password1").await.unwrap();
        f.store
            .insert(
                Table::UserProfiles,
                vec![json!({ "user_id": user.id, "username": email, "role": role })],
            )
            .await
            .unwrap();
        f.auth.sign_in(email, "password1").await.unwrap().access_token
    }

    fn request(email: &str, company_id: Option<Uuid>) -> CreateUserRequest {
        CreateUserRequest {
            username: "new clerk".to_string(),
            email: email.to_string(),
            password: "password2".to_string(),
            role: Role::Staff,
            company_id,
        }
    }

    #[tokio::test]
    async fn test_admin_creates_user_with_profile() {
        let f = fixture();
        let token = caller(&f, "admin@shop.test", Role::Admin).await;

        let created = f
            .provisioner
            .create_user(Some(&token), request("clerk@shop.test", None))
            .await
            .unwrap();
        assert_eq!(created.email, "clerk@shop.test");
        assert_eq!(created.profile.user_id, created.id);
        assert_eq!(created.profile.role, Role::Staff);
        assert!(created.profile.is_active);
        assert_eq!(f.store.count(Table::UserProfiles).await, 2);
    }

    #[tokio::test]
    async fn test_staff_caller_forbidden_and_no_identity_created() {
        let f = fixture();
        let token = caller(&f, "clerk@shop.test", Role::Staff).await;
        let creates_before = f.auth.create_requests();

        let err = f
            .provisioner
            .create_user(Some(&token), request("other@shop.test", None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert_eq!(f.auth.create_requests(), creates_before);
        assert!(!f.auth.contains_email("other@shop.test"));
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_unauthorized() {
        let f = fixture();

        let missing = f
            .provisioner
            .create_user(None, request("x@shop.test", None))
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::Unauthorized(_)));

        let bad = f
            .provisioner
            .create_user(Some("not-a-token"), request("x@shop.test", None))
            .await
            .unwrap_err();
        assert!(matches!(bad, AppError::Unauthorized(_)));
        assert_eq!(f.auth.identity_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_profile_insert_leaves_no_orphaned_identity() {
        let f = fixture();
        let token = caller(&f, "admin@shop.test", Role::SuperAdmin).await;
        let identities_before = f.auth.identity_count();

        // Unknown company: the profile insert hits the foreign key.
        let err = f
            .provisioner
            .create_user(Some(&token), request("ghost@shop.test", Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        assert_eq!(f.auth.identity_count(), identities_before);
        assert!(!f.auth.contains_email("ghost@shop.test"));
        assert_eq!(f.store.count(Table::UserProfiles).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_bad_request() {
        let f = fixture();
        let token = caller(&f, "admin@shop.test", Role::Admin).await;

        let err = f
            .provisioner
            .create_user(Some(&token), request("admin@shop.test", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CreationFailed(_)));
    }

    #[tokio::test]
    async fn test_admin_cannot_create_super_admin() {
        let f = fixture();
        let token = caller(&f, "admin@shop.test", Role::Admin).await;
        let mut req = request("root@shop.test", None);
        req.role = Role::SuperAdmin;

        let err = f.provisioner.create_user(Some(&token), req).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(!f.auth.contains_email("root@shop.test"));
    }
}

use serde_json::json;
use uuid::Uuid;

use super::decode_row;
use crate::error::{AppError, AppResult};
use crate::models::{Company, ProfileWithCompany, UserProfile};
use crate::store::{Store, Table};

/// Profile owned by identity `user_id`, if any.
pub async fn find_profile(store: &dyn Store, user_id: Uuid) -> AppResult<Option<UserProfile>> {
    let rows = store
        .select_by(Table::UserProfiles, "user_id", &json!(user_id))
        .await?;

    rows.into_iter().next().map(decode_row).transpose()
}

/// Profile joined with its company. A dangling or absent `company_id`
/// yields `company: None`.
pub async fn find_profile_with_company(
    store: &dyn Store,
    user_id: Uuid,
) -> AppResult<Option<ProfileWithCompany>> {
    let Some(profile) = find_profile(store, user_id).await? else {
        return Ok(None);
    };

    let company = match profile.company_id {
        Some(company_id) => store
            .select_by(Table::Companies, "id", &json!(company_id))
            .await?
            .into_iter()
            .next()
            .map(decode_row::<Company>)
            .transpose()?,
        None => None,
    };

    Ok(Some(ProfileWithCompany { profile, company }))
}

/// Active admin or super_admin profile for `user_id`, or `Forbidden`.
pub async fn require_admin(store: &dyn Store, user_id: Uuid) -> AppResult<UserProfile> {
    match find_profile(store, user_id).await? {
        Some(profile) if profile.is_active && profile.role.is_admin() => Ok(profile),
        Some(_) => Err(AppError::Forbidden(
            "Only administrators can perform this action".to_string(),
        )),
        None => Err(AppError::Forbidden("No profile for this account".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_profile_joined_with_company() {
        let store = MemoryStore::new();
        let company = store
            .insert(Table::Companies, vec![json!({ "name": "Northwind" })])
            .await
            .unwrap()
            .remove(0);
        let user_id = Uuid::new_v4();
        store
            .insert(
                Table::UserProfiles,
                vec![json!({
                    "user_id": user_id,
                    "username": "ops",
                    "role": "admin",
                    "company_id": company["id"],
                })],
            )
            .await
            .unwrap();

        let joined = find_profile_with_company(&store, user_id).await.unwrap().unwrap();
        assert_eq!(joined.profile.role, Role::Admin);
        assert_eq!(joined.company.unwrap().name, "Northwind");
        assert!(require_admin(&store, user_id).await.is_ok());

        assert!(find_profile(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_staff_is_not_admin() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .insert(
                Table::UserProfiles,
                vec![json!({ "user_id": user_id, "username": "clerk" })],
            )
            .await
            .unwrap();

        let profile = find_profile(&store, user_id).await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Staff);
        assert!(profile.is_active);
        assert!(matches!(
            require_admin(&store, user_id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}

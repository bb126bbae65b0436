use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Application role, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Staff,
    Guest,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Guest => "guest",
        }
    }

    /// Roles allowed to provision users and run backup/restore.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level user record, one per authentication identity.
///
/// Maps to the `user_profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,

    /// Identity this profile belongs to
    pub user_id: Uuid,

    pub company_id: Option<Uuid>,

    pub username: String,

    pub role: Role,

    /// Extra named permissions granted on top of the role
    #[serde(default)]
    pub permissions: Vec<String>,

    pub is_active: bool,
}

impl UserProfile {
    /// `super_admin` holds every permission; everyone else needs it listed.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::SuperAdmin || self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Company a profile belongs to. Maps to the `companies` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Profile joined with its company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileWithCompany {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub company: Option<Company>,
}

/// Body of the privileged create-user call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role, permissions: &[&str]) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            company_id: None,
            username: "tester".to_string(),
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            is_active: true,
        }
    }

    #[test]
    fn test_permission_predicates() {
        let clerk = profile(Role::Staff, &["sales.create"]);
        assert!(clerk.has_permission("sales.create"));
        assert!(!clerk.has_permission("backup.restore"));
        assert!(clerk.has_role(Role::Staff));
        assert!(!clerk.has_role(Role::Admin));

        let root = profile(Role::SuperAdmin, &[]);
        assert!(root.has_permission("backup.restore"));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_value(Role::SuperAdmin).unwrap(), "super_admin");
        assert_eq!(serde_json::from_value::<Role>(serde_json::json!("manager")).unwrap(), Role::Manager);
        assert!(serde_json::from_value::<Role>(serde_json::json!("owner")).is_err());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Manager.is_admin());
    }
}

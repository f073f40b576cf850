//! User model
//!
//! Users authenticate with email and password. What they may do is decided
//! by their roles (see [`super::Role`]), not by a field on the user row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Name of the role that bypasses every permission check
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Email address (unique, used to log in)
    pub email: String,
    /// Display name
    pub name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub status: UserStatus,
    /// Set when the password was generated by the system
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user. The password must already be hashed.
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            name,
            password_hash,
            status: UserStatus::Active,
            must_change_password: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account may log in
    pub fn can_login(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// User together with the names of its roles
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}

/// An authenticated user with resolved roles and effective permissions
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(|r| r == SUPER_ADMIN_ROLE)
    }

    /// Check a `resource:action` permission. Super admins hold every permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_super_admin() || self.permissions.contains(permission)
    }
}

/// Filters for the user list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// Substring of email or name
    pub search: Option<String>,
    pub status: Option<UserStatus>,
    /// Role name
    pub role: Option<String>,
}

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

/// Input for creating an administrator account
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdminInput {
    pub email: String,
    pub name: String,
    /// Generated when absent
    #[serde(default)]
    pub password: Option<String>,
    /// Role names, `admin` when absent or empty
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Input for updating a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub name: Option<String>,
    pub status: Option<UserStatus>,
}

impl UpdateUserInput {
    pub fn has_changes(&self) -> bool {
        self.email.is_some() || self.name.is_some() || self.status.is_some()
    }
}

/// Result of an operation that produced a one-time temporary password
#[derive(Debug, Clone, Serialize)]
pub struct UserWithTemporaryPassword {
    pub user: UserWithRoles,
    /// Shown once, never stored in plain text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&str], permissions: &[&str]) -> Principal {
        Principal {
            user: User::new("a@example.com".into(), "A".into(), "hash".into()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_user_new_defaults() {
        let user = User::new("a@example.com".into(), "Alice".into(), "hash".into());
        assert_eq!(user.id, 0);
        assert_eq!(user.status, UserStatus::Active);
        assert!(!user.must_change_password);
        assert!(user.last_login_at.is_none());
        assert!(user.can_login());
    }

    #[test]
    fn test_inactive_and_suspended_cannot_login() {
        let mut user = User::new("a@example.com".into(), "Alice".into(), "hash".into());
        user.status = UserStatus::Inactive;
        assert!(!user.can_login());
        user.status = UserStatus::Suspended;
        assert!(!user.can_login());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("a@example.com".into(), "Alice".into(), "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"status\":\"ACTIVE\""));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(UserStatus::from_str("active").unwrap(), UserStatus::Active);
        assert_eq!(UserStatus::from_str("SUSPENDED").unwrap(), UserStatus::Suspended);
        assert!(UserStatus::from_str("banned").is_err());
    }

    #[test]
    fn test_principal_permissions() {
        let editor = principal(&["editor"], &["posts:read", "posts:update"]);
        assert!(editor.has_permission("posts:read"));
        assert!(!editor.has_permission("users:delete"));

        let root = principal(&[SUPER_ADMIN_ROLE], &[]);
        assert!(root.has_permission("users:delete"));
    }
}

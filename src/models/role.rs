//! Role and permission models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resources guarded by permissions
pub const RESOURCES: &[&str] = &[
    "users",
    "roles",
    "posts",
    "categories",
    "tags",
    "assets",
    "members",
    "events",
    "faqs",
    "settings",
];

/// Actions available on every resource
pub const ACTIONS: &[&str] = &["create", "read", "update", "delete"];

/// Build a permission name such as `posts:update`
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Every permission name, resource-major
pub fn all_permission_names() -> Vec<String> {
    RESOURCES
        .iter()
        .flat_map(|r| ACTIONS.iter().map(move |a| permission_name(r, a)))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role with the names of its permissions
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

/// A `resource:action` permission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Split the name into resource and action
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.name.split_once(':')
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoleInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

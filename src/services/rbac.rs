//! Roles and permissions
//!
//! Permissions are fixed `resource:action` names created on startup.
//! Roles are editable sets of them. `super_admin` is reserved: it cannot
//! be renamed or deleted and bypasses permission checks entirely.

use crate::db::repositories::RoleRepository;
use crate::models::{
    all_permission_names, permission_name, CreateRoleInput, Permission, Role,
    RoleWithPermissions, UpdateRoleInput, ACTIONS, RESOURCES, SUPER_ADMIN_ROLE,
};
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Roles created on first start, with their permission names
pub fn default_roles() -> Vec<(&'static str, &'static str, Vec<String>)> {
    let all = all_permission_names();
    let content = ["posts", "categories", "tags", "assets"];
    let pages = ["members", "events", "faqs"];

    let mut editor = Vec::new();
    for resource in content {
        for action in ACTIONS {
            editor.push(permission_name(resource, action));
        }
    }
    for resource in pages {
        for action in ["create", "read", "update"] {
            editor.push(permission_name(resource, action));
        }
    }
    editor.push(permission_name("settings", "read"));

    let viewer = RESOURCES
        .iter()
        .filter(|r| **r != "users" && **r != "roles")
        .map(|r| permission_name(r, "read"))
        .collect();

    vec![
        (SUPER_ADMIN_ROLE, "Unrestricted access", all.clone()),
        ("admin", "Manages users and all content", all),
        ("editor", "Writes and publishes content", editor),
        ("viewer", "Read-only access to content", viewer),
    ]
}

pub struct RbacService {
    repo: Arc<dyn RoleRepository>,
}

impl RbacService {
    pub fn new(repo: Arc<dyn RoleRepository>) -> Self {
        Self { repo }
    }

    /// Create missing permissions and default roles. Existing roles keep
    /// whatever permissions they were edited to.
    pub async fn ensure_defaults(&self) -> ServiceResult<()> {
        let existing: HashSet<String> = self
            .repo
            .list_permissions()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();

        let mut created = 0;
        for resource in RESOURCES {
            for action in ACTIONS {
                let name = permission_name(resource, action);
                if !existing.contains(&name) {
                    let description = format!("{} {}", capitalize(action), resource);
                    self.repo.create_permission(&name, Some(&description)).await?;
                    created += 1;
                }
            }
        }
        if created > 0 {
            tracing::info!(created, "Created permissions");
        }

        let permissions = self.repo.list_permissions().await?;
        for (name, description, grants) in default_roles() {
            if self.repo.get_by_name(name).await?.is_some() {
                continue;
            }
            let role = self
                .repo
                .create(&Role::new(name.to_string(), Some(description.to_string())))
                .await?;
            let ids: Vec<i64> = permissions
                .iter()
                .filter(|p| grants.contains(&p.name))
                .map(|p| p.id)
                .collect();
            self.repo.set_permissions(role.id, &ids).await?;
            tracing::info!(role = name, permissions = ids.len(), "Created default role");
        }
        Ok(())
    }

    pub async fn list_roles(&self) -> ServiceResult<Vec<RoleWithPermissions>> {
        let roles = self.repo.list().await?;
        let mut result = Vec::with_capacity(roles.len());
        for role in roles {
            result.push(self.with_permissions(role).await?);
        }
        Ok(result)
    }

    pub async fn get_role(&self, id: i64) -> ServiceResult<RoleWithPermissions> {
        let role = self.find(id).await?;
        self.with_permissions(role).await
    }

    pub async fn create_role(&self, input: CreateRoleInput) -> ServiceResult<RoleWithPermissions> {
        let name = validate_role_name(&input.name)?;
        if self.repo.get_by_name(&name).await?.is_some() {
            return Err(ServiceError::conflict(format!("Role '{}' already exists", name)));
        }
        let permission_ids = self.check_permission_ids(&input.permission_ids).await?;

        let role = self.repo.create(&Role::new(name, input.description)).await?;
        self.repo.set_permissions(role.id, &permission_ids).await?;
        tracing::info!(role_id = role.id, "Role created");
        self.with_permissions(role).await
    }

    pub async fn update_role(
        &self,
        id: i64,
        input: UpdateRoleInput,
    ) -> ServiceResult<RoleWithPermissions> {
        let mut role = self.find(id).await?;

        if let Some(name) = input.name {
            let name = validate_role_name(&name)?;
            if name != role.name {
                if role.name == SUPER_ADMIN_ROLE {
                    return Err(ServiceError::Forbidden(
                        "The super_admin role cannot be renamed".into(),
                    ));
                }
                if self.repo.get_by_name(&name).await?.is_some() {
                    return Err(ServiceError::conflict(format!("Role '{}' already exists", name)));
                }
                role.name = name;
            }
        }
        if input.description.is_some() {
            role.description = input.description;
        }

        let role = self.repo.update(&role).await?;
        self.with_permissions(role).await
    }

    pub async fn delete_role(&self, id: i64) -> ServiceResult<()> {
        let role = self.find(id).await?;
        if role.name == SUPER_ADMIN_ROLE {
            return Err(ServiceError::Forbidden(
                "The super_admin role cannot be deleted".into(),
            ));
        }
        let holders = self.repo.count_users(id).await?;
        self.repo.delete(id).await?;
        tracing::info!(role_id = id, holders, "Role deleted");
        Ok(())
    }

    /// Replace the role's permission set
    pub async fn set_permissions(
        &self,
        id: i64,
        permission_ids: &[i64],
    ) -> ServiceResult<RoleWithPermissions> {
        let role = self.find(id).await?;
        let ids = self.check_permission_ids(permission_ids).await?;
        self.repo.set_permissions(id, &ids).await?;
        self.with_permissions(role).await
    }

    pub async fn list_permissions(&self) -> ServiceResult<Vec<Permission>> {
        Ok(self.repo.list_permissions().await?)
    }

    async fn find(&self, id: i64) -> ServiceResult<Role> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role"))
    }

    async fn with_permissions(&self, role: Role) -> ServiceResult<RoleWithPermissions> {
        let permissions = self.repo.get_permission_names(role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    /// Deduplicated ids, all of which must exist
    async fn check_permission_ids(&self, ids: &[i64]) -> ServiceResult<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let known: HashSet<i64> = self
            .repo
            .list_permissions()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !known.contains(id) {
                return Err(ServiceError::validation(format!("Unknown permission id: {}", id)));
            }
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        Ok(unique)
    }
}

fn validate_role_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    require_non_empty("Role name", name)?;
    require_max_len("Role name", name, 50)?;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::validation(
            "Role name may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(name.to_lowercase())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

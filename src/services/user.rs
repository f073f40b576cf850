//! User management
//!
//! Account CRUD plus the administrator workflows: creating an admin with
//! roles in one transaction, resetting a password to a one-time temporary
//! value, and replacing a user's role set.

use crate::db::repositories::{RoleRepository, SessionRepository, UserRepository};
use crate::models::{
    CreateAdminInput, CreateUserInput, ListParams, PagedResult, Principal, UpdateUserInput, User,
    UserFilter, UserWithRoles, UserWithTemporaryPassword, SUPER_ADMIN_ROLE,
};
use crate::services::password::{
    generate_temporary_password, hash_password, password_policy_violation,
};
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Role given by `create_admin` when the input names none
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Account created on first start when the users table is empty
pub const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@localhost";

static EMAIL_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$"));

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    session_repo: Arc<dyn SessionRepository>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            session_repo,
        }
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<UserWithRoles>> {
        let (users, total) = self.user_repo.list(filter, params).await?;
        let mut items = Vec::with_capacity(users.len());
        for user in users {
            items.push(self.with_roles(user).await?);
        }
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<UserWithRoles> {
        let user = self.find(id).await?;
        self.with_roles(user).await
    }

    pub async fn create(&self, input: CreateUserInput) -> ServiceResult<UserWithRoles> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_name(&input.name)?;
        if let Some(reason) = password_policy_violation(&input.password) {
            return Err(ServiceError::Validation(reason));
        }
        self.ensure_email_free(&email, None).await?;

        let mut user = User::new(email, input.name.trim().to_string(), hash_password(&input.password)?);
        if let Some(status) = input.status {
            user.status = status;
        }
        let user = self.user_repo.create(&user).await?;
        tracing::info!(user_id = user.id, "User created");
        self.with_roles(user).await
    }

    pub async fn update(&self, id: i64, input: UpdateUserInput) -> ServiceResult<UserWithRoles> {
        let mut user = self.find(id).await?;
        if !input.has_changes() {
            return self.with_roles(user).await;
        }

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            validate_email(&email)?;
            if email != user.email {
                self.ensure_email_free(&email, Some(id)).await?;
                user.email = email;
            }
        }
        if let Some(name) = input.name {
            validate_name(&name)?;
            user.name = name.trim().to_string();
        }
        if let Some(status) = input.status {
            user.status = status;
        }

        let user = self.user_repo.update(&user).await?;
        if !user.can_login() {
            // Disabled accounts lose their sessions immediately
            self.session_repo.delete_by_user(id).await?;
        }
        self.with_roles(user).await
    }

    /// Delete a user. Users cannot delete themselves.
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> ServiceResult<()> {
        if id == acting_user_id {
            return Err(ServiceError::validation("You cannot delete your own account"));
        }
        self.find(id).await?;
        let authored = self.user_repo.count_authored_posts(id).await?;
        if authored > 0 {
            return Err(ServiceError::conflict(format!(
                "User still authors {} posts",
                authored
            )));
        }
        if !self.user_repo.delete(id).await? {
            return Err(ServiceError::not_found("User"));
        }
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Create a user holding the given roles. When no password is supplied a
    /// temporary one is generated and returned once. The user row and its
    /// role links are written in one transaction. Only a super admin may
    /// hand out `super_admin`.
    pub async fn create_admin(
        &self,
        input: CreateAdminInput,
        actor: &Principal,
    ) -> ServiceResult<UserWithTemporaryPassword> {
        self.insert_admin(input, actor.is_super_admin()).await
    }

    async fn insert_admin(
        &self,
        input: CreateAdminInput,
        may_grant_super_admin: bool,
    ) -> ServiceResult<UserWithTemporaryPassword> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_name(&input.name)?;

        let role_names = if input.roles.is_empty() {
            vec![DEFAULT_ADMIN_ROLE.to_string()]
        } else {
            input.roles
        };
        let mut role_ids = Vec::with_capacity(role_names.len());
        for name in &role_names {
            let role = self
                .role_repo
                .get_by_name(name)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("Unknown role: {}", name)))?;
            if role.name == SUPER_ADMIN_ROLE && !may_grant_super_admin {
                return Err(super_admin_required());
            }
            if !role_ids.contains(&role.id) {
                role_ids.push(role.id);
            }
        }

        self.ensure_email_free(&email, None).await?;

        let (password, temporary_password) = match input.password.filter(|p| !p.is_empty()) {
            Some(password) => {
                if let Some(reason) = password_policy_violation(&password) {
                    return Err(ServiceError::Validation(reason));
                }
                (password, None)
            }
            None => {
                let generated = generate_temporary_password();
                (generated.clone(), Some(generated))
            }
        };

        let mut user = User::new(email, input.name.trim().to_string(), hash_password(&password)?);
        user.must_change_password = temporary_password.is_some();

        let user = self.user_repo.create_with_roles(&user, &role_ids).await?;
        tracing::info!(user_id = user.id, roles = ?role_names, "Administrator created");

        Ok(UserWithTemporaryPassword {
            user: self.with_roles(user).await?,
            temporary_password,
        })
    }

    /// Replace the password with a temporary one and revoke all sessions
    pub async fn reset_password(&self, id: i64) -> ServiceResult<UserWithTemporaryPassword> {
        let mut user = self.find(id).await?;
        let temporary = generate_temporary_password();

        user.password_hash = hash_password(&temporary)?;
        user.must_change_password = true;
        let user = self.user_repo.update(&user).await?;
        let revoked = self.session_repo.delete_by_user(id).await?;
        tracing::info!(user_id = id, revoked, "Password reset");

        Ok(UserWithTemporaryPassword {
            user: self.with_roles(user).await?,
            temporary_password: Some(temporary),
        })
    }

    /// Replace the user's roles. Granting or revoking `super_admin` takes
    /// a super admin.
    pub async fn assign_roles(
        &self,
        id: i64,
        role_ids: &[i64],
        actor: &Principal,
    ) -> ServiceResult<UserWithRoles> {
        let user = self.find(id).await?;

        let mut unique = Vec::with_capacity(role_ids.len());
        let mut grants_super_admin = false;
        for &role_id in role_ids {
            if unique.contains(&role_id) {
                continue;
            }
            let role = self
                .role_repo
                .get_by_id(role_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("Unknown role id: {}", role_id)))?;
            grants_super_admin |= role.name == SUPER_ADMIN_ROLE;
            unique.push(role_id);
        }

        if !actor.is_super_admin() {
            let holds_super_admin = self
                .user_repo
                .get_role_names(id)
                .await?
                .iter()
                .any(|r| r == SUPER_ADMIN_ROLE);
            if grants_super_admin || holds_super_admin {
                return Err(super_admin_required());
            }
        }

        self.user_repo.set_roles(id, &unique).await?;
        self.with_roles(user).await
    }

    /// Create a super admin with a temporary password when no user exists.
    /// Returns the email and password so the caller can print them once.
    pub async fn ensure_initial_admin(&self) -> ServiceResult<Option<(String, String)>> {
        if self.user_repo.count().await? > 0 {
            return Ok(None);
        }

        let created = self
            .insert_admin(
                CreateAdminInput {
                    email: BOOTSTRAP_ADMIN_EMAIL.to_string(),
                    name: "Administrator".to_string(),
                    password: None,
                    roles: vec![SUPER_ADMIN_ROLE.to_string()],
                },
                true,
            )
            .await?;

        match created.temporary_password {
            Some(password) => Ok(Some((created.user.user.email, password))),
            None => Ok(None),
        }
    }

    async fn find(&self, id: i64) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    async fn with_roles(&self, user: User) -> ServiceResult<UserWithRoles> {
        let roles = self.user_repo.get_role_names(user.id).await?;
        Ok(UserWithRoles { user, roles })
    }

    async fn ensure_email_free(&self, email: &str, except_id: Option<i64>) -> ServiceResult<()> {
        match self.user_repo.get_by_email(email).await? {
            Some(existing) if Some(existing.id) != except_id => Err(ServiceError::conflict(
                format!("Email '{}' is already registered", email),
            )),
            _ => Ok(()),
        }
    }
}

fn super_admin_required() -> ServiceError {
    ServiceError::Forbidden("Only a super admin can grant or revoke super_admin".into())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> ServiceResult<()> {
    require_non_empty("Email", email)?;
    require_max_len("Email", email, 255)?;
    let re = EMAIL_RE
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Invalid email pattern: {}", e))?;
    if !re.is_match(email) {
        return Err(ServiceError::validation("Email address is invalid"));
    }
    Ok(())
}

fn validate_name(name: &str) -> ServiceResult<()> {
    require_non_empty("Name", name)?;
    require_max_len("Name", name, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxRoleRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Role, Session, UserStatus};
    use crate::services::password::verify_password;
    use chrono::Duration;
    use std::collections::BTreeSet;

    struct Fixture {
        pool: DynDatabasePool,
        service: UserService,
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        sessions: Arc<dyn SessionRepository>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::boxed(pool.clone());
        let roles = SqlxRoleRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        for name in [DEFAULT_ADMIN_ROLE, SUPER_ADMIN_ROLE, "editor"] {
            roles.create(&Role::new(name.into(), None)).await.unwrap();
        }
        Fixture {
            pool,
            service: UserService::new(users.clone(), roles.clone(), sessions.clone()),
            users,
            roles,
            sessions,
        }
    }

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            user: User::new("actor@example.com".into(), "Actor".into(), String::new()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: BTreeSet::new(),
        }
    }

    fn root() -> Principal {
        principal(&[SUPER_ADMIN_ROLE])
    }

    fn create_input(email: &str) -> CreateUserInput {
        CreateUserInput {
            email: email.into(),
            name: "Ann".into(),
            password: "password123".into(),
            status: None,
        }
    }

    fn admin_input(email: &str, password: Option<&str>, roles: &[&str]) -> CreateAdminInput {
        CreateAdminInput {
            email: email.into(),
            name: "Admin".into(),
            password: password.map(String::from),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_duplicate_email() {
        let f = setup().await;
        let created = f.service.create(create_input(" Ann@Example.com ")).await.unwrap();
        assert_eq!(created.user.email, "ann@example.com");
        assert!(created.roles.is_empty());

        let err = f.service.create(create_input("ann@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;
        let err = f.service.create(create_input("not-an-email")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut input = create_input("b@example.com");
        input.password = "short".into();
        assert!(matches!(
            f.service.create(input).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_create_admin_generates_temporary_password() {
        let f = setup().await;
        let created = f
            .service
            .create_admin(admin_input("boss@example.com", None, &[]), &root())
            .await
            .unwrap();

        let temporary = created.temporary_password.expect("temporary password returned");
        assert_eq!(created.user.roles, vec![DEFAULT_ADMIN_ROLE.to_string()]);
        assert!(created.user.user.must_change_password);

        let stored = f.users.get_by_email("boss@example.com").await.unwrap().unwrap();
        assert!(verify_password(&temporary, &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_create_admin_with_password_and_roles() {
        let f = setup().await;
        let created = f
            .service
            .create_admin(admin_input("ed@example.com", Some("password123"), &["editor", "admin"]), &root())
            .await
            .unwrap();
        assert!(created.temporary_password.is_none());
        assert!(!created.user.user.must_change_password);
        assert_eq!(created.user.roles.len(), 2);
    }

    #[tokio::test]
    async fn test_create_admin_unknown_role_writes_nothing() {
        let f = setup().await;
        let err = f
            .service
            .create_admin(admin_input("x@example.com", None, &["admin", "ghost"]), &root())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(f.users.get_by_email("x@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_admin_duplicate_email() {
        let f = setup().await;
        f.service.create(create_input("dup@example.com")).await.unwrap();
        let err = f
            .service
            .create_admin(admin_input("dup@example.com", None, &[]), &root())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(f.users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_password_revokes_sessions() {
        let f = setup().await;
        let user = f.service.create(create_input("ann@example.com")).await.unwrap().user;
        let session = Session::new(user.id, Duration::hours(1));
        f.sessions.create(&session).await.unwrap();

        let reset = f.service.reset_password(user.id).await.unwrap();
        let temporary = reset.temporary_password.unwrap();
        assert!(reset.user.user.must_change_password);

        let stored = f.users.get_by_id(user.id).await.unwrap().unwrap();
        assert!(verify_password(&temporary, &stored.password_hash).unwrap());
        assert!(f.sessions.get_by_id(&session.id).await.unwrap().is_none());

        assert!(matches!(
            f.service.reset_password(999).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_assign_roles_replaces_set() {
        let f = setup().await;
        let user = f.service.create(create_input("ann@example.com")).await.unwrap().user;
        let editor = f.roles.get_by_name("editor").await.unwrap().unwrap();
        let admin = f.roles.get_by_name(DEFAULT_ADMIN_ROLE).await.unwrap().unwrap();

        f.service.assign_roles(user.id, &[editor.id, admin.id], &root()).await.unwrap();
        let updated = f.service.assign_roles(user.id, &[editor.id], &root()).await.unwrap();
        assert_eq!(updated.roles, vec!["editor".to_string()]);

        let err = f.service.assign_roles(user.id, &[12345], &root()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_super_admin_grants_need_super_admin() {
        let f = setup().await;
        let admin = principal(&[DEFAULT_ADMIN_ROLE]);
        let user = f.service.create(create_input("ann@example.com")).await.unwrap().user;
        let root_role = f.roles.get_by_name(SUPER_ADMIN_ROLE).await.unwrap().unwrap();
        let editor = f.roles.get_by_name("editor").await.unwrap().unwrap();

        let err = f
            .service
            .assign_roles(user.id, &[root_role.id], &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(f.users.get_role_names(user.id).await.unwrap().is_empty());

        let err = f
            .service
            .create_admin(admin_input("root2@example.com", None, &[SUPER_ADMIN_ROLE]), &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(f.users.get_by_email("root2@example.com").await.unwrap().is_none());

        f.service.assign_roles(user.id, &[root_role.id], &root()).await.unwrap();
        let err = f
            .service
            .assign_roles(user.id, &[editor.id], &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let demoted = f.service.assign_roles(user.id, &[editor.id], &root()).await.unwrap();
        assert_eq!(demoted.roles, vec!["editor".to_string()]);
        f.service.assign_roles(user.id, &[], &admin).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let f = setup().await;
        let a = f.service.create(create_input("a@example.com")).await.unwrap().user;
        let b = f.service.create(create_input("b@example.com")).await.unwrap().user;

        let err = f
            .service
            .update(
                b.id,
                UpdateUserInput {
                    email: Some("a@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = f
            .service
            .update(
                b.id,
                UpdateUserInput {
                    status: Some(UserStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user.status, UserStatus::Inactive);

        assert!(f.service.delete(a.id, a.id).await.is_err());
        f.service.delete(b.id, a.id).await.unwrap();
        assert!(matches!(
            f.service.delete(b.id, a.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_refused_while_user_authors_posts() {
        let f = setup().await;
        let admin = f.service.create(create_input("admin@example.com")).await.unwrap().user;
        let author = f.service.create(create_input("author@example.com")).await.unwrap().user;
        let db = f.pool.sqlite().unwrap();
        sqlx::query("INSERT INTO posts (title, slug, content, status, author_id) VALUES ('T', 't', '', 'DRAFT', ?)")
            .bind(author.id)
            .execute(db)
            .await
            .unwrap();

        let err = f.service.delete(author.id, admin.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(f.users.get_by_id(author.id).await.unwrap().is_some());

        // The foreign key holds even when the service check is bypassed.
        assert!(f.users.delete(author.id).await.is_err());
        let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(db)
            .await
            .unwrap();
        assert_eq!(posts, 1);

        sqlx::query("DELETE FROM posts").execute(db).await.unwrap();
        f.service.delete(author.id, admin.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_with_role_filter() {
        let f = setup().await;
        f.service.create(create_input("plain@example.com")).await.unwrap();
        f.service
            .create_admin(admin_input("boss@example.com", None, &["admin"]), &root())
            .await
            .unwrap();

        let filter = UserFilter {
            role: Some("admin".into()),
            ..Default::default()
        };
        let page = f.service.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user.email, "boss@example.com");
    }

    #[tokio::test]
    async fn test_ensure_initial_admin_only_once() {
        let f = setup().await;
        let (email, password) = f.service.ensure_initial_admin().await.unwrap().unwrap();
        assert_eq!(email, BOOTSTRAP_ADMIN_EMAIL);
        assert_eq!(password.len(), 12);
        assert!(f.service.ensure_initial_admin().await.unwrap().is_none());
    }
}

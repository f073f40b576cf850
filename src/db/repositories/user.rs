//! User repository
//!
//! Database operations for users and their role assignments.

use super::query::{bind_mysql, bind_sqlite, BindValue, WhereClause};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, User, UserFilter, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.password_hash, u.status, \
     u.must_change_password, u.last_login_at, u.created_at, u.updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    /// Insert a user and its role links in one transaction
    async fn create_with_roles(&self, user: &User, role_ids: &[i64]) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    async fn update_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Returns false when no row was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;

    /// Posts whose `author_id` is the user
    async fn count_authored_posts(&self, user_id: i64) -> Result<i64>;

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;

    /// Role names held by the user, sorted
    async fn get_role_names(&self, user_id: i64) -> Result<Vec<String>>;

    /// Union of permission names across the user's roles, sorted
    async fn get_permission_names(&self, user_id: i64) -> Result<Vec<String>>;

    /// Replace the user's role links
    async fn set_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        self.create_with_roles(user, &[]).await
    }

    async fn create_with_roles(&self, user: &User, role_ids: &[i64]) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user, role_ids).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user, role_ids).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_mysql(&r)).transpose()
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users u WHERE LOWER(u.email) = LOWER(?)", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by email")?;
                row.map(|r| row_to_user_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by email")?;
                row.map(|r| row_to_user_mysql(&r)).transpose()
            }
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = r#"
            UPDATE users
            SET email = ?, name = ?, password_hash = ?, status = ?, must_change_password = ?,
                last_login_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.name)
                    .bind(&user.password_hash)
                    .bind(user.status.as_str())
                    .bind(user.must_change_password)
                    .bind(user.last_login_at)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.name)
                    .bind(&user.password_hash)
                    .bind(user.status.as_str())
                    .bind(user.must_change_password)
                    .bind(user.last_login_at)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update user")?;
            }
        }

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn update_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let sql = "UPDATE users SET last_login_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update last login")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update last login")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM users WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM users";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count users")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count users")?
                .get("count"),
        };
        Ok(count)
    }

    async fn count_authored_posts(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM posts WHERE author_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count authored posts")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count authored posts")?
                .get("count"),
        };
        Ok(count)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let clause = user_filter_clause(filter);
        let count_sql = format!("SELECT COUNT(*) AS count FROM users u{}", clause.sql());
        let list_sql = format!(
            "SELECT {} FROM users u{} ORDER BY u.created_at DESC, u.id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS,
            clause.sql()
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let total: i64 = bind_sqlite(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count users")?
                    .get("count");
                let rows = bind_sqlite(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                let users = rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((users, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let total: i64 = bind_mysql(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count users")?
                    .get("count");
                let rows = bind_mysql(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                let users = rows.iter().map(row_to_user_mysql).collect::<Result<Vec<_>>>()?;
                Ok((users, total))
            }
        }
    }

    async fn get_role_names(&self, user_id: i64) -> Result<Vec<String>> {
        let sql = r#"
            SELECT r.name AS name
            FROM roles r
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ?
            ORDER BY r.name
        "#;
        let names = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get user roles")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get user roles")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
        };
        Ok(names)
    }

    async fn get_permission_names(&self, user_id: i64) -> Result<Vec<String>> {
        let sql = r#"
            SELECT DISTINCT p.name AS name
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            INNER JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = ?
            ORDER BY p.name
        "#;
        let names = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get user permissions")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get user permissions")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
        };
        Ok(names)
    }

    async fn set_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_roles_sqlite(self.pool.sqlite()?, user_id, role_ids).await,
            DatabaseDriver::Mysql => set_roles_mysql(self.pool.mysql()?, user_id, role_ids).await,
        }
    }
}

fn user_filter_clause(filter: &UserFilter) -> WhereClause {
    let mut clause = WhereClause::new();
    if let Some(search) = &filter.search {
        clause.push_search(&["u.email", "u.name"], search);
    }
    if let Some(status) = filter.status {
        clause.push("u.status = ?", BindValue::Text(status.as_str().to_string()));
    }
    if let Some(role) = filter.role.as_deref().filter(|r| !r.is_empty()) {
        clause.push(
            "u.id IN (SELECT ur.user_id FROM user_roles ur \
             INNER JOIN roles r ON r.id = ur.role_id WHERE r.name = ?)",
            BindValue::Text(role.to_string()),
        );
    }
    clause
}

// ============================================================================
// SQLite implementations
// ============================================================================

const INSERT_USER: &str = r#"
    INSERT INTO users (email, name, password_hash, status, must_change_password,
                       last_login_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_USER_ROLE: &str = "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)";

async fn create_user_sqlite(pool: &SqlitePool, user: &User, role_ids: &[i64]) -> Result<User> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_USER)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.must_change_password)
        .bind(user.last_login_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create user")?
        .last_insert_rowid();

    for role_id in role_ids {
        sqlx::query(INSERT_USER_ROLE)
            .bind(id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign role")?;
    }

    tx.commit().await?;

    Ok(User {
        id,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn set_roles_sqlite(pool: &SqlitePool, user_id: i64, role_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear user roles")?;

    for role_id in role_ids {
        sqlx::query(INSERT_USER_ROLE)
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign role")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        status: UserStatus::from_str(&status)?,
        must_change_password: row.get("must_change_password"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User, role_ids: &[i64]) -> Result<User> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_USER)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.must_change_password)
        .bind(user.last_login_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create user")?
        .last_insert_id() as i64;

    for role_id in role_ids {
        sqlx::query(INSERT_USER_ROLE)
            .bind(id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign role")?;
    }

    tx.commit().await?;

    Ok(User {
        id,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn set_roles_mysql(pool: &MySqlPool, user_id: i64, role_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear user roles")?;

    for role_id in role_ids {
        sqlx::query(INSERT_USER_ROLE)
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign role")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        status: UserStatus::from_str(&status)?,
        must_change_password: row.get("must_change_password"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_role(pool: &DynDatabasePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO roles (name) VALUES (?)")
            .bind(name)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn user(email: &str, name: &str) -> User {
        User::new(email.to_string(), name.to_string(), "hash".to_string())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&user("ann@example.com", "Ann")).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "ann@example.com");
        assert_eq!(fetched.status, UserStatus::Active);
        assert!(!fetched.must_change_password);

        let by_email = repo.get_by_email("ANN@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&user("dup@example.com", "A")).await.unwrap();
        assert!(repo.create(&user("dup@example.com", "B")).await.is_err());
    }

    #[tokio::test]
    async fn test_create_with_roles_rolls_back_on_bad_role() {
        let (_pool, repo) = setup_test_repo().await;

        let result = repo
            .create_with_roles(&user("admin@example.com", "Admin"), &[999])
            .await;
        assert!(result.is_err());
        assert!(repo.get_by_email("admin@example.com").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_roles_and_permissions() {
        let (pool, repo) = setup_test_repo().await;
        let editor = insert_role(&pool, "editor").await;
        let viewer = insert_role(&pool, "viewer").await;

        let db = pool.sqlite().unwrap();
        for (id, name) in [(1, "posts:read"), (2, "posts:update")] {
            sqlx::query("INSERT INTO permissions (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(db)
                .await
                .unwrap();
        }
        for (role, perm) in [(editor, 1), (editor, 2), (viewer, 1)] {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(role)
                .bind(perm)
                .execute(db)
                .await
                .unwrap();
        }

        let created = repo
            .create_with_roles(&user("ed@example.com", "Ed"), &[editor, viewer])
            .await
            .unwrap();

        assert_eq!(
            repo.get_role_names(created.id).await.unwrap(),
            vec!["editor", "viewer"]
        );
        assert_eq!(
            repo.get_permission_names(created.id).await.unwrap(),
            vec!["posts:read", "posts:update"]
        );

        repo.set_roles(created.id, &[viewer]).await.unwrap();
        assert_eq!(repo.get_role_names(created.id).await.unwrap(), vec!["viewer"]);
        assert_eq!(
            repo.get_permission_names(created.id).await.unwrap(),
            vec!["posts:read"]
        );
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (pool, repo) = setup_test_repo().await;
        let editor = insert_role(&pool, "editor").await;

        repo.create_with_roles(&user("ann@example.com", "Ann"), &[editor])
            .await
            .unwrap();
        let mut bob = user("bob@example.com", "Bob");
        bob.status = UserStatus::Suspended;
        repo.create(&bob).await.unwrap();
        repo.create(&user("carl@example.com", "Carl")).await.unwrap();

        let params = ListParams::default();

        let (all, total) = repo.list(&UserFilter::default(), &params).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let filter = UserFilter {
            search: Some("bo".into()),
            ..Default::default()
        };
        let (found, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].name, "Bob");

        let filter = UserFilter {
            status: Some(UserStatus::Suspended),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter, &params).await.unwrap().1, 1);

        let filter = UserFilter {
            role: Some("editor".into()),
            ..Default::default()
        };
        let (found, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "ann@example.com");

        let page = ListParams::new(Some(2), Some(2));
        let (items, total) = repo.list(&UserFilter::default(), &page).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let mut created = repo.create(&user("x@example.com", "X")).await.unwrap();

        created.name = "Xavier".into();
        created.must_change_password = true;
        repo.update(&created).await.unwrap();

        let login_at = Utc::now();
        repo.update_last_login(created.id, login_at).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Xavier");
        assert!(fetched.must_change_password);
        assert!(fetched.last_login_at.is_some());

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}

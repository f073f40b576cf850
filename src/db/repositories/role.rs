//! Role and permission repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Permission, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Role repository trait
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, role: &Role) -> Result<Role>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Role>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// All roles ordered by name
    async fn list(&self) -> Result<Vec<Role>>;

    async fn update(&self, role: &Role) -> Result<Role>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Permission names granted to the role, sorted
    async fn get_permission_names(&self, role_id: i64) -> Result<Vec<String>>;

    /// Replace the role's permission links
    async fn set_permissions(&self, role_id: i64, permission_ids: &[i64]) -> Result<()>;

    /// All permissions ordered by name
    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;

    async fn create_permission(&self, name: &str, description: Option<&str>) -> Result<Permission>;

    /// Number of users holding the role
    async fn count_users(&self, role_id: i64) -> Result<i64>;
}

/// SQLx-based role repository implementation
pub struct SqlxRoleRepository {
    pool: DynDatabasePool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RoleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";
const PERMISSION_COLUMNS: &str = "id, name, description, created_at";

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    async fn create(&self, role: &Role) -> Result<Role> {
        let now = Utc::now();
        let sql = "INSERT INTO roles (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&role.name)
                .bind(&role.description)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create role")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&role.name)
                .bind(&role.description)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create role")?
                .last_insert_id() as i64,
        };

        Ok(Role {
            id,
            created_at: now,
            updated_at: now,
            ..role.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        let sql = format!("SELECT {} FROM roles WHERE id = ?", ROLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get role")?
                .map(|r| row_to_role_sqlite(&r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get role")?
                .map(|r| row_to_role_mysql(&r))),
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let sql = format!("SELECT {} FROM roles WHERE name = ?", ROLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get role by name")?
                .map(|r| row_to_role_sqlite(&r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get role by name")?
                .map(|r| row_to_role_mysql(&r))),
        }
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let sql = format!("SELECT {} FROM roles ORDER BY name", ROLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list roles")?
                .iter()
                .map(row_to_role_sqlite)
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list roles")?
                .iter()
                .map(row_to_role_mysql)
                .collect()),
        }
    }

    async fn update(&self, role: &Role) -> Result<Role> {
        let now = Utc::now();
        let sql = "UPDATE roles SET name = ?, description = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&role.name)
                    .bind(&role.description)
                    .bind(now)
                    .bind(role.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update role")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&role.name)
                    .bind(&role.description)
                    .bind(now)
                    .bind(role.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update role")?;
            }
        }
        Ok(Role {
            updated_at: now,
            ..role.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM roles WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete role")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete role")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_permission_names(&self, role_id: i64) -> Result<Vec<String>> {
        let sql = r#"
            SELECT p.name AS name
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ?
            ORDER BY p.name
        "#;
        let names = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(role_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get role permissions")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(role_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get role permissions")?
                .iter()
                .map(|r| r.get("name"))
                .collect(),
        };
        Ok(names)
    }

    async fn set_permissions(&self, role_id: i64, permission_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_permissions_sqlite(self.pool.sqlite()?, role_id, permission_ids).await
            }
            DatabaseDriver::Mysql => {
                set_permissions_mysql(self.pool.mysql()?, role_id, permission_ids).await
            }
        }
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let sql = format!("SELECT {} FROM permissions ORDER BY name", PERMISSION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list permissions")?
                .iter()
                .map(row_to_permission_sqlite)
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list permissions")?
                .iter()
                .map(row_to_permission_mysql)
                .collect()),
        }
    }

    async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let sql = format!("SELECT {} FROM permissions WHERE name = ?", PERMISSION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get permission")?
                .map(|r| row_to_permission_sqlite(&r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get permission")?
                .map(|r| row_to_permission_mysql(&r))),
        }
    }

    async fn create_permission(&self, name: &str, description: Option<&str>) -> Result<Permission> {
        let now = Utc::now();
        let sql = "INSERT INTO permissions (name, description, created_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(name)
                .bind(description)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create permission")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(name)
                .bind(description)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create permission")?
                .last_insert_id() as i64,
        };
        Ok(Permission {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: now,
        })
    }

    async fn count_users(&self, role_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM user_roles WHERE role_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(role_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count role users")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(role_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count role users")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const INSERT_ROLE_PERMISSION: &str =
    "INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)";

async fn set_permissions_sqlite(
    pool: &SqlitePool,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear role permissions")?;

    for permission_id in permission_ids {
        sqlx::query(INSERT_ROLE_PERMISSION)
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_role_sqlite(row: &sqlx::sqlite::SqliteRow) -> Role {
    Role {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_permission_sqlite(row: &sqlx::sqlite::SqliteRow) -> Permission {
    Permission {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn set_permissions_mysql(
    pool: &MySqlPool,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear role permissions")?;

    for permission_id in permission_ids {
        sqlx::query(INSERT_ROLE_PERMISSION)
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_role_mysql(row: &sqlx::mysql::MySqlRow) -> Role {
    Role {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_permission_mysql(row: &sqlx::mysql::MySqlRow) -> Permission {
    Permission {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

//! Settings repository
//!
//! Key/value storage behind the site settings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;

/// A setting key-value pair
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Values for the keys that exist
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Insert or overwrite a setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Insert or overwrite several settings in one transaction
    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sqlite(self.pool.sqlite()?, key).await,
            DatabaseDriver::Mysql => get_mysql(self.pool.mysql()?, key).await,
        }
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_all_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => get_all_mysql(self.pool.mysql()?).await,
        }
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let all = self.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|s| keys.contains(&s.key.as_str()))
            .map(|s| (s.key, s.value))
            .collect())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut single = HashMap::new();
        single.insert(key.to_string(), value.to_string());
        self.set_many(&single).await
    }

    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_many_sqlite(self.pool.sqlite()?, settings).await,
            DatabaseDriver::Mysql => set_many_mysql(self.pool.mysql()?, settings).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let sql = "DELETE FROM settings WHERE setting_key = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(key)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete setting")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(key)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete setting")?;
            }
        }
        Ok(())
    }
}

const SELECT_SETTING: &str =
    "SELECT setting_key, setting_value, updated_at FROM settings WHERE setting_key = ?";
const SELECT_ALL_SETTINGS: &str =
    "SELECT setting_key, setting_value, updated_at FROM settings ORDER BY setting_key";

// SQLite implementations
async fn get_sqlite(pool: &SqlitePool, key: &str) -> Result<Option<Setting>> {
    let row = sqlx::query(SELECT_SETTING)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("setting_key"),
        value: r.get("setting_value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn get_all_sqlite(pool: &SqlitePool) -> Result<Vec<Setting>> {
    let rows = sqlx::query(SELECT_ALL_SETTINGS)
        .fetch_all(pool)
        .await
        .context("Failed to list settings")?;

    Ok(rows
        .into_iter()
        .map(|r| Setting {
            key: r.get("setting_key"),
            value: r.get("setting_value"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

async fn set_many_sqlite(pool: &SqlitePool, settings: &HashMap<String, String>) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    for (key, value) in settings {
        sqlx::query(
            "INSERT INTO settings (setting_key, setting_value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(setting_key) DO UPDATE SET setting_value = excluded.setting_value,
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to set setting {}", key))?;
    }
    tx.commit().await?;
    Ok(())
}

// MySQL implementations
async fn get_mysql(pool: &MySqlPool, key: &str) -> Result<Option<Setting>> {
    let row = sqlx::query(SELECT_SETTING)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("setting_key"),
        value: r.get("setting_value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn get_all_mysql(pool: &MySqlPool) -> Result<Vec<Setting>> {
    let rows = sqlx::query(SELECT_ALL_SETTINGS)
        .fetch_all(pool)
        .await
        .context("Failed to list settings")?;

    Ok(rows
        .into_iter()
        .map(|r| Setting {
            key: r.get("setting_key"),
            value: r.get("setting_value"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

async fn set_many_mysql(pool: &MySqlPool, settings: &HashMap<String, String>) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    for (key, value) in settings {
        sqlx::query(
            "INSERT INTO settings (setting_key, setting_value, updated_at) VALUES (?, ?, ?)
             ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value),
             updated_at = VALUES(updated_at)",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to set setting {}", key))?;
    }
    tx.commit().await?;
    Ok(())
}

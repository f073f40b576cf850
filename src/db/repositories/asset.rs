//! Asset repository

use super::query::{bind_mysql, bind_sqlite, BindValue, WhereClause};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Asset, AssetFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn create(&self, asset: &Asset) -> Result<Asset>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>>;

    async fn update_alt_text(&self, id: i64, alt_text: Option<&str>) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest first
    async fn list(&self, filter: &AssetFilter, params: &ListParams) -> Result<(Vec<Asset>, i64)>;

    async fn count(&self) -> Result<i64>;

    /// Sum of `size_bytes` over all assets
    async fn total_size(&self) -> Result<i64>;
}

pub struct SqlxAssetRepository {
    pool: DynDatabasePool,
}

impl SqlxAssetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AssetRepository> {
        Arc::new(Self::new(pool))
    }
}

const ASSET_COLUMNS: &str =
    "id, filename, original_name, url, mime_type, size_bytes, alt_text, uploaded_by, created_at";

const INSERT_ASSET: &str = r#"
    INSERT INTO assets (filename, original_name, url, mime_type, size_bytes, alt_text,
                        uploaded_by, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

macro_rules! row_to_asset {
    ($row:expr) => {
        Asset {
            id: $row.get("id"),
            filename: $row.get("filename"),
            original_name: $row.get("original_name"),
            url: $row.get("url"),
            mime_type: $row.get("mime_type"),
            size_bytes: $row.get("size_bytes"),
            alt_text: $row.get("alt_text"),
            uploaded_by: $row.get("uploaded_by"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl AssetRepository for SqlxAssetRepository {
    async fn create(&self, asset: &Asset) -> Result<Asset> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_ASSET)
                .bind(&asset.filename)
                .bind(&asset.original_name)
                .bind(&asset.url)
                .bind(&asset.mime_type)
                .bind(asset.size_bytes)
                .bind(&asset.alt_text)
                .bind(asset.uploaded_by)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create asset")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_ASSET)
                .bind(&asset.filename)
                .bind(&asset.original_name)
                .bind(&asset.url)
                .bind(&asset.mime_type)
                .bind(asset.size_bytes)
                .bind(&asset.alt_text)
                .bind(asset.uploaded_by)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create asset")?
                .last_insert_id() as i64,
        };

        Ok(Asset {
            id,
            created_at: now,
            ..asset.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>> {
        let sql = format!("SELECT {} FROM assets WHERE id = ?", ASSET_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get asset")?
                .map(|r| row_to_asset!(r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get asset")?
                .map(|r| row_to_asset!(r))),
        }
    }

    async fn update_alt_text(&self, id: i64, alt_text: Option<&str>) -> Result<()> {
        let sql = "UPDATE assets SET alt_text = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(alt_text)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update asset")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(alt_text)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update asset")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM assets WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete asset")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete asset")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &AssetFilter, params: &ListParams) -> Result<(Vec<Asset>, i64)> {
        let mut clause = WhereClause::new();
        if let Some(prefix) = filter.mime_type.as_deref().filter(|p| !p.is_empty()) {
            clause.push("mime_type LIKE ?", BindValue::Text(format!("{}%", prefix)));
        }
        if let Some(search) = &filter.search {
            clause.push_search(&["original_name", "alt_text"], search);
        }

        let count_sql = format!("SELECT COUNT(*) AS count FROM assets{}", clause.sql());
        let list_sql = format!(
            "SELECT {} FROM assets{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ASSET_COLUMNS,
            clause.sql()
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let total: i64 = bind_sqlite(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count assets")?
                    .get("count");
                let rows = bind_sqlite(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assets")?;
                Ok((rows.iter().map(|r| row_to_asset!(r)).collect(), total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let total: i64 = bind_mysql(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count assets")?
                    .get("count");
                let rows = bind_mysql(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list assets")?;
                Ok((rows.iter().map(|r| row_to_asset!(r)).collect(), total))
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM assets";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count assets")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count assets")?
                .get("count"),
        };
        Ok(count)
    }

    async fn total_size(&self) -> Result<i64> {
        // SUM is NULL on an empty table; MySQL widens it to DECIMAL
        let sql = "SELECT CAST(COALESCE(SUM(size_bytes), 0) AS SIGNED) AS total FROM assets";
        let sqlite_sql = "SELECT COALESCE(SUM(size_bytes), 0) AS total FROM assets";
        let total: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sqlite_sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to sum asset sizes")?
                .get("total"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to sum asset sizes")?
                .get("total"),
        };
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxAssetRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAssetRepository::new(pool)
    }

    fn asset(filename: &str, original: &str, mime: &str, size: i64) -> Asset {
        Asset {
            id: 0,
            filename: filename.into(),
            original_name: original.into(),
            url: format!("/uploads/{}", filename),
            mime_type: mime.into(),
            size_bytes: size,
            alt_text: None,
            uploaded_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_update_alt_text() {
        let repo = setup_test_repo().await;
        let created = repo.create(&asset("a.png", "logo.png", "image/png", 10)).await.unwrap();
        repo.update_alt_text(created.id, Some("Company logo")).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.alt_text.as_deref(), Some("Company logo"));
        assert!(fetched.is_image());
    }

    #[tokio::test]
    async fn test_duplicate_filename_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&asset("a.png", "one.png", "image/png", 1)).await.unwrap();
        assert!(repo.create(&asset("a.png", "two.png", "image/png", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filter_and_totals() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.total_size().await.unwrap(), 0);

        repo.create(&asset("a.png", "logo.png", "image/png", 100)).await.unwrap();
        repo.create(&asset("b.jpg", "team.jpg", "image/jpeg", 200)).await.unwrap();
        repo.create(&asset("c.pdf", "brochure.pdf", "application/pdf", 50)).await.unwrap();

        let params = ListParams::default();
        let filter = AssetFilter {
            mime_type: Some("image/".into()),
            search: None,
        };
        let (items, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].filename, "b.jpg");

        let filter = AssetFilter {
            mime_type: None,
            search: Some("broch".into()),
        };
        assert_eq!(repo.list(&filter, &params).await.unwrap().1, 1);

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.total_size().await.unwrap(), 350);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup_test_repo().await;
        let created = repo.create(&asset("a.png", "a.png", "image/png", 1)).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}

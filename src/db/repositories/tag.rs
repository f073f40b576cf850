//! Tag repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Tags with the number of linked posts, most used first
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    async fn update(&self, tag: &Tag) -> Result<Tag>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Tags linked to a post
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// How many of `ids` exist
    async fn count_existing(&self, ids: &[i64]) -> Result<i64>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT id, name, slug, created_at FROM tags WHERE {} = ?", column);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(value)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get tag")?
                .map(|r| row_to_tag_sqlite(&r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(value)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get tag")?
                .map(|r| row_to_tag_mysql(&r))),
        }
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        let now = Utc::now();
        let sql = "INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create tag")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create tag")?
                .last_insert_id() as i64,
        };

        Ok(Tag {
            id,
            created_at: now,
            ..tag.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let sql = "SELECT id, name, slug, created_at FROM tags WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get tag by ID")?
                .map(|r| row_to_tag_sqlite(&r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get tag by ID")?
                .map(|r| row_to_tag_mysql(&r))),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        self.find_one("slug", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.find_one("name", name).await
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let sql = r#"
            SELECT t.id, t.name, t.slug, t.created_at, COUNT(pt.post_id) AS post_count
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id, t.name, t.slug, t.created_at
            ORDER BY post_count DESC, t.name ASC
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|r| TagWithCount {
                    tag: row_to_tag_sqlite(r),
                    post_count: r.get("post_count"),
                })
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|r| TagWithCount {
                    tag: row_to_tag_mysql(r),
                    post_count: r.get("post_count"),
                })
                .collect()),
        }
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        let sql = "UPDATE tags SET name = ?, slug = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&tag.name)
                    .bind(&tag.slug)
                    .bind(tag.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update tag")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&tag.name)
                    .bind(&tag.slug)
                    .bind(tag.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update tag")?;
            }
        }
        Ok(tag.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // post_tags rows go with the tag through ON DELETE CASCADE
        let sql = "DELETE FROM tags WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>> {
        let sql = r#"
            SELECT t.id, t.name, t.slug, t.created_at
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?
            ORDER BY t.name
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(sql)
                .bind(post_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get post tags")?
                .iter()
                .map(row_to_tag_sqlite)
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(sql)
                .bind(post_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get post tags")?
                .iter()
                .map(row_to_tag_mysql)
                .collect()),
        }
    }

    async fn count_existing(&self, ids: &[i64]) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) AS count FROM tags WHERE id IN ({})",
            super::query::placeholders(ids.len())
        );
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count tags")?
                    .get("count")
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count tags")?
                    .get("count")
            }
        };
        Ok(count)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM tags";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count tags")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count tags")?
                .get("count"),
        };
        Ok(count)
    }
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

//! Post repository
//!
//! Posts and their category/tag links. Link sets are written in the same
//! transaction as the post row.

use super::query::{bind_mysql, bind_sqlite, BindValue, WhereClause};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post with its category and tag links
    async fn create(&self, post: &Post, category_ids: &[i64], tag_ids: &[i64]) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Persist the post row. Link sets given as `Some` replace the current ones.
    async fn update(
        &self,
        post: &Post,
        category_ids: Option<&[i64]>,
        tag_ids: Option<&[i64]>,
    ) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest first. `filter.category` is ignored, pass a resolved `category_id`.
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Number of posts per status, statuses with no posts omitted
    async fn count_by_status(&self) -> Result<Vec<(PostStatus, i64)>>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.excerpt, p.content, p.status, p.author_id, \
     p.featured_asset_id, p.published_at, p.created_at, p.updated_at";

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, slug, excerpt, content, status, author_id, featured_asset_id,
                       published_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_POST: &str = r#"
    UPDATE posts
    SET title = ?, slug = ?, excerpt = ?, content = ?, status = ?, author_id = ?,
        featured_asset_id = ?, published_at = ?, updated_at = ?
    WHERE id = ?
"#;

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post, category_ids: &[i64], tag_ids: &[i64]) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_post_sqlite(self.pool.sqlite()?, post, category_ids, tag_ids).await
            }
            DatabaseDriver::Mysql => {
                create_post_mysql(self.pool.mysql()?, post, category_ids, tag_ids).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get post")?
                .map(|r| row_to_post_sqlite(&r))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get post")?
                .map(|r| row_to_post_mysql(&r))
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.slug = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get post by slug")?
                .map(|r| row_to_post_sqlite(&r))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get post by slug")?
                .map(|r| row_to_post_mysql(&r))
                .transpose(),
        }
    }

    async fn update(
        &self,
        post: &Post,
        category_ids: Option<&[i64]>,
        tag_ids: Option<&[i64]>,
    ) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_post_sqlite(self.pool.sqlite()?, post, category_ids, tag_ids).await
            }
            DatabaseDriver::Mysql => {
                update_post_mysql(self.pool.mysql()?, post, category_ids, tag_ids).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM posts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let clause = post_filter_clause(filter);
        let count_sql = format!("SELECT COUNT(*) AS count FROM posts p{}", clause.sql());
        let list_sql = format!(
            "SELECT {} FROM posts p{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS,
            clause.sql()
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let total: i64 = bind_sqlite(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let rows = bind_sqlite(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list posts")?;
                let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let total: i64 = bind_mysql(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let rows = bind_mysql(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list posts")?;
                let posts = rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
        }
    }

    async fn count_by_status(&self) -> Result<Vec<(PostStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) AS count FROM posts GROUP BY status ORDER BY status";
        let rows: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count posts by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to count posts by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
        };

        rows.into_iter()
            .map(|(status, count)| Ok((PostStatus::from_str(&status)?, count)))
            .collect()
    }
}

fn post_filter_clause(filter: &PostFilter) -> WhereClause {
    let mut clause = WhereClause::new();
    if let Some(status) = filter.status {
        clause.push("p.status = ?", BindValue::Text(status.as_str().to_string()));
    }
    if let Some(author_id) = filter.author_id {
        clause.push("p.author_id = ?", BindValue::Int(author_id));
    }
    if let Some(category_id) = filter.category_id {
        clause.push(
            "p.id IN (SELECT pc.post_id FROM post_categories pc WHERE pc.category_id = ?)",
            BindValue::Int(category_id),
        );
    }
    if let Some(tag_id) = filter.tag_id {
        clause.push(
            "p.id IN (SELECT pt.post_id FROM post_tags pt WHERE pt.tag_id = ?)",
            BindValue::Int(tag_id),
        );
    }
    if let Some(search) = &filter.search {
        clause.push_search(&["p.title"], search);
    }
    clause
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(
    pool: &SqlitePool,
    post: &Post,
    category_ids: &[i64],
    tag_ids: &[i64],
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(post.author_id)
        .bind(post.featured_asset_id)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_rowid();

    for category_id in category_ids {
        sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
            .bind(id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link category")?;
    }
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link tag")?;
    }

    tx.commit().await?;

    Ok(Post {
        id,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    post: &Post,
    category_ids: Option<&[i64]>,
    tag_ids: Option<&[i64]>,
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(post.author_id)
        .bind(post.featured_asset_id)
        .bind(post.published_at)
        .bind(now)
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(category_ids) = category_ids {
        sqlx::query("DELETE FROM post_categories WHERE post_id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post categories")?;
        for category_id in category_ids {
            sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
                .bind(post.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link category")?;
        }
    }
    if let Some(tag_ids) = tag_ids {
        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post tags")?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link tag")?;
        }
    }

    tx.commit().await?;

    Ok(Post {
        updated_at: now,
        ..post.clone()
    })
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        status: PostStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        featured_asset_id: row.get("featured_asset_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(
    pool: &MySqlPool,
    post: &Post,
    category_ids: &[i64],
    tag_ids: &[i64],
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(post.author_id)
        .bind(post.featured_asset_id)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_id() as i64;

    for category_id in category_ids {
        sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
            .bind(id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link category")?;
    }
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link tag")?;
    }

    tx.commit().await?;

    Ok(Post {
        id,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn update_post_mysql(
    pool: &MySqlPool,
    post: &Post,
    category_ids: Option<&[i64]>,
    tag_ids: Option<&[i64]>,
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(post.author_id)
        .bind(post.featured_asset_id)
        .bind(post.published_at)
        .bind(now)
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(category_ids) = category_ids {
        sqlx::query("DELETE FROM post_categories WHERE post_id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post categories")?;
        for category_id in category_ids {
            sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
                .bind(post.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link category")?;
        }
    }
    if let Some(tag_ids) = tag_ids {
        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post tags")?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link tag")?;
        }
    }

    tx.commit().await?;

    Ok(Post {
        updated_at: now,
        ..post.clone()
    })
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        status: PostStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        featured_asset_id: row.get("featured_asset_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let db = pool.sqlite().unwrap();
        for sql in [
            "INSERT INTO users (id, email, name, password_hash) VALUES (1, 'a@x.io', 'A', 'h')",
            "INSERT INTO users (id, email, name, password_hash) VALUES (2, 'b@x.io', 'B', 'h')",
            "INSERT INTO categories (id, name, slug) VALUES (1, 'News', 'news')",
            "INSERT INTO categories (id, name, slug) VALUES (2, 'Guides', 'guides')",
            "INSERT INTO tags (id, name, slug) VALUES (1, 'Rust', 'rust')",
            "INSERT INTO tags (id, name, slug) VALUES (2, 'Web', 'web')",
        ] {
            sqlx::query(sql).execute(db).await.unwrap();
        }

        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    fn post(title: &str, slug: &str, author_id: i64) -> Post {
        Post::new(title.into(), slug.into(), "body".into(), author_id)
    }

    #[tokio::test]
    async fn test_create_with_links() {
        let (pool, repo) = setup().await;
        let created = repo.create(&post("Hello", "hello", 1), &[1, 2], &[1]).await.unwrap();
        assert!(created.id > 0);

        let row = sqlx::query("SELECT COUNT(*) AS c FROM post_categories WHERE post_id = ?")
            .bind(created.id)
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("c"), 2);

        let fetched = repo.get_by_slug("hello").await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_with_unknown_tag_rolls_back() {
        let (_pool, repo) = setup().await;
        assert!(repo.create(&post("Bad", "bad", 1), &[1], &[77]).await.is_err());
        assert!(repo.get_by_slug("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_links_only_when_given() {
        let (pool, repo) = setup().await;
        let mut created = repo.create(&post("Hello", "hello", 1), &[1], &[1, 2]).await.unwrap();

        created.title = "Hello again".into();
        repo.update(&created, Some(&[2][..]), None).await.unwrap();

        let db = pool.sqlite().unwrap();
        let categories: Vec<i64> = sqlx::query("SELECT category_id FROM post_categories WHERE post_id = ?")
            .bind(created.id)
            .fetch_all(db)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("category_id"))
            .collect();
        assert_eq!(categories, vec![2]);

        let tags = sqlx::query("SELECT COUNT(*) AS c FROM post_tags WHERE post_id = ?")
            .bind(created.id)
            .fetch_one(db)
            .await
            .unwrap();
        assert_eq!(tags.get::<i64, _>("c"), 2);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Hello again");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (_pool, repo) = setup().await;
        let mut published = post("Rust news", "rust-news", 1);
        published.apply_status(PostStatus::Published);
        repo.create(&published, &[1], &[1]).await.unwrap();
        repo.create(&post("Web guide", "web-guide", 2), &[2], &[2]).await.unwrap();
        repo.create(&post("Rust guide", "rust-guide", 2), &[2], &[1]).await.unwrap();

        let params = ListParams::default();

        let (_, total) = repo.list(&PostFilter::default(), &params).await.unwrap();
        assert_eq!(total, 3);

        let filter = PostFilter {
            status: Some(PostStatus::Published),
            ..Default::default()
        };
        let (items, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].published_at.is_some());

        let filter = PostFilter {
            category_id: Some(2),
            tag_id: Some(1),
            ..Default::default()
        };
        let (items, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "rust-guide");

        let filter = PostFilter {
            author_id: Some(2),
            search: Some("web".into()),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter, &params).await.unwrap().1, 1);

        let counts = repo.count_by_status().await.unwrap();
        assert!(counts.contains(&(PostStatus::Draft, 2)));
        assert!(counts.contains(&(PostStatus::Published, 1)));
    }

    #[tokio::test]
    async fn test_delete_removes_links() {
        let (pool, repo) = setup().await;
        let created = repo.create(&post("Gone", "gone", 1), &[1], &[1]).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());

        let row = sqlx::query("SELECT COUNT(*) AS c FROM post_tags")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("c"), 0);
    }
}

//! Fixture loader
//!
//! Replaces every content table with the given data in one transaction.
//! Rows reference each other by natural key (email, role name, slug,
//! filename); ids are resolved while inserting.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Event, Faq, Member, PostStatus, UserStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SeedPermission {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SeedRole {
    pub name: String,
    pub description: Option<String>,
    /// Permission names
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SeedUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub must_change_password: bool,
    /// Role names
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Must refer to a category listed earlier
    pub parent_slug: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SeedTag {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct SeedAsset {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SeedPost {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub status: PostStatus,
    pub author_email: String,
    /// Asset filename
    pub featured_asset: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Everything the seed writes; `id` fields of members, events and FAQs are ignored
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub permissions: Vec<SeedPermission>,
    pub roles: Vec<SeedRole>,
    pub users: Vec<SeedUser>,
    pub categories: Vec<SeedCategory>,
    pub tags: Vec<SeedTag>,
    pub assets: Vec<SeedAsset>,
    pub posts: Vec<SeedPost>,
    pub members: Vec<Member>,
    pub events: Vec<Event>,
    pub faqs: Vec<Faq>,
    pub settings: Vec<(String, String)>,
}

/// Rows written per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub permissions: usize,
    pub roles: usize,
    pub users: usize,
    pub categories: usize,
    pub tags: usize,
    pub assets: usize,
    pub posts: usize,
    pub members: usize,
    pub events: usize,
    pub faqs: usize,
    pub settings: usize,
}

/// Children before parents
pub const DELETE_ORDER: &[&str] = &[
    "post_categories",
    "post_tags",
    "sessions",
    "posts",
    "assets",
    "events",
    "faqs",
    "members",
    "tags",
    "categories",
    "user_roles",
    "role_permissions",
    "users",
    "roles",
    "permissions",
    "settings",
];

#[async_trait]
pub trait SeedRepository: Send + Sync {
    /// Wipe all fixture tables and insert `data`. Nothing is written on error.
    async fn reseed(&self, data: &SeedData) -> Result<SeedSummary>;
}

pub struct SqlxSeedRepository {
    pool: DynDatabasePool,
}

impl SqlxSeedRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SeedRepository> {
        Arc::new(Self::new(pool))
    }
}

fn lookup(map: &HashMap<String, i64>, kind: &str, key: &str) -> Result<i64> {
    map.get(key)
        .copied()
        .ok_or_else(|| anyhow!("Seed references unknown {} '{}'", kind, key))
}

// Same statements for both drivers, only the insert-id accessor differs.
macro_rules! reseed_in_tx {
    ($pool:expr, $data:expr, $last_id:expr) => {{
        let data: &SeedData = $data;
        let now = Utc::now();
        let mut summary = SeedSummary::default();
        let mut tx = $pool.begin().await?;

        sqlx::query("UPDATE categories SET parent_id = NULL")
            .execute(&mut *tx)
            .await
            .context("Failed to detach categories")?;
        for table in DELETE_ORDER {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }

        let mut permission_ids = HashMap::new();
        for permission in &data.permissions {
            let result = sqlx::query(
                "INSERT INTO permissions (name, description, created_at) VALUES (?, ?, ?)",
            )
            .bind(&permission.name)
            .bind(&permission.description)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed permission {}", permission.name))?;
            permission_ids.insert(permission.name.clone(), ($last_id)(result));
        }
        summary.permissions = permission_ids.len();

        let mut role_ids = HashMap::new();
        for role in &data.roles {
            let result = sqlx::query(
                "INSERT INTO roles (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&role.name)
            .bind(&role.description)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed role {}", role.name))?;
            let role_id = ($last_id)(result);
            for name in &role.permissions {
                sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                    .bind(role_id)
                    .bind(lookup(&permission_ids, "permission", name)?)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to seed role permission")?;
            }
            role_ids.insert(role.name.clone(), role_id);
        }
        summary.roles = role_ids.len();

        let mut user_ids = HashMap::new();
        for user in &data.users {
            let result = sqlx::query(
                "INSERT INTO users (email, name, password_hash, status, must_change_password, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.status.as_str())
            .bind(user.must_change_password)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed user {}", user.email))?;
            let user_id = ($last_id)(result);
            for name in &user.roles {
                sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(lookup(&role_ids, "role", name)?)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to seed user role")?;
            }
            user_ids.insert(user.email.clone(), user_id);
        }
        summary.users = user_ids.len();

        let mut category_ids = HashMap::new();
        for category in &data.categories {
            let parent_id = match &category.parent_slug {
                Some(slug) => Some(lookup(&category_ids, "category", slug)?),
                None => None,
            };
            let result = sqlx::query(
                "INSERT INTO categories (name, slug, description, parent_id, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(parent_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed category {}", category.slug))?;
            category_ids.insert(category.slug.clone(), ($last_id)(result));
        }
        summary.categories = category_ids.len();

        let mut tag_ids = HashMap::new();
        for tag in &data.tags {
            let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(now)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to seed tag {}", tag.slug))?;
            tag_ids.insert(tag.slug.clone(), ($last_id)(result));
        }
        summary.tags = tag_ids.len();

        let mut asset_ids = HashMap::new();
        for asset in &data.assets {
            let uploaded_by = match &asset.uploaded_by {
                Some(email) => Some(lookup(&user_ids, "user", email)?),
                None => None,
            };
            let result = sqlx::query(
                "INSERT INTO assets (filename, original_name, url, mime_type, size_bytes, \
                 alt_text, uploaded_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&asset.filename)
            .bind(&asset.original_name)
            .bind(&asset.url)
            .bind(&asset.mime_type)
            .bind(asset.size_bytes)
            .bind(&asset.alt_text)
            .bind(uploaded_by)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed asset {}", asset.filename))?;
            asset_ids.insert(asset.filename.clone(), ($last_id)(result));
        }
        summary.assets = asset_ids.len();

        for post in &data.posts {
            let featured = match &post.featured_asset {
                Some(filename) => Some(lookup(&asset_ids, "asset", filename)?),
                None => None,
            };
            let published_at = (post.status == PostStatus::Published).then_some(now);
            let result = sqlx::query(
                "INSERT INTO posts (title, slug, excerpt, content, status, author_id, \
                 featured_asset_id, published_at, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(post.status.as_str())
            .bind(lookup(&user_ids, "user", &post.author_email)?)
            .bind(featured)
            .bind(published_at)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed post {}", post.slug))?;
            let post_id = ($last_id)(result);

            for slug in &post.categories {
                sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(lookup(&category_ids, "category", slug)?)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to seed post category")?;
            }
            for slug in &post.tags {
                sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(lookup(&tag_ids, "tag", slug)?)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to seed post tag")?;
            }
            summary.posts += 1;
        }

        for member in &data.members {
            sqlx::query(
                "INSERT INTO members (name, position, bio, email, photo_url, sort_order, \
                 is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&member.name)
            .bind(&member.position)
            .bind(&member.bio)
            .bind(&member.email)
            .bind(&member.photo_url)
            .bind(member.sort_order)
            .bind(member.is_active)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed member {}", member.name))?;
            summary.members += 1;
        }

        for event in &data.events {
            sqlx::query(
                "INSERT INTO events (title, slug, description, location, starts_at, ends_at, \
                 status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.title)
            .bind(&event.slug)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.status.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed event {}", event.slug))?;
            summary.events += 1;
        }

        for faq in &data.faqs {
            sqlx::query(
                "INSERT INTO faqs (question, answer, category, sort_order, is_published, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&faq.question)
            .bind(&faq.answer)
            .bind(&faq.category)
            .bind(faq.sort_order)
            .bind(faq.is_published)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to seed FAQ")?;
            summary.faqs += 1;
        }

        for (key, value) in &data.settings {
            sqlx::query(
                "INSERT INTO settings (setting_key, setting_value, updated_at) VALUES (?, ?, ?)",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed setting {}", key))?;
            summary.settings += 1;
        }

        tx.commit().await.context("Failed to commit seed")?;
        Ok(summary)
    }};
}

#[async_trait]
impl SeedRepository for SqlxSeedRepository {
    async fn reseed(&self, data: &SeedData) -> Result<SeedSummary> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => reseed_in_tx!(
                self.pool.sqlite()?,
                data,
                |r: sqlx::sqlite::SqliteQueryResult| r.last_insert_rowid()
            ),
            DatabaseDriver::Mysql => reseed_in_tx!(
                self.pool.mysql()?,
                data,
                |r: sqlx::mysql::MySqlQueryResult| r.last_insert_id() as i64
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::EventStatus;
    use sqlx::Row;

    async fn setup() -> (DynDatabasePool, SqlxSeedRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSeedRepository::new(pool.clone());
        (pool, repo)
    }

    async fn count(pool: &DynDatabasePool, table: &str) -> i64 {
        sqlx::query(&format!("SELECT COUNT(*) AS c FROM {}", table))
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap()
            .get("c")
    }

    fn small_data() -> SeedData {
        let now = Utc::now();
        SeedData {
            permissions: vec![SeedPermission {
                name: "posts:read".into(),
                description: None,
            }],
            roles: vec![SeedRole {
                name: "editor".into(),
                description: None,
                permissions: vec!["posts:read".into()],
            }],
            users: vec![SeedUser {
                email: "ed@example.com".into(),
                name: "Ed".into(),
                password_hash: "hash".into(),
                status: UserStatus::Active,
                must_change_password: false,
                roles: vec!["editor".into()],
            }],
            categories: vec![
                SeedCategory {
                    name: "News".into(),
                    slug: "news".into(),
                    description: None,
                    parent_slug: None,
                },
                SeedCategory {
                    name: "Releases".into(),
                    slug: "releases".into(),
                    description: None,
                    parent_slug: Some("news".into()),
                },
            ],
            tags: vec![SeedTag {
                name: "Rust".into(),
                slug: "rust".into(),
            }],
            assets: vec![SeedAsset {
                filename: "cover.png".into(),
                original_name: "cover.png".into(),
                url: "/uploads/cover.png".into(),
                mime_type: "image/png".into(),
                size_bytes: 42,
                alt_text: None,
                uploaded_by: Some("ed@example.com".into()),
            }],
            posts: vec![SeedPost {
                title: "Hello".into(),
                slug: "hello".into(),
                excerpt: None,
                content: "World".into(),
                status: PostStatus::Published,
                author_email: "ed@example.com".into(),
                featured_asset: Some("cover.png".into()),
                categories: vec!["releases".into()],
                tags: vec!["rust".into()],
            }],
            members: vec![],
            events: vec![Event {
                id: 0,
                title: "Launch".into(),
                slug: "launch".into(),
                description: None,
                location: None,
                starts_at: now,
                ends_at: None,
                status: EventStatus::Published,
                created_at: now,
                updated_at: now,
            }],
            faqs: vec![],
            settings: vec![("site_name".into(), "Seeded".into())],
        }
    }

    #[tokio::test]
    async fn test_reseed_writes_everything() {
        let (pool, repo) = setup().await;
        let summary = repo.reseed(&small_data()).await.unwrap();

        assert_eq!(summary.users, 1);
        assert_eq!(summary.categories, 2);
        assert_eq!(summary.posts, 1);
        assert_eq!(summary.settings, 1);
        assert_eq!(count(&pool, "post_categories").await, 1);
        assert_eq!(count(&pool, "role_permissions").await, 1);

        let row = sqlx::query("SELECT published_at FROM posts WHERE slug = 'hello'")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        let published: Option<chrono::DateTime<Utc>> = row.get("published_at");
        assert!(published.is_some());
    }

    #[tokio::test]
    async fn test_reseed_is_repeatable() {
        let (pool, repo) = setup().await;
        repo.reseed(&small_data()).await.unwrap();
        repo.reseed(&small_data()).await.unwrap();

        assert_eq!(count(&pool, "users").await, 1);
        assert_eq!(count(&pool, "categories").await, 2);
        assert_eq!(count(&pool, "settings").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_reference_rolls_back() {
        let (pool, repo) = setup().await;
        repo.reseed(&small_data()).await.unwrap();

        let mut broken = small_data();
        broken.posts[0].tags = vec!["missing".into()];
        let err = repo.reseed(&broken).await.unwrap_err();
        assert!(err.to_string().contains("missing"));

        // Previous data survives untouched
        assert_eq!(count(&pool, "posts").await, 1);
        assert_eq!(count(&pool, "events").await, 1);
    }
}

//! Aggregate counts for the dashboard

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;

/// Row counts of the content tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub users: i64,
    pub posts: i64,
    pub categories: i64,
    pub tags: i64,
    pub assets: i64,
    pub members: i64,
    pub events: i64,
    pub upcoming_events: i64,
    pub faqs: i64,
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn table_counts(&self) -> Result<TableCounts>;
}

pub struct SqlxDashboardRepository {
    pool: DynDatabasePool,
}

impl SqlxDashboardRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DashboardRepository> {
        Arc::new(Self::new(pool))
    }
}

// One round trip; scalar subqueries work on both drivers
const COUNTS_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM users) AS users,
        (SELECT COUNT(*) FROM posts) AS posts,
        (SELECT COUNT(*) FROM categories) AS categories,
        (SELECT COUNT(*) FROM tags) AS tags,
        (SELECT COUNT(*) FROM assets) AS assets,
        (SELECT COUNT(*) FROM members) AS members,
        (SELECT COUNT(*) FROM events) AS events,
        (SELECT COUNT(*) FROM events WHERE starts_at >= ?) AS upcoming_events,
        (SELECT COUNT(*) FROM faqs) AS faqs
"#;

macro_rules! row_to_counts {
    ($row:expr) => {
        TableCounts {
            users: $row.get("users"),
            posts: $row.get("posts"),
            categories: $row.get("categories"),
            tags: $row.get("tags"),
            assets: $row.get("assets"),
            members: $row.get("members"),
            events: $row.get("events"),
            upcoming_events: $row.get("upcoming_events"),
            faqs: $row.get("faqs"),
        }
    };
}

#[async_trait]
impl DashboardRepository for SqlxDashboardRepository {
    async fn table_counts(&self) -> Result<TableCounts> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(COUNTS_SQL)
                    .bind(now)
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to load dashboard counts")?;
                Ok(row_to_counts!(row))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(COUNTS_SQL)
                    .bind(now)
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to load dashboard counts")?;
                Ok(row_to_counts!(row))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_counts() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxDashboardRepository::new(pool.clone());

        assert_eq!(repo.table_counts().await.unwrap(), TableCounts::default());

        let db = pool.sqlite().unwrap();
        for sql in [
            "INSERT INTO users (email, name, password_hash) VALUES ('a@x.io', 'A', 'h')",
            "INSERT INTO tags (name, slug) VALUES ('Rust', 'rust')",
            "INSERT INTO tags (name, slug) VALUES ('Go', 'go')",
            "INSERT INTO faqs (question, answer) VALUES ('Q', 'A')",
            "INSERT INTO events (title, slug, starts_at) VALUES ('Old', 'old', '2000-01-01T00:00:00Z')",
        ] {
            sqlx::query(sql).execute(db).await.unwrap();
        }

        let counts = repo.table_counts().await.unwrap();
        assert_eq!(counts.users, 1);
        assert_eq!(counts.tags, 2);
        assert_eq!(counts.faqs, 1);
        assert_eq!(counts.events, 1);
        assert_eq!(counts.upcoming_events, 0);
    }
}

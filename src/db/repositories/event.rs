//! Event repository

use super::query::{bind_mysql, bind_sqlite, BindValue, WhereClause};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Event, EventFilter, EventStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Event>>;

    /// Ordered by start time, earliest first
    async fn list(&self, filter: &EventFilter, params: &ListParams) -> Result<(Vec<Event>, i64)>;

    async fn update(&self, event: &Event) -> Result<Event>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Events starting at or after now
    async fn count_upcoming(&self) -> Result<i64>;
}

pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

const EVENT_COLUMNS: &str =
    "id, title, slug, description, location, starts_at, ends_at, status, created_at, updated_at";

const INSERT_EVENT: &str = r#"
    INSERT INTO events (title, slug, description, location, starts_at, ends_at, status,
                        created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_EVENT: &str = r#"
    UPDATE events
    SET title = ?, slug = ?, description = ?, location = ?, starts_at = ?, ends_at = ?,
        status = ?, updated_at = ?
    WHERE id = ?
"#;

macro_rules! row_to_event {
    ($row:expr) => {{
        let status: String = $row.get("status");
        Ok::<_, anyhow::Error>(Event {
            id: $row.get("id"),
            title: $row.get("title"),
            slug: $row.get("slug"),
            description: $row.get("description"),
            location: $row.get("location"),
            starts_at: $row.get("starts_at"),
            ends_at: $row.get("ends_at"),
            status: EventStatus::from_str(&status)?,
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        })
    }};
}

impl SqlxEventRepository {
    async fn find_one(&self, column: &str, value: BindValue) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE {} = ?", EVENT_COLUMNS, column);
        let binds = [value];
        match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &binds)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get event")?
                .map(|r| row_to_event!(r))
                .transpose(),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &binds)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get event")?
                .map(|r| row_to_event!(r))
                .transpose(),
        }
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &Event) -> Result<Event> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_EVENT)
                .bind(&event.title)
                .bind(&event.slug)
                .bind(&event.description)
                .bind(&event.location)
                .bind(event.starts_at)
                .bind(event.ends_at)
                .bind(event.status.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create event")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_EVENT)
                .bind(&event.title)
                .bind(&event.slug)
                .bind(&event.description)
                .bind(&event.location)
                .bind(event.starts_at)
                .bind(event.ends_at)
                .bind(event.status.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create event")?
                .last_insert_id() as i64,
        };

        Ok(Event {
            id,
            created_at: now,
            updated_at: now,
            ..event.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>> {
        self.find_one("id", BindValue::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        self.find_one("slug", BindValue::Text(slug.to_string())).await
    }

    async fn list(&self, filter: &EventFilter, params: &ListParams) -> Result<(Vec<Event>, i64)> {
        let mut clause = WhereClause::new();
        if let Some(status) = filter.status {
            clause.push("status = ?", BindValue::Text(status.as_str().to_string()));
        }
        if filter.upcoming {
            clause.push("starts_at >= ?", BindValue::Timestamp(Utc::now()));
        }

        let count_sql = format!("SELECT COUNT(*) AS count FROM events{}", clause.sql());
        let list_sql = format!(
            "SELECT {} FROM events{} ORDER BY starts_at ASC, id ASC LIMIT ? OFFSET ?",
            EVENT_COLUMNS,
            clause.sql()
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let total: i64 = bind_sqlite(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count events")?
                    .get("count");
                let rows = bind_sqlite(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list events")?;
                let events = rows
                    .iter()
                    .map(|r| row_to_event!(r))
                    .collect::<Result<Vec<_>>>()?;
                Ok((events, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let total: i64 = bind_mysql(sqlx::query(&count_sql), clause.binds())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count events")?
                    .get("count");
                let rows = bind_mysql(sqlx::query(&list_sql), clause.binds())
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list events")?;
                let events = rows
                    .iter()
                    .map(|r| row_to_event!(r))
                    .collect::<Result<Vec<_>>>()?;
                Ok((events, total))
            }
        }
    }

    async fn update(&self, event: &Event) -> Result<Event> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_EVENT)
                    .bind(&event.title)
                    .bind(&event.slug)
                    .bind(&event.description)
                    .bind(&event.location)
                    .bind(event.starts_at)
                    .bind(event.ends_at)
                    .bind(event.status.as_str())
                    .bind(now)
                    .bind(event.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update event")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_EVENT)
                    .bind(&event.title)
                    .bind(&event.slug)
                    .bind(&event.description)
                    .bind(&event.location)
                    .bind(event.starts_at)
                    .bind(event.ends_at)
                    .bind(event.status.as_str())
                    .bind(now)
                    .bind(event.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update event")?;
            }
        }

        Ok(Event {
            updated_at: now,
            ..event.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM events WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_upcoming(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM events WHERE starts_at >= ?";
        let now = Utc::now();
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count upcoming events")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count upcoming events")?
                .get("count"),
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{DateTime, Duration};

    async fn setup_test_repo() -> SqlxEventRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxEventRepository::new(pool)
    }

    fn event(slug: &str, starts_at: DateTime<Utc>, status: EventStatus) -> Event {
        Event {
            id: 0,
            title: slug.to_uppercase(),
            slug: slug.into(),
            description: None,
            location: Some("Main hall".into()),
            starts_at,
            ends_at: Some(starts_at + Duration::hours(2)),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let repo = setup_test_repo().await;
        let start = Utc::now() + Duration::days(3);
        let created = repo.create(&event("launch", start, EventStatus::Draft)).await.unwrap();

        let fetched = repo.get_by_slug("launch").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.location.as_deref(), Some("Main hall"));
        assert!(fetched.has_valid_range());
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let repo = setup_test_repo().await;
        let now = Utc::now();
        repo.create(&event("past", now - Duration::days(10), EventStatus::Published))
            .await
            .unwrap();
        repo.create(&event("later", now + Duration::days(20), EventStatus::Published))
            .await
            .unwrap();
        repo.create(&event("soon", now + Duration::days(2), EventStatus::Cancelled))
            .await
            .unwrap();

        let params = ListParams::default();
        let (all, total) = repo.list(&EventFilter::default(), &params).await.unwrap();
        assert_eq!(total, 3);
        let slugs: Vec<&str> = all.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["past", "soon", "later"]);

        let filter = EventFilter {
            status: Some(EventStatus::Published),
            upcoming: true,
        };
        let (items, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].slug, "later");

        assert_eq!(repo.count_upcoming().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo
            .create(&event("meetup", Utc::now(), EventStatus::Draft))
            .await
            .unwrap();
        created.status = EventStatus::Cancelled;
        repo.update(&created).await.unwrap();
        assert_eq!(
            repo.get_by_id(created.id).await.unwrap().unwrap().status,
            EventStatus::Cancelled
        );
        assert!(repo.delete(created.id).await.unwrap());
    }
}

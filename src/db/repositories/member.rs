//! Team member repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Member, MemberFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: &Member) -> Result<Member>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Member>>;

    /// Ordered by `sort_order`, then name
    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>>;

    async fn update(&self, member: &Member) -> Result<Member>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxMemberRepository {
    pool: DynDatabasePool,
}

impl SqlxMemberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MemberRepository> {
        Arc::new(Self::new(pool))
    }
}

const MEMBER_COLUMNS: &str = "id, name, position, bio, email, photo_url, sort_order, is_active, \
     created_at, updated_at";

const INSERT_MEMBER: &str = r#"
    INSERT INTO members (name, position, bio, email, photo_url, sort_order, is_active,
                         created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_MEMBER: &str = r#"
    UPDATE members
    SET name = ?, position = ?, bio = ?, email = ?, photo_url = ?, sort_order = ?,
        is_active = ?, updated_at = ?
    WHERE id = ?
"#;

macro_rules! row_to_member {
    ($row:expr) => {
        Member {
            id: $row.get("id"),
            name: $row.get("name"),
            position: $row.get("position"),
            bio: $row.get("bio"),
            email: $row.get("email"),
            photo_url: $row.get("photo_url"),
            sort_order: $row.get("sort_order"),
            is_active: $row.get("is_active"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl MemberRepository for SqlxMemberRepository {
    async fn create(&self, member: &Member) -> Result<Member> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_MEMBER)
                .bind(&member.name)
                .bind(&member.position)
                .bind(&member.bio)
                .bind(&member.email)
                .bind(&member.photo_url)
                .bind(member.sort_order)
                .bind(member.is_active)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create member")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_MEMBER)
                .bind(&member.name)
                .bind(&member.position)
                .bind(&member.bio)
                .bind(&member.email)
                .bind(&member.photo_url)
                .bind(member.sort_order)
                .bind(member.is_active)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create member")?
                .last_insert_id() as i64,
        };

        Ok(Member {
            id,
            created_at: now,
            updated_at: now,
            ..member.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get member")?
                .map(|r| row_to_member!(r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get member")?
                .map(|r| row_to_member!(r))),
        }
    }

    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        let sql = match filter.active {
            Some(_) => format!(
                "SELECT {} FROM members WHERE is_active = ? ORDER BY sort_order, name",
                MEMBER_COLUMNS
            ),
            None => format!("SELECT {} FROM members ORDER BY sort_order, name", MEMBER_COLUMNS),
        };

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(active) = filter.active {
                    query = query.bind(active);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list members")?;
                Ok(rows.iter().map(|r| row_to_member!(r)).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(active) = filter.active {
                    query = query.bind(active);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list members")?;
                Ok(rows.iter().map(|r| row_to_member!(r)).collect())
            }
        }
    }

    async fn update(&self, member: &Member) -> Result<Member> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_MEMBER)
                    .bind(&member.name)
                    .bind(&member.position)
                    .bind(&member.bio)
                    .bind(&member.email)
                    .bind(&member.photo_url)
                    .bind(member.sort_order)
                    .bind(member.is_active)
                    .bind(now)
                    .bind(member.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update member")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_MEMBER)
                    .bind(&member.name)
                    .bind(&member.position)
                    .bind(&member.bio)
                    .bind(&member.email)
                    .bind(&member.photo_url)
                    .bind(member.sort_order)
                    .bind(member.is_active)
                    .bind(now)
                    .bind(member.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update member")?;
            }
        }

        Ok(Member {
            updated_at: now,
            ..member.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM members WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete member")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete member")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM members";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count members")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count members")?
                .get("count"),
        };
        Ok(count)
    }
}

//! FAQ repository

use super::query::{bind_mysql, bind_sqlite, BindValue, WhereClause};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Faq, FaqFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait FaqRepository: Send + Sync {
    async fn create(&self, faq: &Faq) -> Result<Faq>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Faq>>;

    /// Ordered by `sort_order`, then id
    async fn list(&self, filter: &FaqFilter) -> Result<Vec<Faq>>;

    async fn update(&self, faq: &Faq) -> Result<Faq>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Distinct non-empty category labels
    async fn list_categories(&self) -> Result<Vec<String>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxFaqRepository {
    pool: DynDatabasePool,
}

impl SqlxFaqRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FaqRepository> {
        Arc::new(Self::new(pool))
    }
}

const FAQ_COLUMNS: &str =
    "id, question, answer, category, sort_order, is_published, created_at, updated_at";

const INSERT_FAQ: &str = r#"
    INSERT INTO faqs (question, answer, category, sort_order, is_published, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_FAQ: &str = r#"
    UPDATE faqs
    SET question = ?, answer = ?, category = ?, sort_order = ?, is_published = ?, updated_at = ?
    WHERE id = ?
"#;

macro_rules! row_to_faq {
    ($row:expr) => {
        Faq {
            id: $row.get("id"),
            question: $row.get("question"),
            answer: $row.get("answer"),
            category: $row.get("category"),
            sort_order: $row.get("sort_order"),
            is_published: $row.get("is_published"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl FaqRepository for SqlxFaqRepository {
    async fn create(&self, faq: &Faq) -> Result<Faq> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_FAQ)
                .bind(&faq.question)
                .bind(&faq.answer)
                .bind(&faq.category)
                .bind(faq.sort_order)
                .bind(faq.is_published)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create FAQ")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_FAQ)
                .bind(&faq.question)
                .bind(&faq.answer)
                .bind(&faq.category)
                .bind(faq.sort_order)
                .bind(faq.is_published)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create FAQ")?
                .last_insert_id() as i64,
        };

        Ok(Faq {
            id,
            created_at: now,
            updated_at: now,
            ..faq.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Faq>> {
        let sql = format!("SELECT {} FROM faqs WHERE id = ?", FAQ_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get FAQ")?
                .map(|r| row_to_faq!(r))),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get FAQ")?
                .map(|r| row_to_faq!(r))),
        }
    }

    async fn list(&self, filter: &FaqFilter) -> Result<Vec<Faq>> {
        let mut clause = WhereClause::new();
        if let Some(published) = filter.published {
            clause.push("is_published = ?", BindValue::Bool(published));
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            clause.push("category = ?", BindValue::Text(category.to_string()));
        }
        let sql = format!(
            "SELECT {} FROM faqs{} ORDER BY sort_order ASC, id ASC",
            FAQ_COLUMNS,
            clause.sql()
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_sqlite(sqlx::query(&sql), clause.binds())
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list FAQs")?;
                Ok(rows.iter().map(|r| row_to_faq!(r)).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = bind_mysql(sqlx::query(&sql), clause.binds())
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list FAQs")?;
                Ok(rows.iter().map(|r| row_to_faq!(r)).collect())
            }
        }
    }

    async fn update(&self, faq: &Faq) -> Result<Faq> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_FAQ)
                    .bind(&faq.question)
                    .bind(&faq.answer)
                    .bind(&faq.category)
                    .bind(faq.sort_order)
                    .bind(faq.is_published)
                    .bind(now)
                    .bind(faq.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update FAQ")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_FAQ)
                    .bind(&faq.question)
                    .bind(&faq.answer)
                    .bind(&faq.category)
                    .bind(faq.sort_order)
                    .bind(faq.is_published)
                    .bind(now)
                    .bind(faq.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update FAQ")?;
            }
        }

        Ok(Faq {
            updated_at: now,
            ..faq.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM faqs WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete FAQ")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete FAQ")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        let sql = "SELECT DISTINCT category FROM faqs \
                   WHERE category IS NOT NULL AND category <> '' ORDER BY category";
        let categories: Vec<String> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list FAQ categories")?
                .iter()
                .map(|r| r.get("category"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list FAQ categories")?
                .iter()
                .map(|r| r.get("category"))
                .collect(),
        };
        Ok(categories)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM faqs";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count FAQs")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count FAQs")?
                .get("count"),
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateFaqInput, UpdateFaqInput};

    async fn setup_test_repo() -> SqlxFaqRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxFaqRepository::new(pool)
    }

    fn faq(question: &str, category: Option<&str>, sort_order: i32, published: bool) -> Faq {
        Faq::from_input(CreateFaqInput {
            question: question.into(),
            answer: "Yes.".into(),
            category: category.map(String::from),
            sort_order,
            is_published: published,
        })
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let repo = setup_test_repo().await;
        repo.create(&faq("Second?", Some("billing"), 2, true)).await.unwrap();
        repo.create(&faq("First?", Some("billing"), 1, true)).await.unwrap();
        repo.create(&faq("Hidden?", Some("account"), 0, false)).await.unwrap();

        let all = repo.list(&FaqFilter::default()).await.unwrap();
        assert_eq!(all[0].question, "Hidden?");

        let filter = FaqFilter {
            published: Some(true),
            category: Some("billing".into()),
        };
        let questions: Vec<String> = repo
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.question)
            .collect();
        assert_eq!(questions, vec!["First?", "Second?"]);

        assert_eq!(repo.list_categories().await.unwrap(), vec!["account", "billing"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&faq("Q?", None, 0, false)).await.unwrap();
        created.apply(UpdateFaqInput {
            is_published: Some(true),
            answer: Some("No.".into()),
            ..Default::default()
        });
        repo.update(&created).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(fetched.is_published);
        assert_eq!(fetched.answer, "No.");

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}

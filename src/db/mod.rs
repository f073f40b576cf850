//! Database layer
//!
//! SQLite (default) or MySQL, chosen by `database.driver` in the config.
//! Repositories only see the `DatabasePool` trait and pick their dialect
//! from `driver()`.
//!
//! ```ignore
//! use cms_admin::config::DatabaseConfig;
//! use cms_admin::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

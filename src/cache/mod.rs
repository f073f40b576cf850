//! Cache layer
//!
//! Read-mostly data (site settings, category and tag listings) is cached
//! in process with moka. Writers invalidate by key or by glob pattern.
//!
//! ```rust,ignore
//! use cms_admin::cache::{create_cache, CacheLayer};
//!
//! let cache = create_cache(&config.cache);
//! cache.set("settings:site", &settings, cache.default_ttl()).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache operations shared by every cache backend.
///
/// The methods are generic, so callers hold a concrete cache
/// (`Arc<MemoryCache>`) rather than a trait object.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Shared cache handle
pub type SharedCache = Arc<MemoryCache>;

/// Build the cache described by configuration.
pub fn create_cache(config: &CacheConfig) -> SharedCache {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    tracing::debug!("Using in-memory cache (ttl {:?})", ttl);
    Arc::new(MemoryCache::with_capacity_and_ttl(
        memory::DEFAULT_MAX_CAPACITY,
        ttl,
    ))
}

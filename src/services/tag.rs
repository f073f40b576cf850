//! Tag service
//!
//! Flat tags with usage counts. The counted list is cached.

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::TagRepository;
use crate::models::{CreateTagInput, Tag, TagWithCount, UpdateTagInput};
use crate::services::slug::slug_or_derive;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use std::sync::Arc;

const CACHE_KEY_LIST: &str = "tag:list";
const CACHE_PATTERN: &str = "tag:*";

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: SharedCache,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Tags with post counts, most used first
    pub async fn list(&self) -> ServiceResult<Vec<TagWithCount>> {
        if let Some(list) = self
            .cache
            .get::<Vec<TagWithCount>>(CACHE_KEY_LIST)
            .await
            .ok()
            .flatten()
        {
            return Ok(list);
        }

        let list = self.repo.list_with_counts().await?;
        let _ = self
            .cache
            .set(CACHE_KEY_LIST, &list, self.cache.default_ttl())
            .await;
        Ok(list)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Tag> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tag"))
    }

    pub async fn create(&self, input: CreateTagInput) -> ServiceResult<Tag> {
        let name = validate_name(&input.name)?;
        if self.repo.get_by_name(&name).await?.is_some() {
            return Err(ServiceError::conflict(format!("Tag '{}' already exists", name)));
        }
        let slug = slug_or_derive(input.slug.as_deref(), &name)?;
        self.ensure_slug_free(&slug, None).await?;

        let created = self.repo.create(&Tag::new(name, slug)).await?;
        self.invalidate().await;
        Ok(created)
    }

    /// Return the tag with this name, creating it when missing
    pub async fn get_or_create(&self, name: &str) -> ServiceResult<Tag> {
        let name = validate_name(name)?;
        if let Some(tag) = self.repo.get_by_name(&name).await? {
            return Ok(tag);
        }
        self.create(CreateTagInput { name, slug: None }).await
    }

    pub async fn update(&self, id: i64, input: UpdateTagInput) -> ServiceResult<Tag> {
        let mut tag = self.get(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if name != tag.name {
                if let Some(other) = self.repo.get_by_name(&name).await? {
                    if other.id != id {
                        return Err(ServiceError::conflict(format!(
                            "Tag '{}' already exists",
                            name
                        )));
                    }
                }
                tag.name = name;
            }
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_derive(Some(&slug), &tag.name)?;
            if slug != tag.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                tag.slug = slug;
            }
        }

        let updated = self.repo.update(&tag).await?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("Tag"));
        }
        self.invalidate().await;
        Ok(())
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<i64>) -> ServiceResult<()> {
        match self.repo.get_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != except_id => Err(ServiceError::conflict(
                format!("Tag slug '{}' already exists", slug),
            )),
            _ => Ok(()),
        }
    }

    async fn invalidate(&self) {
        let _ = self.cache.delete_pattern(CACHE_PATTERN).await;
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    require_non_empty("Tag name", name)?;
    require_max_len("Tag name", name, 50)?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> TagService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        TagService::new(
            SqlxTagRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    fn input(name: &str) -> CreateTagInput {
        CreateTagInput {
            name: name.into(),
            slug: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let service = setup().await;
        let tag = service.create(input("  Web Dev ")).await.unwrap();
        assert_eq!(tag.name, "Web Dev");
        assert_eq!(tag.slug, "web-dev");

        let err = service.create(input("Web Dev")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = service.create(input("web dev")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_or_create_reuses() {
        let service = setup().await;
        let first = service.get_or_create("Rust").await.unwrap();
        let second = service.get_or_create("Rust").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_refresh_list() {
        let service = setup().await;
        let tag = service.create(input("Old")).await.unwrap();
        assert_eq!(service.list().await.unwrap()[0].tag.name, "Old");

        service
            .update(
                tag.id,
                UpdateTagInput {
                    name: Some("New".into()),
                    slug: Some("new".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(service.list().await.unwrap()[0].tag.slug, "new");

        service.delete(tag.id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(matches!(
            service.get(tag.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let service = setup().await;
        let err = service.create(input("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_empty_slug() {
        let service = setup().await;
        let tag = service.create(input("Rust")).await.unwrap();

        let err = service
            .update(
                tag.id,
                UpdateTagInput {
                    name: None,
                    slug: Some("---".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(service.get(tag.id).await.unwrap().slug, "rust");
    }
}

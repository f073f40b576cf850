//! Category service
//!
//! Hierarchical categories. Listings and the tree are cached and dropped
//! on every write.

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::CategoryRepository;
use crate::models::{
    Category, CategoryTree, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput,
};
use crate::services::slug::slug_or_derive;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use std::collections::HashMap;
use std::sync::Arc;

const CACHE_KEY_LIST: &str = "category:list";
const CACHE_KEY_TREE: &str = "category:tree";
const CACHE_PATTERN: &str = "category:*";

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: SharedCache,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// All categories with post counts, ordered by name
    pub async fn list(&self) -> ServiceResult<Vec<CategoryWithCount>> {
        if let Some(list) = self
            .cache
            .get::<Vec<CategoryWithCount>>(CACHE_KEY_LIST)
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

    /// Categories nested under their parents
    pub async fn tree(&self) -> ServiceResult<Vec<CategoryTree>> {
        if let Some(tree) = self
            .cache
            .get::<Vec<CategoryTree>>(CACHE_KEY_TREE)
            .await
            .ok()
            .flatten()
        {
            return Ok(tree);
        }

        let tree = CategoryTree::build(self.repo.list().await?);
        let _ = self
            .cache
            .set(CACHE_KEY_TREE, &tree, self.cache.default_ttl())
            .await;
        Ok(tree)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Category> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Option<Category>> {
        Ok(self.repo.get_by_slug(slug).await?)
    }

    pub async fn create(&self, input: CreateCategoryInput) -> ServiceResult<Category> {
        validate_name(&input.name)?;
        let slug = slug_or_derive(input.slug.as_deref(), &input.name)?;
        self.ensure_slug_free(&slug, None).await?;

        if let Some(parent_id) = input.parent_id {
            if self.repo.get_by_id(parent_id).await?.is_none() {
                return Err(ServiceError::validation(format!(
                    "Parent category {} does not exist",
                    parent_id
                )));
            }
        }

        let category = Category::new(
            input.name.trim().to_string(),
            slug,
            input.description,
            input.parent_id,
        );
        let created = self.repo.create(&category).await?;
        self.invalidate().await;
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> ServiceResult<Category> {
        let mut category = self.get(id).await?;

        if let Some(name) = input.name {
            validate_name(&name)?;
            category.name = name.trim().to_string();
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_derive(Some(&slug), &category.name)?;
            if slug != category.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                category.slug = slug;
            }
        }
        if input.description.is_some() {
            category.description = input.description;
        }
        if input.clear_parent {
            category.parent_id = None;
        } else if let Some(parent_id) = input.parent_id {
            self.check_parent(id, parent_id).await?;
            category.parent_id = Some(parent_id);
        }

        let updated = self.repo.update(&category).await?;
        self.invalidate().await;
        Ok(updated)
    }

    /// Delete a category. Children become roots and post links are removed.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("Category"));
        }
        self.invalidate().await;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// Parent must exist and must not be the category or one of its descendants
    async fn check_parent(&self, id: i64, parent_id: i64) -> ServiceResult<()> {
        if parent_id == id {
            return Err(ServiceError::validation("A category cannot be its own parent"));
        }
        let parents: HashMap<i64, Option<i64>> = self
            .repo
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c.parent_id))
            .collect();

        if !parents.contains_key(&parent_id) {
            return Err(ServiceError::validation(format!(
                "Parent category {} does not exist",
                parent_id
            )));
        }

        let mut current = Some(parent_id);
        let mut steps = 0;
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(ServiceError::validation(
                    "A category cannot be moved under its own descendant",
                ));
            }
            steps += 1;
            if steps > parents.len() {
                break;
            }
            current = parents.get(&ancestor).copied().flatten();
        }
        Ok(())
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<i64>) -> ServiceResult<()> {
        match self.repo.get_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != except_id => Err(ServiceError::conflict(
                format!("Category slug '{}' already exists", slug),
            )),
            _ => Ok(()),
        }
    }

    async fn invalidate(&self) {
        let _ = self.cache.delete_pattern(CACHE_PATTERN).await;
    }
}

fn validate_name(name: &str) -> ServiceResult<()> {
    require_non_empty("Category name", name)?;
    require_max_len("Category name", name, 100)
}

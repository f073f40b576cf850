//! Post service
//!
//! Posts with category/tag links. Status is assigned directly; the only
//! side effect is stamping `published_at` on first publication.

use crate::db::repositories::{AssetRepository, CategoryRepository, PostRepository, TagRepository};
use crate::models::{
    CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostStatus, PostWithRelations,
    UpdatePostInput,
};
use crate::services::slug::slug_or_derive;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 200;

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    assets: Arc<dyn AssetRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        assets: Arc<dyn AssetRepository>,
    ) -> Self {
        Self {
            posts,
            categories,
            tags,
            assets,
        }
    }

    /// Paginated list. A category slug that matches nothing yields an empty page.
    pub async fn list(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<PostWithRelations>> {
        let mut filter = filter.clone();
        if let Some(slug) = filter.category.take() {
            match self.categories.get_by_slug(&slug).await? {
                Some(category) => filter.category_id = Some(category.id),
                None => return Ok(PagedResult::new(Vec::new(), 0, params)),
            }
        }

        let (posts, total) = self.posts.list(&filter, params).await?;
        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            items.push(self.with_relations(post).await?);
        }
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<PostWithRelations> {
        let post = self.find(id).await?;
        self.with_relations(post).await
    }

    pub async fn create(
        &self,
        input: CreatePostInput,
        author_id: i64,
    ) -> ServiceResult<PostWithRelations> {
        validate_title(&input.title)?;
        let slug = slug_or_derive(input.slug.as_deref(), &input.title)?;
        self.ensure_slug_free(&slug, None).await?;

        let category_ids = dedup(&input.category_ids);
        let tag_ids = dedup(&input.tag_ids);
        self.check_links(&category_ids, &tag_ids).await?;
        if let Some(asset_id) = input.featured_asset_id {
            self.check_asset(asset_id).await?;
        }

        let mut post = Post::new(input.title.trim().to_string(), slug, input.content, author_id);
        post.excerpt = input.excerpt;
        post.featured_asset_id = input.featured_asset_id;
        post.apply_status(input.status.unwrap_or_default());

        let created = self.posts.create(&post, &category_ids, &tag_ids).await?;
        tracing::info!(post_id = created.id, author_id, "Post created");
        self.with_relations(created).await
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> ServiceResult<PostWithRelations> {
        let mut post = self.find(id).await?;

        if let Some(title) = input.title {
            validate_title(&title)?;
            post.title = title.trim().to_string();
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_derive(Some(&slug), &post.title)?;
            if slug != post.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                post.slug = slug;
            }
        }
        if input.excerpt.is_some() {
            post.excerpt = input.excerpt;
        }
        if let Some(content) = input.content {
            post.content = content;
        }
        if input.clear_featured_asset {
            post.featured_asset_id = None;
        } else if let Some(asset_id) = input.featured_asset_id {
            self.check_asset(asset_id).await?;
            post.featured_asset_id = Some(asset_id);
        }
        if let Some(status) = input.status {
            post.apply_status(status);
        }

        let category_ids = input.category_ids.as_deref().map(dedup);
        let tag_ids = input.tag_ids.as_deref().map(dedup);
        self.check_links(
            category_ids.as_deref().unwrap_or_default(),
            tag_ids.as_deref().unwrap_or_default(),
        )
        .await?;

        post.updated_at = Utc::now();
        let updated = self
            .posts
            .update(&post, category_ids.as_deref(), tag_ids.as_deref())
            .await?;
        self.with_relations(updated).await
    }

    /// Assign a status, whatever the current one is
    pub async fn set_status(&self, id: i64, status: PostStatus) -> ServiceResult<PostWithRelations> {
        let mut post = self.find(id).await?;
        let previous = post.status;
        post.apply_status(status);
        post.updated_at = Utc::now();

        let updated = self.posts.update(&post, None, None).await?;
        tracing::info!(post_id = id, from = %previous, to = %status, "Post status changed");
        self.with_relations(updated).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.posts.delete(id).await? {
            return Err(ServiceError::not_found("Post"));
        }
        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> ServiceResult<Post> {
        self.posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Post"))
    }

    async fn with_relations(&self, post: Post) -> ServiceResult<PostWithRelations> {
        let categories = self.categories.get_by_post_id(post.id).await?;
        let tags = self.tags.get_by_post_id(post.id).await?;
        Ok(PostWithRelations {
            post,
            categories,
            tags,
        })
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<i64>) -> ServiceResult<()> {
        match self.posts.get_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != except_id => Err(ServiceError::conflict(
                format!("Post slug '{}' already exists", slug),
            )),
            _ => Ok(()),
        }
    }

    async fn check_links(&self, category_ids: &[i64], tag_ids: &[i64]) -> ServiceResult<()> {
        if self.categories.count_existing(category_ids).await? != category_ids.len() as i64 {
            return Err(ServiceError::validation("One or more categories do not exist"));
        }
        if self.tags.count_existing(tag_ids).await? != tag_ids.len() as i64 {
            return Err(ServiceError::validation("One or more tags do not exist"));
        }
        Ok(())
    }

    async fn check_asset(&self, asset_id: i64) -> ServiceResult<()> {
        if self.assets.get_by_id(asset_id).await?.is_none() {
            return Err(ServiceError::validation(format!(
                "Asset {} does not exist",
                asset_id
            )));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> ServiceResult<()> {
    require_non_empty("Title", title)?;
    require_max_len("Title", title, MAX_TITLE_LENGTH)
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

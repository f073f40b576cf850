//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Category, Tag};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub status: PostStatus,
    pub author_id: i64,
    pub featured_asset_id: Option<i64>,
    /// Set the first time the post is published
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(title: String, slug: String, content: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            slug,
            excerpt: None,
            content,
            status: PostStatus::Draft,
            author_id,
            featured_asset_id: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign a status, stamping `published_at` on first publication
    pub fn apply_status(&mut self, status: PostStatus) {
        self.status = status;
        if status == PostStatus::Published && self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
    }
}

/// Editorial status. Any status may be assigned from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    #[default]
    Draft,
    Review,
    Published,
    Rejected,
    Archived,
}

impl PostStatus {
    pub const ALL: [PostStatus; 5] = [
        PostStatus::Draft,
        PostStatus::Review,
        PostStatus::Published,
        PostStatus::Rejected,
        PostStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Review => "REVIEW",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Rejected => "REJECTED",
            PostStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Invalid post status: {}", s))
    }
}

/// Post with its categories and tags embedded
#[derive(Debug, Clone, Serialize)]
pub struct PostWithRelations {
    #[serde(flatten)]
    pub post: Post,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

/// Filters for the post list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    /// Category slug, resolved to an id by the service
    pub category: Option<String>,
    pub tag_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Substring of the title
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    /// Derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub featured_asset_id: Option<i64>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub featured_asset_id: Option<i64>,
    /// Remove the featured asset
    #[serde(default)]
    pub clear_featured_asset: bool,
    /// Replaces the category links when present
    pub category_ids: Option<Vec<i64>>,
    /// Replaces the tag links when present
    pub tag_ids: Option<Vec<i64>>,
}

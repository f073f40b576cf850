//! Category model
//!
//! Categories form a tree through `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    /// Parent category, `None` for roots
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        name: String,
        slug: String,
        description: Option<String>,
        parent_id: Option<i64>,
    ) -> Self {
        Self {
            id: 0,
            name,
            slug,
            description,
            parent_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Category with its children for tree representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    /// Assemble a forest from a flat list. Categories whose parent is
    /// missing from the list are treated as roots.
    pub fn build(categories: Vec<Category>) -> Vec<CategoryTree> {
        let ids: std::collections::HashSet<i64> = categories.iter().map(|c| c.id).collect();
        let (roots, rest): (Vec<_>, Vec<_>) = categories
            .into_iter()
            .partition(|c| c.parent_id.map_or(true, |p| !ids.contains(&p)));

        roots
            .into_iter()
            .map(|root| Self::attach(root, &rest))
            .collect()
    }

    fn attach(category: Category, pool: &[Category]) -> CategoryTree {
        let children = pool
            .iter()
            .filter(|c| c.parent_id == Some(category.id))
            .cloned()
            .map(|child| Self::attach(child, pool))
            .collect();
        CategoryTree { category, children }
    }

    /// Number of nodes in this subtree
    pub fn total_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_count()).sum::<usize>()
    }
}

/// Category with number of linked posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub post_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    /// Detach from the current parent
    #[serde(default)]
    pub clear_parent: bool,
}

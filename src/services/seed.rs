//! Demo fixtures
//!
//! Builds the default fixture set and loads it through the seed
//! repository. Every seeded account receives a fresh temporary password,
//! reported once to the caller.

use crate::db::repositories::{SeedData, SeedRepository, SeedSummary};
use crate::db::repositories::seed::{
    SeedAsset, SeedCategory, SeedPermission, SeedPost, SeedRole, SeedTag, SeedUser,
};
use crate::models::{
    permission_name, Event, EventStatus, Faq, Member, PostStatus, UserStatus, ACTIONS, RESOURCES,
};
use crate::services::password::{generate_temporary_password, hash_password};
use crate::services::rbac::default_roles;
use crate::services::settings::keys;
use crate::services::ServiceResult;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Login issued to a seeded user
#[derive(Debug, Clone, Serialize)]
pub struct SeedCredential {
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedOutcome {
    pub summary: SeedSummary,
    pub credentials: Vec<SeedCredential>,
}

/// Fixture set without password hashes; [`SeedService::run`] fills them in
pub fn default_seed_data() -> SeedData {
    let now = Utc::now();

    let permissions = RESOURCES
        .iter()
        .flat_map(|resource| {
            ACTIONS.iter().map(move |action| SeedPermission {
                name: permission_name(resource, action),
                description: Some(format!("{} {}", action, resource)),
            })
        })
        .collect();

    let roles = default_roles()
        .into_iter()
        .map(|(name, description, permissions)| SeedRole {
            name: name.to_string(),
            description: Some(description.to_string()),
            permissions,
        })
        .collect();

    let user = |email: &str, name: &str, roles: &[&str]| SeedUser {
        email: email.to_string(),
        name: name.to_string(),
        password_hash: String::new(),
        status: UserStatus::Active,
        must_change_password: true,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };
    let users = vec![
        user("superadmin@example.com", "Super Admin", &["super_admin"]),
        user("admin@example.com", "Site Admin", &["admin"]),
        user("editor@example.com", "Eddie Editor", &["editor"]),
        user("viewer@example.com", "Vera Viewer", &["viewer"]),
    ];

    let category = |name: &str, slug: &str, parent: Option<&str>| SeedCategory {
        name: name.to_string(),
        slug: slug.to_string(),
        description: None,
        parent_slug: parent.map(str::to_string),
    };
    let categories = vec![
        category("News", "news", None),
        category("Announcements", "announcements", Some("news")),
        category("Guides", "guides", None),
        category("Tutorials", "tutorials", Some("guides")),
    ];

    let tags = ["Release", "Community", "How-To", "Security"]
        .iter()
        .map(|name| SeedTag {
            name: name.to_string(),
            slug: name.to_lowercase(),
        })
        .collect();

    let assets = vec![SeedAsset {
        filename: "welcome-banner.png".to_string(),
        original_name: "welcome-banner.png".to_string(),
        url: "/uploads/welcome-banner.png".to_string(),
        mime_type: "image/png".to_string(),
        size_bytes: 48_213,
        alt_text: Some("Welcome banner".to_string()),
        uploaded_by: Some("admin@example.com".to_string()),
    }];

    let post = |title: &str, slug: &str, status: PostStatus, author: &str, cats: &[&str], tags: &[&str]| SeedPost {
        title: title.to_string(),
        slug: slug.to_string(),
        excerpt: None,
        content: format!("{} body.", title),
        status,
        author_email: author.to_string(),
        featured_asset: None,
        categories: cats.iter().map(|c| c.to_string()).collect(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    };
    let mut welcome = post(
        "Welcome to the new site",
        "welcome-to-the-new-site",
        PostStatus::Published,
        "admin@example.com",
        &["announcements"],
        &["release", "community"],
    );
    welcome.excerpt = Some("What changed and where to find things.".to_string());
    welcome.featured_asset = Some("welcome-banner.png".to_string());
    let posts = vec![
        welcome,
        post(
            "Getting started with the editor",
            "getting-started-with-the-editor",
            PostStatus::Review,
            "editor@example.com",
            &["tutorials"],
            &["how-to"],
        ),
        post(
            "Hardening your account",
            "hardening-your-account",
            PostStatus::Draft,
            "editor@example.com",
            &["guides"],
            &["security", "how-to"],
        ),
        post(
            "Old maintenance notice",
            "old-maintenance-notice",
            PostStatus::Archived,
            "admin@example.com",
            &["news"],
            &[],
        ),
    ];

    let member = |name: &str, position: &str, sort_order: i32| Member {
        id: 0,
        name: name.to_string(),
        position: Some(position.to_string()),
        bio: None,
        email: None,
        photo_url: None,
        sort_order,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let members = vec![
        member("Alex Rivera", "Director", 0),
        member("Sam Chen", "Community Lead", 1),
        member("Jordan Blake", "Engineer", 2),
    ];

    let event = |title: &str, slug: &str, days: i64, status: EventStatus| Event {
        id: 0,
        title: title.to_string(),
        slug: slug.to_string(),
        description: None,
        location: Some("Main Hall".to_string()),
        starts_at: now + Duration::days(days),
        ends_at: Some(now + Duration::days(days) + Duration::hours(2)),
        status,
        created_at: now,
        updated_at: now,
    };
    let events = vec![
        event("Community meetup", "community-meetup", 14, EventStatus::Published),
        event("Release party", "release-party", 30, EventStatus::Draft),
        event("Spring workshop", "spring-workshop", -20, EventStatus::Cancelled),
    ];

    let faq = |question: &str, answer: &str, category: &str, sort_order: i32| Faq {
        id: 0,
        question: question.to_string(),
        answer: answer.to_string(),
        category: Some(category.to_string()),
        sort_order,
        is_published: true,
        created_at: now,
        updated_at: now,
    };
    let faqs = vec![
        faq("How do I reset my password?", "Ask an administrator for a temporary password.", "Accounts", 0),
        faq("Who can publish posts?", "Editors and administrators.", "Content", 1),
        faq("Where are uploads stored?", "In the configured upload directory.", "Content", 2),
    ];

    let settings = vec![
        (keys::SITE_NAME.to_string(), "Demo Site".to_string()),
        (keys::SITE_DESCRIPTION.to_string(), "Seeded demo content".to_string()),
        (keys::CONTACT_EMAIL.to_string(), "contact@example.com".to_string()),
        (keys::DEFAULT_LANGUAGE.to_string(), "en".to_string()),
        (keys::POSTS_PER_PAGE.to_string(), "10".to_string()),
        (keys::MAINTENANCE_MODE.to_string(), "false".to_string()),
    ];

    SeedData {
        permissions,
        roles,
        users,
        categories,
        tags,
        assets,
        posts,
        members,
        events,
        faqs,
        settings,
    }
}

pub struct SeedService {
    repo: Arc<dyn SeedRepository>,
}

impl SeedService {
    pub fn new(repo: Arc<dyn SeedRepository>) -> Self {
        Self { repo }
    }

    /// Replace all data with the default fixtures
    pub async fn run(&self) -> ServiceResult<SeedOutcome> {
        self.run_with(default_seed_data()).await
    }

    /// Hash a fresh temporary password for every user, then load `data`
    pub async fn run_with(&self, mut data: SeedData) -> ServiceResult<SeedOutcome> {
        let mut credentials = Vec::with_capacity(data.users.len());
        for user in &mut data.users {
            let password = generate_temporary_password();
            user.password_hash = hash_password(&password)?;
            user.must_change_password = true;
            credentials.push(SeedCredential {
                email: user.email.clone(),
                password,
                roles: user.roles.clone(),
            });
        }

        let summary = self.repo.reseed(&data).await?;
        tracing::info!(
            users = summary.users,
            posts = summary.posts,
            categories = summary.categories,
            "Database seeded"
        );
        Ok(SeedOutcome {
            summary,
            credentials,
        })
    }
}

//! Settings service
//!
//! Typed view over the key/value `settings` table. Missing keys fall back
//! to defaults; the assembled value is cached until the next write.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::SettingsRepository;
use crate::models::MAX_PER_PAGE;
use crate::services::user::validate_email;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};

const CACHE_KEY: &str = "settings:site";

/// Known setting keys
pub mod keys {
    pub const SITE_NAME: &str = "site_name";
    pub const SITE_DESCRIPTION: &str = "site_description";
    pub const CONTACT_EMAIL: &str = "contact_email";
    pub const DEFAULT_LANGUAGE: &str = "default_language";
    pub const POSTS_PER_PAGE: &str = "posts_per_page";
    pub const MAINTENANCE_MODE: &str = "maintenance_mode";

    pub const ALL: [&str; 6] = [
        SITE_NAME,
        SITE_DESCRIPTION,
        CONTACT_EMAIL,
        DEFAULT_LANGUAGE,
        POSTS_PER_PAGE,
        MAINTENANCE_MODE,
    ];
}

/// Site settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    pub contact_email: String,
    pub default_language: String,
    pub posts_per_page: u32,
    pub maintenance_mode: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "CMS Admin".to_string(),
            site_description: String::new(),
            contact_email: String::new(),
            default_language: "en".to_string(),
            posts_per_page: 10,
            maintenance_mode: false,
        }
    }
}

impl SiteSettings {
    /// Build from stored values, ignoring unparsable ones
    fn from_map(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            site_name: values
                .get(keys::SITE_NAME)
                .cloned()
                .unwrap_or(defaults.site_name),
            site_description: values
                .get(keys::SITE_DESCRIPTION)
                .cloned()
                .unwrap_or(defaults.site_description),
            contact_email: values
                .get(keys::CONTACT_EMAIL)
                .cloned()
                .unwrap_or(defaults.contact_email),
            default_language: values
                .get(keys::DEFAULT_LANGUAGE)
                .cloned()
                .unwrap_or(defaults.default_language),
            posts_per_page: values
                .get(keys::POSTS_PER_PAGE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.posts_per_page),
            maintenance_mode: values
                .get(keys::MAINTENANCE_MODE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.maintenance_mode),
        }
    }

    fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(keys::SITE_NAME.to_string(), self.site_name.clone());
        map.insert(keys::SITE_DESCRIPTION.to_string(), self.site_description.clone());
        map.insert(keys::CONTACT_EMAIL.to_string(), self.contact_email.clone());
        map.insert(keys::DEFAULT_LANGUAGE.to_string(), self.default_language.clone());
        map.insert(keys::POSTS_PER_PAGE.to_string(), self.posts_per_page.to_string());
        map.insert(keys::MAINTENANCE_MODE.to_string(), self.maintenance_mode.to_string());
        map
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsInput {
    pub site_name: Option<String>,
    pub site_description: Option<String>,
    pub contact_email: Option<String>,
    pub default_language: Option<String>,
    pub posts_per_page: Option<u32>,
    pub maintenance_mode: Option<bool>,
}

/// Settings service for managing site configuration
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    cache: SharedCache,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Get all site settings
    pub async fn get_site_settings(&self) -> ServiceResult<SiteSettings> {
        if let Some(settings) = self.cache.get::<SiteSettings>(CACHE_KEY).await.ok().flatten() {
            return Ok(settings);
        }

        let values = self.repo.get_many(&keys::ALL).await?;
        let settings = SiteSettings::from_map(&values);
        let _ = self
            .cache
            .set(CACHE_KEY, &settings, self.cache.default_ttl())
            .await;
        Ok(settings)
    }

    /// Apply a partial update and return the stored result
    pub async fn update_site_settings(
        &self,
        input: UpdateSettingsInput,
    ) -> ServiceResult<SiteSettings> {
        let mut settings = self.get_site_settings().await?;

        if let Some(name) = input.site_name {
            settings.site_name = name.trim().to_string();
        }
        if let Some(description) = input.site_description {
            settings.site_description = description;
        }
        if let Some(email) = input.contact_email {
            settings.contact_email = email.trim().to_lowercase();
        }
        if let Some(language) = input.default_language {
            settings.default_language = language.trim().to_lowercase();
        }
        if let Some(per_page) = input.posts_per_page {
            settings.posts_per_page = per_page;
        }
        if let Some(maintenance) = input.maintenance_mode {
            settings.maintenance_mode = maintenance;
        }
        validate(&settings)?;

        self.repo.set_many(&settings.to_map()).await?;
        let _ = self.cache.delete(CACHE_KEY).await;
        tracing::info!("Site settings updated");
        Ok(settings)
    }
}

fn validate(settings: &SiteSettings) -> ServiceResult<()> {
    require_non_empty("Site name", &settings.site_name)?;
    require_max_len("Site name", &settings.site_name, 100)?;
    require_max_len("Site description", &settings.site_description, 500)?;
    if !settings.contact_email.is_empty() {
        validate_email(&settings.contact_email)?;
    }
    require_non_empty("Default language", &settings.default_language)?;
    require_max_len("Default language", &settings.default_language, 10)?;
    if settings.posts_per_page == 0 || settings.posts_per_page > MAX_PER_PAGE {
        return Err(ServiceError::validation(format!(
            "Posts per page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxSettingsRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (Arc<dyn SettingsRepository>, SettingsService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSettingsRepository::boxed(pool);
        let service = SettingsService::new(repo.clone(), create_cache(&CacheConfig::default()));
        (repo, service)
    }

    #[tokio::test]
    async fn test_defaults_for_missing_keys() {
        let (repo, service) = setup().await;
        repo.set(keys::POSTS_PER_PAGE, "not a number").await.unwrap();
        repo.set(keys::SITE_NAME, "Docs").await.unwrap();

        let settings = service.get_site_settings().await.unwrap();
        assert_eq!(settings.site_name, "Docs");
        assert_eq!(settings.posts_per_page, 10);
        assert!(!settings.maintenance_mode);
    }

    #[tokio::test]
    async fn test_update_persists_and_refreshes_cache() {
        let (repo, service) = setup().await;
        service.get_site_settings().await.unwrap();

        let updated = service
            .update_site_settings(UpdateSettingsInput {
                site_name: Some(" Newsroom ".into()),
                posts_per_page: Some(25),
                maintenance_mode: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.site_name, "Newsroom");

        let cached = service.get_site_settings().await.unwrap();
        assert_eq!(cached, updated);
        assert_eq!(
            repo.get(keys::MAINTENANCE_MODE).await.unwrap().unwrap().value,
            "true"
        );
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let (_repo, service) = setup().await;
        for input in [
            UpdateSettingsInput {
                posts_per_page: Some(0),
                ..Default::default()
            },
            UpdateSettingsInput {
                contact_email: Some("nope".into()),
                ..Default::default()
            },
            UpdateSettingsInput {
                site_name: Some("  ".into()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                service.update_site_settings(input).await.unwrap_err(),
                ServiceError::Validation(_)
            ));
        }
        assert_eq!(service.get_site_settings().await.unwrap(), SiteSettings::default());
    }
}

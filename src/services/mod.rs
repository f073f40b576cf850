//! Services layer
//!
//! Business rules on top of the repositories: validation, slug and
//! password handling, cache invalidation, and the translation chain.

pub mod asset;
pub mod auth;
pub mod category;
pub mod dashboard;
pub mod event;
pub mod faq;
pub mod member;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod rbac;
pub mod seed;
pub mod settings;
pub mod slug;
pub mod tag;
pub mod translate;
pub mod user;

pub use asset::{AssetService, UploadedFile};
pub use auth::{AuthService, ChangePasswordInput, LoginInput, LoginResponse};
pub use category::CategoryService;
pub use dashboard::{DashboardService, DashboardStats};
pub use event::EventService;
pub use faq::FaqService;
pub use member::MemberService;
pub use password::{generate_temporary_password, hash_password, verify_password};
pub use post::PostService;
pub use rate_limiter::LoginRateLimiter;
pub use rbac::RbacService;
pub use seed::{default_seed_data, SeedCredential, SeedOutcome, SeedService};
pub use settings::{SettingsService, SiteSettings, UpdateSettingsInput};
pub use slug::generate_slug;
pub use tag::TagService;
pub use translate::{TranslateRequest, TranslateResponse, TranslationService};
pub use user::UserService;

/// Error type shared by all services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many attempts: {0}")]
    RateLimited(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }
}

/// Reject blank required text fields
pub(crate) fn require_non_empty(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Reject values longer than `max` characters
pub(crate) fn require_max_len(field: &str, value: &str, max: usize) -> ServiceResult<()> {
    if value.chars().count() > max {
        return Err(ServiceError::validation(format!(
            "{} cannot exceed {} characters",
            field, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_helpers() {
        assert!(require_non_empty("Name", "  ").is_err());
        assert!(require_non_empty("Name", "Ann").is_ok());
        assert!(require_max_len("Name", "abcd", 3).is_err());
        assert!(require_max_len("Name", "äöü", 3).is_ok());
    }

    #[test]
    fn test_anyhow_converts_to_internal() {
        fn fails() -> ServiceResult<()> {
            Err(anyhow::anyhow!("db down"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(ServiceError::Internal(_))));
    }
}

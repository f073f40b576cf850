//! API middleware
//!
//! Contains:
//! - Application state shared by all handlers
//! - The JSON error envelope and its mapping from service errors
//! - Bearer-token authentication and permission checks
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAssetRepository, SqlxCategoryRepository, SqlxDashboardRepository, SqlxEventRepository,
    SqlxFaqRepository, SqlxMemberRepository, SqlxPostRepository, SqlxRoleRepository,
    SqlxSessionRepository, SqlxSettingsRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Principal;
use crate::services::{
    AssetService, AuthService, CategoryService, DashboardService, EventService, FaqService,
    LoginRateLimiter, MemberService, PostService, RbacService, ServiceError, SettingsService,
    TagService, TranslationService, UserService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state
        .request_stats
        .record(start.elapsed().as_micros() as u64);
    response
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub rbac_service: Arc<RbacService>,
    pub post_service: Arc<PostService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub asset_service: Arc<AssetService>,
    pub member_service: Arc<MemberService>,
    pub event_service: Arc<EventService>,
    pub faq_service: Arc<FaqService>,
    pub settings_service: Arc<SettingsService>,
    pub dashboard_service: Arc<DashboardService>,
    pub translation_service: Arc<TranslationService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub request_stats: Arc<RequestStats>,
    /// See [`crate::config::ServerConfig::trust_proxy_headers`]
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let role_repo = SqlxRoleRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let asset_repo = SqlxAssetRepository::boxed(pool.clone());

        let rate_limiter = Arc::new(LoginRateLimiter::new());

        Ok(Self {
            auth_service: Arc::new(AuthService::new(
                user_repo.clone(),
                session_repo.clone(),
                rate_limiter.clone(),
                config.auth.session_ttl_hours,
            )),
            user_service: Arc::new(UserService::new(
                user_repo,
                role_repo.clone(),
                session_repo,
            )),
            rbac_service: Arc::new(RbacService::new(role_repo)),
            post_service: Arc::new(PostService::new(
                post_repo.clone(),
                category_repo.clone(),
                tag_repo.clone(),
                asset_repo.clone(),
            )),
            category_service: Arc::new(CategoryService::new(category_repo, cache.clone())),
            tag_service: Arc::new(TagService::new(tag_repo, cache.clone())),
            asset_service: Arc::new(AssetService::new(
                asset_repo.clone(),
                config.upload.clone(),
            )),
            member_service: Arc::new(MemberService::new(SqlxMemberRepository::boxed(
                pool.clone(),
            ))),
            event_service: Arc::new(EventService::new(SqlxEventRepository::boxed(pool.clone()))),
            faq_service: Arc::new(FaqService::new(SqlxFaqRepository::boxed(pool.clone()))),
            settings_service: Arc::new(SettingsService::new(
                SqlxSettingsRepository::boxed(pool.clone()),
                cache,
            )),
            dashboard_service: Arc::new(DashboardService::new(
                SqlxDashboardRepository::boxed(pool.clone()),
                post_repo,
                asset_repo,
            )),
            translation_service: Arc::new(TranslationService::new(&config.translate)?),
            rate_limiter,
            request_stats: Arc::new(RequestStats::new()),
            trust_proxy_headers: config.server.trust_proxy_headers,
            pool,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ServiceError::Validation(msg) => ApiError::validation_error(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::RateLimited(msg) => ApiError::rate_limited(msg),
            ServiceError::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated principal extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.0.user.id
    }

    /// Fail with 403 unless the principal holds `permission`
    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        if self.0.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Missing permission: {}",
                permission
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Bearer token, or the `session` cookie as a fallback
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let principal = state.auth_service.authenticate(&token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser(principal));
    Ok(next.run(request).await)
}

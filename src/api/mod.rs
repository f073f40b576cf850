//! API layer - HTTP handlers and routing
//!
//! Every route lives under `/api`. Only login and the health check are
//! public; everything else passes the bearer-token guard and then checks
//! its own `resource:action` permission.

pub mod assets;
pub mod auth;
pub mod categories;
pub mod common;
pub mod dashboard;
pub mod events;
pub mod faqs;
pub mod members;
pub mod middleware;
pub mod posts;
pub mod roles;
pub mod settings;
pub mod tags;
pub mod translate;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::asset::UPLOADS_URL_PREFIX;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub uptime_seconds: u64,
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if database_ok { "ok" } else { "degraded" },
            database: if database_ok { "ok" } else { "unreachable" },
            uptime_seconds: state.request_stats.uptime_seconds(),
        }),
    )
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let upload_limit = (state.asset_service.max_file_size() + MULTIPART_OVERHEAD) as usize;

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .route("/permissions", get(roles::list_permissions))
        .nest("/posts", posts::router())
        .nest("/categories", categories::router())
        .nest("/tags", tags::router())
        .nest(
            "/assets",
            assets::router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/members", members::router())
        .nest("/events", events::router())
        .nest("/faqs", faqs::router())
        .nest("/settings", settings::router())
        .nest("/dashboard", dashboard::router())
        .nest("/translate", translate::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// CORS for the dashboard origin; `*` allows any origin without cookies
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if cors_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!(cors_origin, "Invalid CORS origin, cross-origin requests disabled");
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let uploads = ServeDir::new(state.asset_service.upload_dir());

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateAdminInput, Principal, User, SUPER_ADMIN_ROLE};
    use crate::services::translate::DictionaryProvider;
    use crate::services::TranslationService;
    use axum_test::multipart::{MultipartForm, Part};
    use axum::http::HeaderName;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PASSWORD: &str = "correct-horse-battery";

    struct TestApp {
        server: TestServer,
        state: AppState,
        _uploads: TempDir,
    }

    async fn setup() -> TestApp {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let uploads = TempDir::new().unwrap();
        let mut config = Config::default();
        config.upload.path = uploads.path().to_path_buf();

        let mut state = AppState::new(pool, &config).unwrap();
        state.translation_service = Arc::new(TranslationService::with_providers(vec![Box::new(
            DictionaryProvider,
        )]));
        state.rbac_service.ensure_defaults().await.unwrap();

        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        TestApp {
            server,
            state,
            _uploads: uploads,
        }
    }

    async fn create_user(app: &TestApp, email: &str, role: &str) {
        let installer = Principal {
            user: User::new("installer@example.com".into(), "Installer".into(), String::new()),
            roles: vec![SUPER_ADMIN_ROLE.to_string()],
            permissions: BTreeSet::new(),
        };
        app.state
            .user_service
            .create_admin(
                CreateAdminInput {
                    email: email.to_string(),
                    name: "Test".to_string(),
                    password: Some(PASSWORD.to_string()),
                    roles: vec![role.to_string()],
                },
                &installer,
            )
            .await
            .unwrap();
    }

    async fn login(app: &TestApp, email: &str) -> String {
        let response = app
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn admin_token(app: &TestApp) -> String {
        create_user(app, "root@example.com", "super_admin").await;
        login(app, "root@example.com").await
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = setup().await;
        let response = app.server.get("/api/health").await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_login_me_logout() {
        let app = setup().await;
        create_user(&app, "ed@example.com", "editor").await;

        let response = app
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": "ed@example.com", "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        let cookie = response.header("set-cookie");
        assert!(cookie.to_str().unwrap().starts_with("session="));
        let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

        let me = app
            .server
            .get("/api/auth/me")
            .authorization_bearer(&token)
            .await;
        me.assert_status_ok();
        let me = me.json::<Value>();
        assert_eq!(me["email"], "ed@example.com");
        assert_eq!(me["roles"], json!(["editor"]));
        assert!(me["permissions"]
            .as_array()
            .unwrap()
            .contains(&json!("posts:create")));
        assert!(me.get("password_hash").is_none());

        app.server
            .post("/api/auth/logout")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.server
            .get("/api/auth/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_credentials_rejected() {
        let app = setup().await;
        create_user(&app, "ed@example.com", "editor").await;

        let response = app
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": "ed@example.com", "password": "wrong-password" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_forwarded_for_counts_only_when_trusted() {
        let app = setup().await;
        let forwarded = (
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.9"),
        );

        for i in 0..12 {
            app.server
                .post("/api/auth/login")
                .add_header(forwarded.0.clone(), forwarded.1.clone())
                .json(&json!({ "email": format!("nobody{}@example.com", i), "password": "x" }))
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }

        let mut state = app.state.clone();
        state.trust_proxy_headers = true;
        let trusted = TestServer::new(build_router(state, "*")).unwrap();
        for i in 0..10 {
            trusted
                .post("/api/auth/login")
                .add_header(forwarded.0.clone(), forwarded.1.clone())
                .json(&json!({ "email": format!("ghost{}@example.com", i), "password": "x" }))
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
        trusted
            .post("/api/auth/login")
            .add_header(forwarded.0.clone(), forwarded.1.clone())
            .json(&json!({ "email": "ghost@example.com", "password": "x" }))
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_token() {
        let app = setup().await;
        app.server
            .get("/api/posts")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get("/api/posts")
            .authorization_bearer("not-a-session")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_permission_denied_for_viewer() {
        let app = setup().await;
        create_user(&app, "vi@example.com", "viewer").await;
        let token = login(&app, "vi@example.com").await;

        app.server
            .get("/api/posts")
            .authorization_bearer(&token)
            .await
            .assert_status_ok();

        let response = app
            .server
            .post("/api/posts")
            .authorization_bearer(&token)
            .json(&json!({ "title": "Nope", "content": "x" }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"]["code"], "FORBIDDEN");

        app.server
            .get("/api/users")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_cannot_promote_to_super_admin() {
        let app = setup().await;
        create_user(&app, "ad@example.com", "admin").await;
        let token = login(&app, "ad@example.com").await;

        let me = app
            .server
            .get("/api/auth/me")
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        let roles = app.state.rbac_service.list_roles().await.unwrap();
        let super_admin = roles
            .iter()
            .find(|r| r.role.name == SUPER_ADMIN_ROLE)
            .unwrap()
            .role
            .id;

        let response = app
            .server
            .put(&format!("/api/users/{}/roles", me["id"]))
            .authorization_bearer(&token)
            .json(&json!({ "role_ids": [super_admin] }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        app.server
            .post("/api/users/admin")
            .authorization_bearer(&token)
            .json(&json!({ "email": "new@example.com", "name": "New", "roles": ["super_admin"] }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let me = app
            .server
            .get("/api/auth/me")
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        assert_eq!(me["roles"], json!(["admin"]));
    }

    #[tokio::test]
    async fn test_post_crud_with_relations() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let category = app
            .server
            .post("/api/categories")
            .authorization_bearer(&token)
            .json(&json!({ "name": "News" }))
            .await;
        category.assert_status(StatusCode::CREATED);
        let category_id = category.json::<Value>()["id"].as_i64().unwrap();

        let tag = app
            .server
            .post("/api/tags")
            .authorization_bearer(&token)
            .json(&json!({ "name": "Rust" }))
            .await;
        tag.assert_status(StatusCode::CREATED);
        let tag_id = tag.json::<Value>()["id"].as_i64().unwrap();

        let created = app
            .server
            .post("/api/posts")
            .authorization_bearer(&token)
            .json(&json!({
                "title": "Hello World",
                "content": "Body",
                "category_ids": [category_id],
                "tag_ids": [tag_id],
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let post = created.json::<Value>();
        let post_id = post["id"].as_i64().unwrap();
        assert_eq!(post["slug"], "hello-world");
        assert_eq!(post["status"], "DRAFT");
        assert_eq!(post["categories"][0]["name"], "News");
        assert_eq!(post["tags"][0]["name"], "Rust");

        let listed = app
            .server
            .get("/api/posts")
            .add_query_param("category", "news")
            .authorization_bearer(&token)
            .await;
        listed.assert_status_ok();
        let page = listed.json::<Value>();
        assert_eq!(page["total"], 1);
        assert_eq!(page["page"], 1);
        assert_eq!(page["per_page"], 20);

        let published = app
            .server
            .put(&format!("/api/posts/{}/status", post_id))
            .authorization_bearer(&token)
            .json(&json!({ "status": "PUBLISHED" }))
            .await;
        published.assert_status_ok();
        assert_eq!(published.json::<Value>()["status"], "PUBLISHED");

        let updated = app
            .server
            .put(&format!("/api/posts/{}", post_id))
            .authorization_bearer(&token)
            .json(&json!({ "tag_ids": [] }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["tags"], json!([]));

        app.server
            .delete(&format!("/api/posts/{}", post_id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&format!("/api/posts/{}", post_id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_category_conflicts() {
        let app = setup().await;
        let token = admin_token(&app).await;

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            app.server
                .post("/api/categories")
                .authorization_bearer(&token)
                .json(&json!({ "name": "Guides" }))
                .await
                .assert_status(expected);
        }
    }

    #[tokio::test]
    async fn test_create_admin_returns_temporary_password() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let response = app
            .server
            .post("/api/users/admin")
            .authorization_bearer(&token)
            .json(&json!({ "email": "new@example.com", "name": "New", "roles": ["editor"] }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["temporary_password"].as_str().unwrap().len(), 12);
        assert_eq!(body["user"]["must_change_password"], true);

        let unknown = app
            .server
            .post("/api/users/admin")
            .authorization_bearer(&token)
            .json(&json!({ "email": "other@example.com", "name": "Other", "roles": ["ghost"] }))
            .await;
        unknown.assert_status(StatusCode::BAD_REQUEST);

        let listed = app
            .server
            .get("/api/users")
            .add_query_param("search", "other@")
            .authorization_bearer(&token)
            .await;
        assert_eq!(listed.json::<Value>()["total"], 0);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let response = app
            .server
            .get("/api/settings")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["posts_per_page"], 10);

        let updated = app
            .server
            .put("/api/settings")
            .authorization_bearer(&token)
            .json(&json!({ "site_name": "Newsroom", "maintenance_mode": true }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["site_name"], "Newsroom");

        app.server
            .put("/api/settings")
            .authorization_bearer(&token)
            .json(&json!({ "posts_per_page": 0 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_translate_endpoint() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let response = app
            .server
            .post("/api/translate")
            .authorization_bearer(&token)
            .json(&json!({ "text": "hello world", "fromLanguage": "en", "toLanguage": "es" }))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["service"], "dictionary");
        assert_eq!(body["translatedText"], "hola mundo");

        let same = app
            .server
            .post("/api/translate")
            .authorization_bearer(&token)
            .json(&json!({ "text": "hello", "fromLanguage": "en", "toLanguage": "en" }))
            .await;
        assert_eq!(same.json::<Value>()["service"], "none");

        app.server
            .post("/api/translate")
            .authorization_bearer(&token)
            .json(&json!({ "text": "  ", "fromLanguage": "en", "toLanguage": "es" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.server
            .post("/api/translate")
            .json(&json!({ "text": "hello", "fromLanguage": "en", "toLanguage": "es" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_asset_upload_is_served() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"\x89PNG fake image".to_vec())
                .file_name("logo.png")
                .mime_type("image/png"),
        );
        let response = app
            .server
            .post("/api/assets")
            .authorization_bearer(&token)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::CREATED);
        let asset = response.json::<Value>();
        assert_eq!(asset["original_name"], "logo.png");
        let url = asset["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/"));

        let served = app.server.get(&url).await;
        served.assert_status_ok();
        assert_eq!(served.as_bytes().to_vec(), b"\x89PNG fake image".to_vec());

        let rejected = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"MZ".to_vec())
                .file_name("tool.exe")
                .mime_type("application/x-msdownload"),
        );
        app.server
            .post("/api/assets")
            .authorization_bearer(&token)
            .multipart(rejected)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_uploaded_html_name_is_served_as_declared_type() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"<script>alert(1)</script>".to_vec())
                .file_name("x.html")
                .mime_type("image/png"),
        );
        let response = app
            .server
            .post("/api/assets")
            .authorization_bearer(&token)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::CREATED);
        let url = response.json::<Value>()["url"].as_str().unwrap().to_string();
        assert!(url.ends_with(".png"));

        let served = app.server.get(&url).await;
        served.assert_status_ok();
        assert_eq!(served.header("content-type"), "image/png");
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let app = setup().await;
        let token = admin_token(&app).await;

        let response = app
            .server
            .get("/api/dashboard/stats")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["users"], 1);
        assert_eq!(body["posts_by_status"]["DRAFT"], 0);
        assert!(body["requests"]["total"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_invalid_cors_origin_does_not_panic() {
        let _ = cors_layer("http://localhost:3000");
        let _ = cors_layer("*");
        let _ = cors_layer("bad\norigin");
    }
}

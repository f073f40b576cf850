//! Authentication API endpoints
//!
//! - POST /api/auth/login - Exchange credentials for a session token
//! - POST /api/auth/logout - Revoke the current session
//! - GET /api/auth/me - Current principal with roles and permissions
//! - PUT /api/auth/password - Change own password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use crate::api::common::{session_cookie, ClientIp, CLEAR_SESSION_COOKIE};
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::Principal;
use crate::services::{ChangePasswordInput, LoginInput};

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth_service.login(body, ip).await?;

    let max_age = (response.expires_at - Utc::now()).num_seconds();
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = HeaderValue::from_str(&session_cookie(&response.token, max_age)) {
        response_headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((response_headers, Json(response)))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.auth_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static(CLEAR_SESSION_COOKIE),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<Principal> {
    Json(user.0)
}

/// PUT /api/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state.auth_service.change_password(user.id(), body).await?;
    Ok(StatusCode::NO_CONTENT)
}

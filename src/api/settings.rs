//! Site settings API endpoints

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{SiteSettings, UpdateSettingsInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

/// GET /api/settings - defaults fill missing keys
async fn get_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SiteSettings>, ApiError> {
    user.require("settings:read")?;
    Ok(Json(state.settings_service.get_site_settings().await?))
}

/// PUT /api/settings - partial update
async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateSettingsInput>,
) -> Result<Json<SiteSettings>, ApiError> {
    user.require("settings:update")?;
    Ok(Json(state.settings_service.update_site_settings(body).await?))
}

//! Translation API endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{TranslateRequest, TranslateResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(translate))
}

/// POST /api/translate
///
/// Always answers when the text is non-empty: remote providers are tried
/// first and the built-in dictionary catches whatever they miss.
async fn translate(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    Ok(Json(state.translation_service.translate(body).await?))
}

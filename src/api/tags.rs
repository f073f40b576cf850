//! Tag API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateTagInput, Tag, TagWithCount, UpdateTagInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/{id}", put(update_tag).delete(delete_tag))
}

/// GET /api/tags - with post counts
async fn list_tags(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    user.require("tags:read")?;
    Ok(Json(state.tag_service.list().await?))
}

async fn create_tag(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateTagInput>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    user.require("tags:create")?;
    let tag = state.tag_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn update_tag(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTagInput>,
) -> Result<Json<Tag>, ApiError> {
    user.require("tags:update")?;
    Ok(Json(state.tag_service.update(id, body).await?))
}

async fn delete_tag(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("tags:delete")?;
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

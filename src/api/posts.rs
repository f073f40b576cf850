//! Post API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreatePostInput, PagedResult, PostFilter, PostStatus, PostWithRelations, UpdatePostInput,
};

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: PostStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/status", put(set_status))
}

/// GET /api/posts?status=&category=&category_id=&tag_id=&author_id=&search=
async fn list_posts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<PagedResult<PostWithRelations>>, ApiError> {
    user.require("posts:read")?;
    Ok(Json(state.post_service.list(&filter, &page.params()).await?))
}

async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostWithRelations>), ApiError> {
    user.require("posts:create")?;
    let post = state.post_service.create(body, user.id()).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostWithRelations>, ApiError> {
    user.require("posts:read")?;
    Ok(Json(state.post_service.get(id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<PostWithRelations>, ApiError> {
    user.require("posts:update")?;
    Ok(Json(state.post_service.update(id, body).await?))
}

async fn set_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<PostWithRelations>, ApiError> {
    user.require("posts:update")?;
    Ok(Json(state.post_service.set_status(id, body.status).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("posts:delete")?;
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

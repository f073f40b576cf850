//! Category API endpoints
//!
//! - GET /api/categories - Flat list with post counts
//! - GET /api/categories/tree - Nested by parent
//! - POST /api/categories
//! - GET/PUT/DELETE /api/categories/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Category, CategoryTree, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/tree", get(category_tree))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<CategoryWithCount>>, ApiError> {
    user.require("categories:read")?;
    Ok(Json(state.category_service.list().await?))
}

async fn category_tree(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<CategoryTree>>, ApiError> {
    user.require("categories:read")?;
    Ok(Json(state.category_service.tree().await?))
}

async fn create_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    user.require("categories:create")?;
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    user.require("categories:read")?;
    Ok(Json(state.category_service.get(id).await?))
}

async fn update_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    user.require("categories:update")?;
    Ok(Json(state.category_service.update(id, body).await?))
}

/// Children are detached, post links removed
async fn delete_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("categories:delete")?;
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! FAQ API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateFaqInput, Faq, FaqFilter, PagedResult, UpdateFaqInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_faqs).post(create_faq))
        .route("/categories", get(list_faq_categories))
        .route("/{id}", get(get_faq).put(update_faq).delete(delete_faq))
}

/// GET /api/faqs?published=true&category= - ordered by sort_order
async fn list_faqs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<FaqFilter>,
) -> Result<Json<PagedResult<Faq>>, ApiError> {
    user.require("faqs:read")?;
    Ok(Json(state.faq_service.list(&filter, &page.params()).await?))
}

/// GET /api/faqs/categories - distinct category names
async fn list_faq_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<String>>, ApiError> {
    user.require("faqs:read")?;
    Ok(Json(state.faq_service.categories().await?))
}

async fn create_faq(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateFaqInput>,
) -> Result<(StatusCode, Json<Faq>), ApiError> {
    user.require("faqs:create")?;
    let created = state.faq_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_faq(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Faq>, ApiError> {
    user.require("faqs:read")?;
    Ok(Json(state.faq_service.get(id).await?))
}

async fn update_faq(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFaqInput>,
) -> Result<Json<Faq>, ApiError> {
    user.require("faqs:update")?;
    Ok(Json(state.faq_service.update(id, body).await?))
}

async fn delete_faq(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("faqs:delete")?;
    state.faq_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

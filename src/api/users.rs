//! User management API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreateAdminInput, CreateUserInput, PagedResult, UpdateUserInput, UserFilter, UserWithRoles,
    UserWithTemporaryPassword,
};

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/admin", post(create_admin))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/reset-password", post(reset_password))
        .route("/{id}/roles", put(assign_roles))
}

async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<PagedResult<UserWithRoles>>, ApiError> {
    user.require("users:read")?;
    let result = state.user_service.list(&filter, &page.params()).await?;
    Ok(Json(result))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<UserWithRoles>), ApiError> {
    user.require("users:create")?;
    let created = state.user_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/users/admin - user and role links in one transaction
async fn create_admin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateAdminInput>,
) -> Result<(StatusCode, Json<UserWithTemporaryPassword>), ApiError> {
    user.require("users:create")?;
    let created = state.user_service.create_admin(body, &user.0).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserWithRoles>, ApiError> {
    user.require("users:read")?;
    Ok(Json(state.user_service.get(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserInput>,
) -> Result<Json<UserWithRoles>, ApiError> {
    user.require("users:update")?;
    Ok(Json(state.user_service.update(id, body).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("users:delete")?;
    state.user_service.delete(id, user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserWithTemporaryPassword>, ApiError> {
    user.require("users:update")?;
    Ok(Json(state.user_service.reset_password(id).await?))
}

async fn assign_roles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AssignRolesRequest>,
) -> Result<Json<UserWithRoles>, ApiError> {
    user.require("roles:update")?;
    Ok(Json(state.user_service.assign_roles(id, &body.role_ids, &user.0).await?))
}

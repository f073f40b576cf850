//! Role and permission API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateRoleInput, Permission, RoleWithPermissions, UpdateRoleInput};

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permission_ids: Vec<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/{id}", get(get_role).put(update_role).delete(delete_role))
        .route("/{id}/permissions", put(set_permissions))
}

/// GET /api/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Permission>>, ApiError> {
    user.require("roles:read")?;
    Ok(Json(state.rbac_service.list_permissions().await?))
}

async fn list_roles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<RoleWithPermissions>>, ApiError> {
    user.require("roles:read")?;
    Ok(Json(state.rbac_service.list_roles().await?))
}

async fn create_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRoleInput>,
) -> Result<(StatusCode, Json<RoleWithPermissions>), ApiError> {
    user.require("roles:create")?;
    let role = state.rbac_service.create_role(body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn get_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RoleWithPermissions>, ApiError> {
    user.require("roles:read")?;
    Ok(Json(state.rbac_service.get_role(id).await?))
}

async fn update_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRoleInput>,
) -> Result<Json<RoleWithPermissions>, ApiError> {
    user.require("roles:update")?;
    Ok(Json(state.rbac_service.update_role(id, body).await?))
}

async fn delete_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("roles:delete")?;
    state.rbac_service.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_permissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetPermissionsRequest>,
) -> Result<Json<RoleWithPermissions>, ApiError> {
    user.require("roles:update")?;
    let role = state
        .rbac_service
        .set_permissions(id, &body.permission_ids)
        .await?;
    Ok(Json(role))
}

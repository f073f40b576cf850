//! Member API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateMemberInput, Member, MemberFilter, PagedResult, UpdateMemberInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route("/{id}", get(get_member).put(update_member).delete(delete_member))
}

/// Ordered by sort_order, then name
async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<MemberFilter>,
) -> Result<Json<PagedResult<Member>>, ApiError> {
    user.require("members:read")?;
    Ok(Json(state.member_service.list(&filter, &page.params()).await?))
}

async fn create_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMemberInput>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    user.require("members:create")?;
    let member = state.member_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Member>, ApiError> {
    user.require("members:read")?;
    Ok(Json(state.member_service.get(id).await?))
}

async fn update_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMemberInput>,
) -> Result<Json<Member>, ApiError> {
    user.require("members:update")?;
    Ok(Json(state.member_service.update(id, body).await?))
}

async fn delete_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("members:delete")?;
    state.member_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

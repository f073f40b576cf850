//! Event API endpoints
//!
//! `ends_at`, when given, must not precede `starts_at`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateEventInput, Event, EventFilter, PagedResult, UpdateEventInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{id}", get(get_event).put(update_event).delete(delete_event))
}

/// GET /api/events?status=PUBLISHED&upcoming=true - ordered by starts_at
async fn list_events(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<PagedResult<Event>>, ApiError> {
    user.require("events:read")?;
    Ok(Json(state.event_service.list(&filter, &page.params()).await?))
}

async fn create_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateEventInput>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    user.require("events:create")?;
    let created = state.event_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    user.require("events:read")?;
    Ok(Json(state.event_service.get(id).await?))
}

async fn update_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateEventInput>,
) -> Result<Json<Event>, ApiError> {
    user.require("events:update")?;
    Ok(Json(state.event_service.update(id, body).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("events:delete")?;
    state.event_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Asset API endpoints
//!
//! Uploads are multipart/form-data with a single file field named `file`.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Asset, AssetFilter, PagedResult, UpdateAssetInput};
use crate::services::UploadedFile;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assets).post(upload_asset))
        .route("/{id}", get(get_asset).put(update_asset).delete(delete_asset))
}

/// GET /api/assets?mime_type=image/&search=
async fn list_assets(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<AssetFilter>,
) -> Result<Json<PagedResult<Asset>>, ApiError> {
    user.require("assets:read")?;
    Ok(Json(state.asset_service.list(&filter, &page.params()).await?))
}

/// POST /api/assets
async fn upload_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    user.require("assets:create")?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let file = UploadedFile {
            original_name,
            content_type,
            data: data.to_vec(),
        };
        let asset = state.asset_service.upload(file, Some(user.id())).await?;
        return Ok((StatusCode::CREATED, Json(asset)));
    }

    Err(ApiError::validation_error("No file provided"))
}

async fn get_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Asset>, ApiError> {
    user.require("assets:read")?;
    Ok(Json(state.asset_service.get(id).await?))
}

/// PUT /api/assets/{id} - alt text only
async fn update_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAssetInput>,
) -> Result<Json<Asset>, ApiError> {
    user.require("assets:update")?;
    Ok(Json(state.asset_service.update(id, body).await?))
}

async fn delete_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require("assets:delete")?;
    state.asset_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

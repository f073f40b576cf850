//! Asset service
//!
//! Uploaded files live in the configured upload directory under a random
//! name; the `assets` table keeps their metadata.

use crate::config::UploadConfig;
use crate::db::repositories::AssetRepository;
use crate::models::{Asset, AssetFilter, ListParams, PagedResult, UpdateAssetInput};
use crate::services::{require_max_len, ServiceError, ServiceResult};
use anyhow::Context;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// Public URL prefix the upload directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// A file received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub struct AssetService {
    repo: Arc<dyn AssetRepository>,
    config: UploadConfig,
}

impl AssetService {
    pub fn new(repo: Arc<dyn AssetRepository>, config: UploadConfig) -> Self {
        Self { repo, config }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.path
    }

    /// Validate, store and record an upload
    pub async fn upload(&self, file: UploadedFile, uploaded_by: Option<i64>) -> ServiceResult<Asset> {
        if file.data.is_empty() {
            return Err(ServiceError::validation("Uploaded file is empty"));
        }
        if !self.config.is_type_allowed(&file.content_type) {
            return Err(ServiceError::validation(format!(
                "Invalid file type: {}. Allowed types: {}",
                file.content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        if file.data.len() as u64 > self.config.max_file_size {
            return Err(ServiceError::validation(format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                self.config.max_file_size,
                self.config.max_file_size / 1024 / 1024
            )));
        }

        fs::create_dir_all(&self.config.path)
            .await
            .with_context(|| format!("Failed to create upload dir {:?}", self.config.path))?;

        // The stored extension decides the served Content-Type, so it follows
        // the validated MIME type and never the client's file name.
        let ext = self.config.get_extension(&file.content_type);
        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.config.path.join(&filename);
        fs::write(&path, &file.data)
            .await
            .with_context(|| format!("Failed to save file {:?}", path))?;

        let original_name = sanitize_original_name(&file.original_name);
        let asset = Asset {
            id: 0,
            url: format!("{}/{}", UPLOADS_URL_PREFIX, filename),
            filename,
            original_name,
            mime_type: file.content_type,
            size_bytes: file.data.len() as i64,
            alt_text: None,
            uploaded_by,
            created_at: Utc::now(),
        };

        match self.repo.create(&asset).await {
            Ok(created) => {
                tracing::info!(asset_id = created.id, size = created.size_bytes, "Asset uploaded");
                Ok(created)
            }
            Err(e) => {
                let _ = fs::remove_file(&path).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(
        &self,
        filter: &AssetFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Asset>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Asset> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Asset"))
    }

    pub async fn update(&self, id: i64, input: UpdateAssetInput) -> ServiceResult<Asset> {
        self.get(id).await?;
        let alt_text = input
            .alt_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(text) = &alt_text {
            require_max_len("Alt text", text, 255)?;
        }
        self.repo.update_alt_text(id, alt_text.as_deref()).await?;
        self.get(id).await
    }

    /// Remove the row, then the file. A missing file is only logged.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let asset = self.get(id).await?;
        self.repo.delete(id).await?;

        let path = self.config.path.join(&asset.filename);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(asset_id = id, path = ?path, error = %e, "Failed to remove asset file");
        }
        Ok(())
    }
}

/// Strip any client-side directory components
fn sanitize_original_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

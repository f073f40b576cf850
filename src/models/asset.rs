//! Uploaded asset model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a file stored in the upload directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    /// Stored file name (unique, generated)
    pub filename: String,
    /// Name of the file as uploaded
    pub original_name: String,
    /// Public URL of the file
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Filters for the asset list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetFilter {
    /// MIME type prefix, e.g. `image/`
    pub mime_type: Option<String>,
    /// Substring of the original name
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAssetInput {
    pub alt_text: Option<String>,
}

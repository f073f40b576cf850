//! Dashboard statistics

use crate::db::repositories::{AssetRepository, DashboardRepository, PostRepository, TableCounts};
use crate::models::PostStatus;
use crate::services::ServiceResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub counts: TableCounts,
    /// Every status is present, zero when unused
    pub posts_by_status: BTreeMap<&'static str, i64>,
    pub asset_bytes: i64,
}

pub struct DashboardService {
    dashboard: Arc<dyn DashboardRepository>,
    posts: Arc<dyn PostRepository>,
    assets: Arc<dyn AssetRepository>,
}

impl DashboardService {
    pub fn new(
        dashboard: Arc<dyn DashboardRepository>,
        posts: Arc<dyn PostRepository>,
        assets: Arc<dyn AssetRepository>,
    ) -> Self {
        Self {
            dashboard,
            posts,
            assets,
        }
    }

    pub async fn stats(&self) -> ServiceResult<DashboardStats> {
        let counts = self.dashboard.table_counts().await?;

        let mut posts_by_status: BTreeMap<&'static str, i64> =
            PostStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for (status, count) in self.posts.count_by_status().await? {
            posts_by_status.insert(status.as_str(), count);
        }

        Ok(DashboardStats {
            counts,
            posts_by_status,
            asset_bytes: self.assets.total_size().await?,
        })
    }
}

//! Dashboard API endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::DashboardStats;

/// Content counts plus process statistics
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub requests: RequestSummary,
}

#[derive(Debug, Serialize)]
pub struct RequestSummary {
    pub total: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /api/dashboard/stats
async fn get_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.dashboard_service.stats().await?;
    let requests = &state.request_stats;

    Ok(Json(DashboardResponse {
        stats,
        requests: RequestSummary {
            total: requests.total_requests(),
            avg_response_time_ms: requests.avg_response_time_us() / 1000.0,
            uptime_seconds: requests.uptime_seconds(),
        },
    }))
}

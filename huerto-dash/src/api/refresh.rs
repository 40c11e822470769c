//! Dataset refresh endpoint

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::services::{refresh_dataset, RefreshSummary};
use crate::{ApiResult, AppState};

/// POST /api/refresh
///
/// **Errors:**
/// - 409 Conflict: a refresh is already running
/// - 503 Service Unavailable: no telemetry credentials configured
/// - 502 Bad Gateway: the pipeline failed; the served dataset is unchanged
pub async fn trigger_refresh(State(state): State<AppState>) -> ApiResult<Json<RefreshSummary>> {
    info!("Refresh requested");
    let summary = refresh_dataset(&state).await?;
    Ok(Json(summary))
}

pub fn refresh_routes() -> Router<AppState> {
    Router::new().route("/api/refresh", post(trigger_refresh))
}

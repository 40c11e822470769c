//! Solar calendar diagnostics

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::solar::DataWarning;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SolarWarningsResponse {
    pub count: usize,
    pub warnings: Vec<DataWarning>,
}

/// GET /api/solar/warnings
///
/// Suspicious table entries found at load; they are served as tabulated.
pub async fn solar_warnings(State(state): State<AppState>) -> Json<SolarWarningsResponse> {
    let warnings = state.calendar.warnings().to_vec();
    Json(SolarWarningsResponse {
        count: warnings.len(),
        warnings,
    })
}

pub fn solar_routes() -> Router<AppState> {
    Router::new().route("/api/solar/warnings", get(solar_warnings))
}

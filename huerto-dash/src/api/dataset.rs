//! Dataset browsing: overview, months of a year, monthly tables

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LabeledRecord;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct DatasetInfoResponse {
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
    pub years: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct MonthsResponse {
    pub year: i32,
    pub months: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

impl MonthQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if (1..=12).contains(&self.month) {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "month must be 1-12, got {}",
                self.month
            )))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub year: i32,
    pub month: u32,
    pub records: Vec<LabeledRecord>,
}

/// GET /api/dataset
pub async fn dataset_info(State(state): State<AppState>) -> Json<DatasetInfoResponse> {
    let snapshot = state.dataset.read().await;
    Json(DatasetInfoResponse {
        records: snapshot.dataset.len(),
        refreshed_at: snapshot.refreshed_at,
        years: snapshot.dataset.years(),
    })
}

/// GET /api/dataset/months?year=YYYY
pub async fn list_months(
    State(state): State<AppState>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> ApiResult<Json<MonthsResponse>> {
    let Query(query) = query?;

    let snapshot = state.dataset.read().await;
    Ok(Json(MonthsResponse {
        year: query.year,
        months: snapshot.dataset.months(query.year),
    }))
}

/// GET /api/records?year=YYYY&month=M
///
/// An empty month is an empty table, not an error.
pub async fn month_records(
    State(state): State<AppState>,
    query: Result<Query<MonthQuery>, QueryRejection>,
) -> ApiResult<Json<RecordsResponse>> {
    let Query(query) = query?;
    query.validate()?;

    let snapshot = state.dataset.read().await;
    Ok(Json(RecordsResponse {
        year: query.year,
        month: query.month,
        records: snapshot.dataset.month(query.year, query.month).to_vec(),
    }))
}

/// Build dataset routes
pub fn dataset_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dataset", get(dataset_info))
        .route("/api/dataset/months", get(list_months))
        .route("/api/records", get(month_records))
}

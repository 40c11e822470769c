//! Day views and multi-day comparison

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dataset::MonthQuery;
use crate::models::{export_file_name, DayComparison, DayState, DaySummary, LabeledRecord};
use crate::services::ClassificationMetrics;
use crate::{ApiError, ApiResult, AppState};

/// Selecting more days than this is rejected
const MAX_COMPARED_DAYS: usize = 31;

#[derive(Debug, Serialize)]
pub struct DayResponse {
    pub date: NaiveDate,
    pub summary: DaySummary,
    pub records: Vec<LabeledRecord>,
    pub export_file: Option<String>,
    /// Classifier output per record; absent without a model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<DayState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ClassificationMetrics>,
}

#[derive(Debug, Serialize)]
pub struct DatesResponse {
    pub year: i32,
    pub month: u32,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    /// Comma-separated `YYYY-MM-DD` list
    pub dates: String,
}

#[derive(Debug, Serialize)]
pub struct ComparisonResponse {
    pub dates: Vec<NaiveDate>,
    pub records: Vec<LabeledRecord>,
    pub series: Vec<DayComparison>,
    pub export_file: Option<String>,
}

fn parse_date(text: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date {:?}, expected YYYY-MM-DD", text)))
}

/// GET /api/days/:date
pub async fn day_view(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Json<DayResponse>> {
    let date = parse_date(&date)?;

    let snapshot = state.dataset.read().await;
    let records = snapshot.dataset.day(date).to_vec();
    let summary = snapshot
        .dataset
        .day_summary(date)
        .ok_or_else(|| ApiError::NotFound(format!("no records for {}", date)))?;
    drop(snapshot);

    let (predictions, metrics) = match &state.classifier {
        Some(classifier) => {
            let features: Vec<_> = records.iter().map(LabeledRecord::features).collect();
            let predicted = classifier.predict(&features);
            let truth: Vec<_> = records.iter().map(|r| r.estado).collect();
            let metrics = ClassificationMetrics::evaluate(&truth, &predicted);
            (Some(predicted), metrics)
        }
        None => (None, None),
    };

    let timestamps: Vec<_> = records.iter().map(|r| r.fecha).collect();
    Ok(Json(DayResponse {
        date,
        summary,
        export_file: export_file_name(&timestamps),
        records,
        predictions,
        metrics,
    }))
}

/// GET /api/days?year=YYYY&month=M
pub async fn month_dates(
    State(state): State<AppState>,
    query: Result<Query<MonthQuery>, QueryRejection>,
) -> ApiResult<Json<DatesResponse>> {
    let Query(query) = query?;
    query.validate()?;

    let snapshot = state.dataset.read().await;
    Ok(Json(DatesResponse {
        year: query.year,
        month: query.month,
        dates: snapshot.dataset.month_dates(query.year, query.month),
    }))
}

/// GET /api/comparison?dates=YYYY-MM-DD,YYYY-MM-DD
pub async fn compare_days(
    State(state): State<AppState>,
    query: Result<Query<ComparisonQuery>, QueryRejection>,
) -> ApiResult<Json<ComparisonResponse>> {
    let Query(query) = query?;
    let mut dates = Vec::new();
    for text in query.dates.split(',').filter(|s| !s.trim().is_empty()) {
        let date = parse_date(text)?;
        if !dates.contains(&date) {
            dates.push(date);
        }
    }

    if dates.is_empty() {
        return Err(ApiError::BadRequest("at least one date is required".to_string()));
    }
    if dates.len() > MAX_COMPARED_DAYS {
        return Err(ApiError::BadRequest(format!(
            "at most {} dates can be compared",
            MAX_COMPARED_DAYS
        )));
    }

    let snapshot = state.dataset.read().await;
    let records = snapshot.dataset.select_days(&dates);
    let series = snapshot.dataset.compare_days(&dates);
    let timestamps: Vec<_> = records.iter().map(|r| r.fecha).collect();

    Ok(Json(ComparisonResponse {
        export_file: export_file_name(&timestamps),
        dates,
        records,
        series,
    }))
}

/// Build day routes
pub fn day_routes() -> Router<AppState> {
    Router::new()
        .route("/api/days", get(month_dates))
        .route("/api/days/:date", get(day_view))
        .route("/api/comparison", get(compare_days))
}

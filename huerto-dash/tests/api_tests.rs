//! Integration tests for huerto-dash API endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;

use huerto_dash::models::{DayState, LabeledDataset, LabeledRecord, Snapshot};
use huerto_dash::services::ModelArtifact;
use huerto_dash::solar::SolarCalendar;
use huerto_dash::AppState;

/// temperature > 15 predicts day
const MODEL: &str = r#"{
    "feature_names": ["Temperatura", "Humedad", "Conductibilidad"],
    "head": { "kind": "logistic", "coefficients": [1.0, 0.0, 0.0], "intercept": -15.0 }
}"#;

fn record(m: u32, d: u32, hh: u32, t: f64, estado: DayState) -> LabeledRecord {
    LabeledRecord {
        fecha: NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(hh, 0, 0)
            .unwrap(),
        temperatura: t,
        humedad: 40.0,
        conductibilidad: 250.0,
        estado,
    }
}

fn sample_snapshot() -> Snapshot {
    Snapshot {
        dataset: LabeledDataset::new(vec![
            record(3, 8, 10, 14.0, DayState::Day),
            record(3, 8, 11, 16.0, DayState::Day),
            record(3, 9, 3, 9.0, DayState::Night),
            record(4, 1, 12, 19.0, DayState::Day),
        ]),
        refreshed_at: Some(chrono::Utc::now()),
    }
}

/// Test helper: state over an in-memory database
async fn create_test_state(with_model: bool) -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    huerto_dash::db::init_tables(&pool)
        .await
        .expect("Failed to initialize database schema");

    let calendar = Arc::new(SolarCalendar::embedded().expect("embedded calendar"));
    let state = AppState::new(pool, calendar).with_snapshot(sample_snapshot());

    if with_model {
        state.with_classifier(Arc::new(ModelArtifact::from_json(MODEL).unwrap()))
    } else {
        state
    }
}

async fn send(state: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let app = huerto_dash::build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    send(state, "GET", uri).await
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = get(create_test_state(true).await, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "huerto-dash");
    assert_eq!(json["records"], 4);
    assert_eq!(json["classifier_loaded"], true);
    assert_eq!(json["refresh_available"], false);
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_dataset_overview_and_months() {
    let state = create_test_state(false).await;

    let (status, json) = get(state.clone(), "/api/dataset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"], 4);
    assert_eq!(json["years"], serde_json::json!([2024]));

    let (status, json) = get(state.clone(), "/api/dataset/months?year=2024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["months"], serde_json::json!([3, 4]));

    let (_, json) = get(state, "/api/dataset/months?year=2023").await;
    assert_eq!(json["months"], serde_json::json!([]));
}

#[tokio::test]
async fn test_month_records() {
    let state = create_test_state(false).await;

    let (status, json) = get(state.clone(), "/api/records?year=2024&month=3").await;
    assert_eq!(status, StatusCode::OK);
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["Fecha"], "2024-03-08T10:00:00");
    assert_eq!(records[0]["Estado"], 1);
    assert_eq!(records[2]["Estado"], 0);

    let (status, _) = get(state.clone(), "/api/records?year=2024&month=13").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = get(state, "/api/records?year=2024").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_query_strings_answer_json() {
    let state = create_test_state(false).await;

    for uri in [
        "/api/dataset/months?year=abc",
        "/api/dataset/months",
        "/api/records?year=2024&month=march",
        "/api/days?month=3",
        "/api/comparison",
    ] {
        let (status, json) = get(state.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json["error"]["code"], "BAD_REQUEST", "{}", uri);
        assert!(json["error"]["message"].as_str().is_some_and(|m| !m.is_empty()), "{}", uri);
    }
}

#[tokio::test]
async fn test_day_view_with_classifier() {
    let (status, json) = get(create_test_state(true).await, "/api/days/2024-03-08").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["hours"], 2);
    assert_eq!(json["summary"]["temperatura_media"], 15.0);
    assert_eq!(json["export_file"], "2024-03-08.png");
    assert_eq!(json["predictions"], serde_json::json!([0, 1]));
    assert_eq!(json["metrics"]["accuracy"], 0.5);
    assert_eq!(json["metrics"]["precision"], 1.0);
}

#[tokio::test]
async fn test_day_view_without_classifier() {
    let (status, json) = get(create_test_state(false).await, "/api/days/2024-03-08").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"].as_array().unwrap().len(), 2);
    assert!(json.get("predictions").is_none());
    assert!(json.get("metrics").is_none());
}

#[tokio::test]
async fn test_day_view_errors() {
    let state = create_test_state(false).await;

    let (status, json) = get(state.clone(), "/api/days/2024-03-10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, json) = get(state, "/api/days/08-03-2024").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_candidate_dates() {
    let (status, json) = get(create_test_state(false).await, "/api/days?year=2024&month=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dates"], serde_json::json!(["2024-03-08", "2024-03-09"]));
}

#[tokio::test]
async fn test_comparison() {
    let state = create_test_state(false).await;

    let (status, json) = get(state.clone(), "/api/comparison?dates=2024-03-09,2024-03-08,2024-03-09").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dates"], serde_json::json!(["2024-03-09", "2024-03-08"]));
    assert_eq!(json["records"].as_array().unwrap().len(), 3);
    assert_eq!(json["series"].as_array().unwrap().len(), 2);
    assert_eq!(json["series"][1]["temperatura"][1]["hour"], 11);
    assert_eq!(json["export_file"], "2024-03.png");

    let (status, _) = get(state.clone(), "/api/comparison?dates=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(state, "/api/comparison?dates=2024-03-08,tomorrow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_solar_warnings() {
    let (status, json) = get(create_test_state(false).await, "/api/solar/warnings").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 8);
    assert_eq!(json["warnings"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_refresh_without_credentials() {
    let state = create_test_state(false).await;

    let (status, json) = send(state.clone(), "POST", "/api/refresh").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");

    // Served dataset untouched, failure visible in health
    let (_, json) = get(state, "/health").await;
    assert_eq!(json["records"], 4);
    assert_eq!(json["status"], "degraded");
    assert!(json["last_error"].as_str().unwrap().contains("credentials"));
}

#[tokio::test]
async fn test_refresh_rejected_while_running() {
    let state = create_test_state(false).await;
    let _running = state.refresh_guard.clone().try_lock_owned().unwrap();

    let (status, json) = send(state, "POST", "/api/refresh").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

//! huerto-dash library interface
//!
//! Exposes the pipeline, cache, and HTTP API for the binary and for
//! integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod solar;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;

use crate::models::Snapshot;
use crate::services::{DayNightClassifier, Pipeline};
use crate::solar::SolarCalendar;

/// Application state shared across handlers
///
/// Built once at startup; nothing in the crate keeps ambient global state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (dataset cache)
    pub db: SqlitePool,
    /// Dataset currently served
    pub dataset: Arc<RwLock<Snapshot>>,
    /// Loaded classifier, if an artifact was found
    pub classifier: Option<Arc<dyn DayNightClassifier>>,
    /// Sunrise/sunset table
    pub calendar: Arc<SolarCalendar>,
    /// Telemetry pipeline; `None` without API credentials
    pub pipeline: Option<Arc<Pipeline>>,
    /// Held for the duration of a refresh
    pub refresh_guard: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, calendar: Arc<SolarCalendar>) -> Self {
        Self {
            db,
            dataset: Arc::new(RwLock::new(Snapshot::default())),
            classifier: None,
            calendar,
            pipeline: None,
            refresh_guard: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.dataset = Arc::new(RwLock::new(snapshot));
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn DayNightClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::dataset_routes())
        .merge(api::day_routes())
        .merge(api::solar_routes())
        .merge(api::refresh_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Dataset refresh
//!
//! Runs the pipeline, persists the result, then swaps the served snapshot.
//! Only one refresh runs at a time; a failed refresh leaves both the cache
//! and the served snapshot as they were. The work runs on its own task, so a
//! caller that goes away does not cancel a refresh once it has started.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use super::pipeline::PipelineError;
use crate::models::Snapshot;
use crate::AppState;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("A refresh is already running")]
    InProgress,

    #[error("Refresh unavailable: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to persist dataset: {0}")]
    Cache(#[from] huerto_common::Error),

    /// The refresh task panicked or was aborted by the runtime
    #[error("Refresh task ended abnormally: {0}")]
    Aborted(String),
}

/// Result of a successful refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub records: usize,
    pub refreshed_at: DateTime<Utc>,
}

/// Rebuild the dataset from the telemetry API
///
/// Returns `InProgress` at once when another refresh holds the guard.
/// Otherwise the guard moves into a background task, which finishes the
/// refresh and its bookkeeping even if this future is dropped.
pub async fn refresh_dataset(state: &AppState) -> Result<RefreshSummary, RefreshError> {
    let guard = state
        .refresh_guard
        .clone()
        .try_lock_owned()
        .map_err(|_| RefreshError::InProgress)?;

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let _guard = guard;
        let result = run_refresh(&task_state).await;

        match &result {
            Ok(summary) => {
                info!(records = summary.records, "Dataset refreshed");
                *task_state.last_error.write().await = None;
            }
            Err(e) => {
                error!(error = %e, "Dataset refresh failed");
                *task_state.last_error.write().await = Some(e.to_string());
            }
        }

        result
    });

    handle
        .await
        .map_err(|e| RefreshError::Aborted(e.to_string()))?
}

async fn run_refresh(state: &AppState) -> Result<RefreshSummary, RefreshError> {
    let pipeline = state.pipeline.as_ref().ok_or_else(|| {
        RefreshError::NotConfigured("telemetry API credentials are not configured".to_string())
    })?;

    let refreshed_at = huerto_common::time::now();
    let dataset = pipeline.run(refreshed_at).await?;

    crate::db::save_snapshot(&state.db, &dataset, refreshed_at).await?;

    let records = dataset.len();
    *state.dataset.write().await = Snapshot {
        dataset,
        refreshed_at: Some(refreshed_at),
    };

    Ok(RefreshSummary {
        records,
        refreshed_at,
    })
}

//! Services for huerto-dash

pub mod classifier;
pub mod pipeline;
pub mod refresh;
pub mod resampler;
pub mod telemetry_client;

pub use classifier::{ClassificationMetrics, DayNightClassifier, ModelArtifact, ModelError};
pub use pipeline::{build_dataset, Pipeline, PipelineError};
pub use refresh::{refresh_dataset, RefreshError, RefreshSummary};
pub use resampler::{merge, merge_and_resample, resample_hourly, MergedRow, ResampleError};
pub use telemetry_client::{FetchOutcome, TelemetryClient, TelemetryError, TimeRange};

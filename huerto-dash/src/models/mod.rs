//! Data models

pub mod dataset;
pub mod record;
pub mod telemetry;

pub use dataset::{export_file_name, DayComparison, DaySummary, HourValue, LabeledDataset, Snapshot};
pub use record::{DayState, FeatureRow, HourlyReading, LabeledRecord, FEATURE_COLUMNS};
pub use telemetry::{Channel, ChannelSeries, TelemetryPoint, TimestampedSeries};

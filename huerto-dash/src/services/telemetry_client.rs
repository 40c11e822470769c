//! Telemetry API client
//!
//! Pulls soil readings for each sensor node from the SenseCAP open API and
//! demultiplexes the measurement channels. Devices are queried strictly one
//! after another.
//!
//! Response shape (`data.list`):
//! - element 0: `[[channel, "4102"], [channel, "4103"], ...]`, the type codes
//!   present, in block order
//! - remaining elements: value blocks, each `[[value, "timestamp"], ...]`,
//!   in the same order as the type codes
//!
//! Only the first three block positions are meaningful. A type code missing
//! from the list gives that channel no points for the device.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Channel, ChannelSeries, TelemetryPoint};
use huerto_common::config::Credentials;
use huerto_common::time::{epoch_millis, truncate_to_second};

const USER_AGENT: &str = concat!("huerto-dash/", env!("CARGO_PKG_VERSION"));

/// Value blocks the API can address by position
const MAX_BLOCKS: usize = 3;

/// Telemetry client errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Transport error or non-200 status for one device
    #[error("Network error for device {device}: {message}")]
    NetworkFailure { device: String, message: String },

    /// Response body does not have the expected shape
    #[error("Malformed response for device {device}: {reason}")]
    MalformedResponse { device: String, reason: String },

    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("No devices configured")]
    NoDevices,

    /// Every configured device was skipped; nothing was fetched
    #[error("All {devices} devices failed to respond")]
    AllDevicesFailed { devices: usize },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Requested window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TelemetryError> {
        if start > end {
            return Err(TelemetryError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Series accumulated across devices plus the devices that were skipped
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub series: ChannelSeries,
    pub skipped_devices: Vec<String>,
}

/// Telemetry API client
pub struct TelemetryClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    channel_index: u32,
}

impl TelemetryClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        channel_index: u32,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            credentials,
            channel_index,
        })
    }

    /// Fetch every device in order and accumulate their series
    ///
    /// Network failures skip the device. A malformed body aborts the whole
    /// fetch and discards what was gathered so far. Skipping every device is
    /// an error, never an empty success.
    pub async fn fetch_all(
        &self,
        devices: &[String],
        range: &TimeRange,
    ) -> Result<FetchOutcome, TelemetryError> {
        if devices.is_empty() {
            return Err(TelemetryError::NoDevices);
        }

        let mut outcome = FetchOutcome::default();

        for device in devices {
            match self.fetch_device(device, range).await {
                Ok(series) => {
                    info!(
                        device = %device,
                        temperature = series.temperature.len(),
                        humidity = series.humidity.len(),
                        conductivity = series.conductivity.len(),
                        "Fetched device telemetry"
                    );
                    outcome.series.absorb(series);
                }
                Err(TelemetryError::NetworkFailure { device, message }) => {
                    warn!(device = %device, "Skipping device: {}", message);
                    outcome.skipped_devices.push(device);
                }
                Err(e) => return Err(e),
            }
        }

        if outcome.skipped_devices.len() == devices.len() {
            return Err(TelemetryError::AllDevicesFailed {
                devices: devices.len(),
            });
        }

        Ok(outcome)
    }

    /// Fetch and demultiplex one device
    pub async fn fetch_device(
        &self,
        device: &str,
        range: &TimeRange,
    ) -> Result<ChannelSeries, TelemetryError> {
        let network = |message: String| TelemetryError::NetworkFailure {
            device: device.to_string(),
            message,
        };

        let params = [
            ("device_eui", device.to_string()),
            ("channel_index", self.channel_index.to_string()),
            ("time_start", epoch_millis(range.start).to_string()),
            ("time_end", epoch_millis(range.end).to_string()),
        ];

        debug!(device = %device, "Querying telemetry API");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&params)
            .basic_auth(&self.credentials.key_id, Some(&self.credentials.secret))
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(network(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await.map_err(|e| network(e.to_string()))?;
        let json: Value = serde_json::from_str(&body).map_err(|e| TelemetryError::MalformedResponse {
            device: device.to_string(),
            reason: format!("body is not JSON: {}", e),
        })?;

        parse_device_response(device, &json)
    }
}

/// Demultiplex one device's `data.list` payload into channel series
pub fn parse_device_response(device: &str, body: &Value) -> Result<ChannelSeries, TelemetryError> {
    let malformed = |reason: String| TelemetryError::MalformedResponse {
        device: device.to_string(),
        reason,
    };

    let list = body
        .pointer("/data/list")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing data.list".to_string()))?;

    let (header, rest) = list
        .split_first()
        .ok_or_else(|| malformed("empty data.list".to_string()))?;

    let type_codes = header
        .as_array()
        .ok_or_else(|| malformed("type code list is not an array".to_string()))?
        .iter()
        .map(|entry| entry.get(1).and_then(Value::as_str))
        .collect::<Option<Vec<&str>>>()
        .ok_or_else(|| malformed("type code entry is not [_, code]".to_string()))?;

    let mut blocks = Vec::new();
    for group in rest {
        let group = group
            .as_array()
            .ok_or_else(|| malformed("value block group is not an array".to_string()))?;
        blocks.extend(group.iter());
    }

    let mut series = ChannelSeries::default();
    for channel in Channel::ALL {
        let Some(position) = type_codes.iter().position(|code| *code == channel.type_code()) else {
            debug!(device = %device, column = channel.column(), "Channel absent from response");
            continue;
        };

        if position >= MAX_BLOCKS {
            debug!(device = %device, code = channel.type_code(), position, "Channel beyond addressable blocks");
            continue;
        }

        let block = blocks.get(position).ok_or_else(|| {
            malformed(format!(
                "type code {} at position {} has no value block",
                channel.type_code(),
                position
            ))
        })?;

        let points = parse_block(block).map_err(|reason| {
            malformed(format!("type code {}: {}", channel.type_code(), reason))
        })?;
        series.insert_points(channel, points);
    }

    Ok(series)
}

fn parse_block(block: &Value) -> Result<Vec<TelemetryPoint>, String> {
    let entries = block
        .as_array()
        .ok_or_else(|| "value block is not an array".to_string())?;

    entries
        .iter()
        .map(|entry| {
            let value = entry
                .get(0)
                .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .ok_or_else(|| format!("reading {} has no numeric value", entry))?;
            let text = entry
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| format!("reading {} has no timestamp", entry))?;
            let at = parse_api_timestamp(text)
                .ok_or_else(|| format!("unparseable timestamp {:?}", text))?;
            Ok(TelemetryPoint { at, value })
        })
        .collect()
}

/// Parse an API timestamp to second-precision wall-clock time
///
/// Offsets are not applied: the clock time as written is kept.
pub fn parse_api_timestamp(text: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let text = text.trim();
    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        })?;

    Some(truncate_to_second(parsed))
}

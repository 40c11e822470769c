//! Raw telemetry channels and timestamp-keyed series

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Soil measurement channels reported by each sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Humidity,
    Conductivity,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Temperature, Channel::Humidity, Channel::Conductivity];

    /// Measurement type code used by the telemetry API
    pub fn type_code(self) -> &'static str {
        match self {
            Channel::Temperature => "4102",
            Channel::Humidity => "4103",
            Channel::Conductivity => "4108",
        }
    }

    /// Dataset column the channel feeds
    pub fn column(self) -> &'static str {
        match self {
            Channel::Temperature => "Temperatura",
            Channel::Humidity => "Humedad",
            Channel::Conductivity => "Conductibilidad",
        }
    }
}

/// One reading as delivered by the API, at second precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPoint {
    pub at: NaiveDateTime,
    pub value: f64,
}

/// Readings of one channel keyed by exact timestamp
///
/// Inserting an existing timestamp replaces the earlier value.
pub type TimestampedSeries = BTreeMap<NaiveDateTime, f64>;

/// The three channel series accumulated across devices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSeries {
    pub temperature: TimestampedSeries,
    pub humidity: TimestampedSeries,
    pub conductivity: TimestampedSeries,
}

impl ChannelSeries {
    pub fn series(&self, channel: Channel) -> &TimestampedSeries {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Humidity => &self.humidity,
            Channel::Conductivity => &self.conductivity,
        }
    }

    pub fn series_mut(&mut self, channel: Channel) -> &mut TimestampedSeries {
        match channel {
            Channel::Temperature => &mut self.temperature,
            Channel::Humidity => &mut self.humidity,
            Channel::Conductivity => &mut self.conductivity,
        }
    }

    /// Record points for a channel, last write wins
    pub fn insert_points(&mut self, channel: Channel, points: impl IntoIterator<Item = TelemetryPoint>) {
        let series = self.series_mut(channel);
        for point in points {
            series.insert(point.at, point.value);
        }
    }

    /// Merge another device's series in; its values win on equal timestamps
    pub fn absorb(&mut self, other: ChannelSeries) {
        self.temperature.extend(other.temperature);
        self.humidity.extend(other.humidity);
        self.conductivity.extend(other.conductivity);
    }

    pub fn point_count(&self) -> usize {
        self.temperature.len() + self.humidity.len() + self.conductivity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

//! Hourly rows before and after labeling

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Feature column names, in the order the classifier was trained with
pub const FEATURE_COLUMNS: [&str; 3] = ["Temperatura", "Humedad", "Conductibilidad"];

/// Temperatura, Humedad, Conductibilidad
pub type FeatureRow = [f64; 3];

/// Day/night state ("Estado"), stored as 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DayState {
    Night,
    Day,
}

impl DayState {
    pub fn as_u8(self) -> u8 {
        match self {
            DayState::Night => 0,
            DayState::Day => 1,
        }
    }
}

impl From<DayState> for u8 {
    fn from(state: DayState) -> Self {
        state.as_u8()
    }
}

impl TryFrom<u8> for DayState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DayState::Night),
            1 => Ok(DayState::Day),
            other => Err(format!("Estado must be 0 or 1, got {}", other)),
        }
    }
}

/// One hour bucket after resampling; absent channels are `None`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyReading {
    #[serde(rename = "Fecha")]
    pub fecha: NaiveDateTime,
    #[serde(rename = "Temperatura")]
    pub temperatura: Option<f64>,
    #[serde(rename = "Humedad")]
    pub humedad: Option<f64>,
    #[serde(rename = "Conductibilidad")]
    pub conductibilidad: Option<f64>,
}

impl HourlyReading {
    /// Attach a label; `None` when any reading is missing
    pub fn into_labeled(self, estado: DayState) -> Option<LabeledRecord> {
        Some(LabeledRecord {
            fecha: self.fecha,
            temperatura: self.temperatura?,
            humedad: self.humedad?,
            conductibilidad: self.conductibilidad?,
            estado,
        })
    }
}

/// A complete, labeled hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(rename = "Fecha")]
    pub fecha: NaiveDateTime,
    #[serde(rename = "Temperatura")]
    pub temperatura: f64,
    #[serde(rename = "Humedad")]
    pub humedad: f64,
    #[serde(rename = "Conductibilidad")]
    pub conductibilidad: f64,
    #[serde(rename = "Estado")]
    pub estado: DayState,
}

impl LabeledRecord {
    pub fn features(&self) -> FeatureRow {
        [self.temperatura, self.humedad, self.conductibilidad]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_incomplete_reading_is_not_labeled() {
        let reading = HourlyReading {
            fecha: noon(),
            temperatura: None,
            humedad: Some(40.0),
            conductibilidad: Some(120.0),
        };
        assert!(reading.into_labeled(DayState::Day).is_none());
    }

    #[test]
    fn test_record_serializes_with_dataset_column_names() {
        let reading = HourlyReading {
            fecha: noon(),
            temperatura: Some(21.5),
            humedad: Some(40.0),
            conductibilidad: Some(120.0),
        };
        let record = reading.into_labeled(DayState::Day).unwrap();
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["Fecha"], "2024-05-05T12:00:00");
        assert_eq!(json["Temperatura"], 21.5);
        assert_eq!(json["Estado"], 1);
        assert_eq!(record.features(), [21.5, 40.0, 120.0]);
    }

    #[test]
    fn test_day_state_rejects_other_values() {
        assert_eq!(DayState::try_from(0), Ok(DayState::Night));
        assert!(DayState::try_from(2).is_err());
        assert!(serde_json::from_str::<DayState>("3").is_err());
    }
}

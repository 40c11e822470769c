//! Dataset pipeline: fetch, merge, resample, label, drop incomplete hours

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::resampler::{merge_and_resample, ResampleError};
use super::telemetry_client::{TelemetryClient, TelemetryError, TimeRange};
use crate::models::{ChannelSeries, LabeledDataset};
use crate::solar::{DayNightLabeler, LabelError, SolarCalendar};
use huerto_common::time::start_of_day_utc;

/// Pipeline failures; any of them aborts the run without a partial dataset
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),

    #[error("Labeling hour {at} failed: {source}")]
    Labeling {
        at: NaiveDateTime,
        #[source]
        source: LabelError,
    },
}

/// Turn raw channel series into the labeled dataset
///
/// Every resampled hour is labeled before incomplete hours are dropped, so a
/// calendar gap fails the run even on an hour that would have been dropped.
pub fn build_dataset(
    series: &ChannelSeries,
    calendar: &SolarCalendar,
) -> Result<LabeledDataset, PipelineError> {
    let hourly = merge_and_resample(series)?;
    let labeler = DayNightLabeler::new(calendar);

    let mut labeled = Vec::with_capacity(hourly.len());
    for reading in &hourly {
        let estado = labeler
            .label(reading.fecha)
            .map_err(|source| PipelineError::Labeling {
                at: reading.fecha,
                source,
            })?;
        labeled.push((*reading, estado));
    }

    let records: Vec<_> = labeled
        .into_iter()
        .filter_map(|(reading, estado)| reading.into_labeled(estado))
        .collect();

    debug!(
        hours = hourly.len(),
        complete = records.len(),
        dropped = hourly.len() - records.len(),
        "Labeled hourly readings"
    );

    Ok(LabeledDataset::new(records))
}

/// Fetches every configured device from a fixed epoch up to "now"
pub struct Pipeline {
    client: TelemetryClient,
    calendar: Arc<SolarCalendar>,
    devices: Vec<String>,
    epoch_start: NaiveDate,
}

impl Pipeline {
    pub fn new(
        client: TelemetryClient,
        calendar: Arc<SolarCalendar>,
        devices: Vec<String>,
        epoch_start: NaiveDate,
    ) -> Self {
        Self {
            client,
            calendar,
            devices,
            epoch_start,
        }
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Run the whole pipeline for `[epoch start, now)`
    pub async fn run(&self, now: DateTime<Utc>) -> Result<LabeledDataset, PipelineError> {
        let range = TimeRange::new(start_of_day_utc(self.epoch_start), now)?;
        info!(
            devices = self.devices.len(),
            start = %range.start(),
            end = %range.end(),
            "Running dataset pipeline"
        );

        let outcome = self.client.fetch_all(&self.devices, &range).await?;
        let dataset = build_dataset(&outcome.series, &self.calendar)?;

        info!(
            records = dataset.len(),
            skipped_devices = outcome.skipped_devices.len(),
            "Dataset pipeline complete"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, DayState, TelemetryPoint};
    use crate::solar::calendar::uniform_calendar;

    fn at(m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn all_channels(series: &mut ChannelSeries, at: NaiveDateTime, base: f64) {
        for (i, channel) in Channel::ALL.into_iter().enumerate() {
            series.insert_points(
                channel,
                [TelemetryPoint {
                    at,
                    value: base + i as f64,
                }],
            );
        }
    }

    #[test]
    fn test_incomplete_hours_are_dropped() {
        let calendar = SolarCalendar::load_str(&uniform_calendar("07:00", "19:00")).unwrap();
        let mut series = ChannelSeries::default();
        all_channels(&mut series, at(5, 1, 6, 10), 10.0);
        all_channels(&mut series, at(5, 1, 12, 20), 20.0);
        series.insert_points(
            Channel::Temperature,
            [TelemetryPoint {
                at: at(5, 1, 9, 0),
                value: 15.0,
            }],
        );

        let dataset = build_dataset(&series, &calendar).unwrap();
        let hours: Vec<_> = dataset.records().iter().map(|r| r.fecha).collect();
        assert_eq!(hours, vec![at(5, 1, 6, 0), at(5, 1, 12, 0)]);
        assert_eq!(dataset.records()[0].estado, DayState::Night);
        assert_eq!(dataset.records()[1].estado, DayState::Day);
        assert_eq!(dataset.records()[1].humedad, 21.0);
    }

    #[test]
    fn test_empty_series_gives_empty_dataset() {
        let calendar = SolarCalendar::load_str(&uniform_calendar("07:00", "19:00")).unwrap();
        let dataset = build_dataset(&ChannelSeries::default(), &calendar).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_lookup_failure_aborts_even_for_incomplete_hour() {
        let text = uniform_calendar("07:00", "19:00").replace(
            "Febrero = [[\"07:00\", \"19:00\"], ",
            "Febrero = [",
        );
        let calendar = SolarCalendar::parse(&text).unwrap();

        let mut series = ChannelSeries::default();
        all_channels(&mut series, at(2, 28, 12, 0), 10.0);
        series.insert_points(
            Channel::Temperature,
            [TelemetryPoint {
                at: at(2, 29, 12, 0),
                value: 11.0,
            }],
        );

        let err = build_dataset(&series, &calendar).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Labeling {
                source: LabelError::LookupFailure { day: 29, rows: 28, .. },
                ..
            }
        ));
    }
}

//! Labeled dataset and the dashboard queries over it

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::record::{FeatureRow, LabeledRecord};

/// Ordered, timestamp-unique sequence of labeled hours
///
/// This is the unit that is cached, browsed, and fed to the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledDataset {
    records: Vec<LabeledRecord>,
}

/// The dataset currently served, with the time it was produced
///
/// `refreshed_at` is `None` until the first successful refresh or cache load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub dataset: LabeledDataset,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Mean readings of one calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub hours: usize,
    pub temperatura_media: f64,
    pub humedad_media: f64,
    pub conductibilidad_media: f64,
}

/// A reading positioned by hour of day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourValue {
    pub hour: u32,
    pub value: f64,
}

/// Per-column hourly series of one day, for overlaying several days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayComparison {
    pub date: NaiveDate,
    pub temperatura: Vec<HourValue>,
    pub humedad: Vec<HourValue>,
    pub conductibilidad: Vec<HourValue>,
}

impl LabeledDataset {
    /// Build from records in any order; the first record wins on duplicate timestamps
    pub fn new(mut records: Vec<LabeledRecord>) -> Self {
        records.sort_by_key(|r| r.fecha);
        records.dedup_by_key(|r| r.fecha);
        Self { records }
    }

    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LabeledRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature matrix in [`super::record::FEATURE_COLUMNS`] order
    pub fn features(&self) -> Vec<FeatureRow> {
        self.records.iter().map(LabeledRecord::features).collect()
    }

    /// Records with `start <= fecha < end`
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[LabeledRecord] {
        let lo = self.records.partition_point(|r| r.fecha < start);
        let hi = self.records.partition_point(|r| r.fecha < end).max(lo);
        &self.records[lo..hi]
    }

    /// Distinct years, ascending
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.fecha.year()).collect();
        years.dedup();
        years
    }

    /// Distinct months of a year, ascending
    pub fn months(&self, year: i32) -> Vec<u32> {
        let mut months: Vec<u32> = self
            .records
            .iter()
            .filter(|r| r.fecha.year() == year)
            .map(|r| r.fecha.month())
            .collect();
        months.dedup();
        months
    }

    /// Records of one month
    pub fn month(&self, year: i32, month: u32) -> &[LabeledRecord] {
        match month_bounds(year, month) {
            Some((start, end)) => self.between(start, end),
            None => &[],
        }
    }

    /// Records of one calendar day
    pub fn day(&self, date: NaiveDate) -> &[LabeledRecord] {
        match date.succ_opt() {
            Some(next) => self.between(date.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN)),
            None => &[],
        }
    }

    /// Mean readings for a day; `None` when the day has no records
    pub fn day_summary(&self, date: NaiveDate) -> Option<DaySummary> {
        let records = self.day(date);
        if records.is_empty() {
            return None;
        }

        let count = records.len() as f64;
        let mean = |pick: fn(&LabeledRecord) -> f64| records.iter().map(pick).sum::<f64>() / count;

        Some(DaySummary {
            date,
            hours: records.len(),
            temperatura_media: mean(|r| r.temperatura),
            humedad_media: mean(|r| r.humedad),
            conductibilidad_media: mean(|r| r.conductibilidad),
        })
    }

    /// Every calendar date from the first to the last record of a month
    ///
    /// These are the candidate days offered for multi-day charts, so days
    /// without records inside the span are included.
    pub fn month_dates(&self, year: i32, month: u32) -> Vec<NaiveDate> {
        let records = self.month(year, month);
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Vec::new();
        };

        first
            .fecha
            .date()
            .iter_days()
            .take_while(|d| *d <= last.fecha.date())
            .collect()
    }

    /// Records of the selected days, in timestamp order
    pub fn select_days(&self, dates: &[NaiveDate]) -> Vec<LabeledRecord> {
        self.records
            .iter()
            .filter(|r| dates.contains(&r.fecha.date()))
            .copied()
            .collect()
    }

    /// One hourly series per selected day and column
    pub fn compare_days(&self, dates: &[NaiveDate]) -> Vec<DayComparison> {
        dates
            .iter()
            .map(|&date| {
                let records = self.day(date);
                let series = |pick: fn(&LabeledRecord) -> f64| -> Vec<HourValue> {
                    records
                        .iter()
                        .map(|r| HourValue {
                            hour: r.fecha.hour(),
                            value: pick(r),
                        })
                        .collect()
                };
                DayComparison {
                    date,
                    temperatura: series(|r| r.temperatura),
                    humedad: series(|r| r.humedad),
                    conductibilidad: series(|r| r.conductibilidad),
                }
            })
            .collect()
    }
}

/// `[first instant of month, first instant of next month)`
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN)))
}

/// PNG file name for a chart over the given timestamps
///
/// `YYYY-MM-DD.png` when all fall on one date, otherwise `YYYY-MM.png` of the
/// first timestamp's month.
pub fn export_file_name(timestamps: &[NaiveDateTime]) -> Option<String> {
    let first = timestamps.first()?;
    let single_day = timestamps.iter().all(|t| t.date() == first.date());

    Some(if single_day {
        format!("{}.png", first.format("%Y-%m-%d"))
    } else {
        format!("{}.png", first.format("%Y-%m"))
    })
}

//! Series merging and hourly resampling
//!
//! Each channel becomes a two-column frame (`Fecha`, value). The three frames
//! are full-joined on exact `Fecha`, then averaged into one-hour windows with
//! `group_by_dynamic`. Each column is averaged independently; a bucket with no
//! points for a column yields `None`. The buckets are finally reindexed onto a
//! contiguous hourly grid.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;

use crate::models::{Channel, ChannelSeries, HourlyReading};

const FECHA: &str = "Fecha";
const HOUR_MS: usize = 3_600_000;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("Timestamp {0} ms is out of range")]
    TimestampOutOfRange(i64),

    #[error("Null timestamp in merged frame")]
    NullTimestamp,
}

/// One row of the outer join
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedRow {
    pub at: NaiveDateTime,
    pub temperatura: Option<f64>,
    pub humedad: Option<f64>,
    pub conductibilidad: Option<f64>,
}

impl From<MergedRow> for HourlyReading {
    fn from(row: MergedRow) -> Self {
        HourlyReading {
            fecha: row.at,
            temperatura: row.temperatura,
            humedad: row.humedad,
            conductibilidad: row.conductibilidad,
        }
    }
}

fn to_millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

fn from_millis(ms: i64) -> Result<NaiveDateTime, ResampleError> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .ok_or(ResampleError::TimestampOutOfRange(ms))
}

/// Naive (zone-less) millisecond datetimes; device wall clock is kept as is
fn datetime_ms() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

fn channel_frame(series: &ChannelSeries, channel: Channel) -> PolarsResult<LazyFrame> {
    let points = series.series(channel);
    let fecha: Vec<i64> = points.keys().map(|at| to_millis(*at)).collect();
    let values: Vec<f64> = points.values().copied().collect();

    let frame = df!(FECHA => fecha, channel.column() => values)?;
    Ok(frame.lazy().with_column(col(FECHA).cast(datetime_ms())))
}

/// Full join of the three channel frames on `Fecha`, ascending
fn merged_frame(series: &ChannelSeries) -> PolarsResult<LazyFrame> {
    let mut merged = channel_frame(series, Channel::Temperature)?;
    for channel in [Channel::Humidity, Channel::Conductivity] {
        merged = merged.join(
            channel_frame(series, channel)?,
            [col(FECHA)],
            [col(FECHA)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }
    Ok(merged.sort([FECHA], SortMultipleOptions::default()))
}

/// Read `Fecha` (as epoch millis) and the three value columns back out
fn frame_rows(frame: &DataFrame) -> Result<Vec<MergedRow>, ResampleError> {
    let fecha = frame.column(FECHA)?.i64()?;
    let temperatura = frame.column(Channel::Temperature.column())?.f64()?;
    let humedad = frame.column(Channel::Humidity.column())?.f64()?;
    let conductibilidad = frame.column(Channel::Conductivity.column())?.f64()?;

    fecha
        .into_iter()
        .zip(temperatura)
        .zip(humedad)
        .zip(conductibilidad)
        .map(|(((at, temperatura), humedad), conductibilidad)| {
            Ok(MergedRow {
                at: from_millis(at.ok_or(ResampleError::NullTimestamp)?)?,
                temperatura,
                humedad,
                conductibilidad,
            })
        })
        .collect()
}

/// Outer join on exact timestamp, ascending, one row per distinct timestamp
pub fn merge(series: &ChannelSeries) -> Result<Vec<MergedRow>, ResampleError> {
    if series.is_empty() {
        return Ok(Vec::new());
    }

    let frame = merged_frame(series)?
        .with_column(col(FECHA).cast(DataType::Int64))
        .collect()?;
    frame_rows(&frame)
}

/// Hourly means of a merged frame, reindexed onto a contiguous grid
fn hourly_readings(merged: LazyFrame) -> Result<Vec<HourlyReading>, ResampleError> {
    let buckets = merged
        .sort([FECHA], SortMultipleOptions::default())
        .group_by_dynamic(
            col(FECHA),
            Vec::<Expr>::new(),
            DynamicGroupOptions {
                every: Duration::parse("1h"),
                period: Duration::parse("1h"),
                offset: Duration::parse("0h"),
                closed_window: ClosedWindow::Left,
                label: Label::Left,
                ..Default::default()
            },
        )
        .agg(Channel::ALL.map(|channel| col(channel.column()).mean()))
        .with_column(col(FECHA).cast(DataType::Int64))
        .collect()?;

    let fecha = buckets.column(FECHA)?.i64()?;
    let (Some(first), Some(last)) = (fecha.min(), fecha.max()) else {
        return Ok(Vec::new());
    };

    let grid: Vec<i64> = (first..=last).step_by(HOUR_MS).collect();
    let frame = df!(FECHA => grid)?
        .lazy()
        .join(
            buckets.lazy(),
            [col(FECHA)],
            [col(FECHA)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([FECHA], SortMultipleOptions::default())
        .collect()?;

    Ok(frame_rows(&frame)?.into_iter().map(HourlyReading::from).collect())
}

/// Average merged rows into a contiguous hourly grid
///
/// The grid runs from the bucket of the first row to the bucket of the last
/// row; hours without any reading appear with every column `None`.
pub fn resample_hourly(rows: &[MergedRow]) -> Result<Vec<HourlyReading>, ResampleError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let frame = df!(
        FECHA => rows.iter().map(|r| to_millis(r.at)).collect::<Vec<_>>(),
        Channel::Temperature.column() => rows.iter().map(|r| r.temperatura).collect::<Vec<_>>(),
        Channel::Humidity.column() => rows.iter().map(|r| r.humedad).collect::<Vec<_>>(),
        Channel::Conductivity.column() => rows.iter().map(|r| r.conductibilidad).collect::<Vec<_>>()
    )?;
    hourly_readings(frame.lazy().with_column(col(FECHA).cast(datetime_ms())))
}

/// Merge then resample without leaving the dataframe
pub fn merge_and_resample(series: &ChannelSeries) -> Result<Vec<HourlyReading>, ResampleError> {
    if series.is_empty() {
        return Ok(Vec::new());
    }
    hourly_readings(merged_frame(series)?)
}

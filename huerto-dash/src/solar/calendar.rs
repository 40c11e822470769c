//! Solar calendar table
//!
//! Per-month, per-day sunrise/sunset clock times loaded from a TOML asset.
//! Times are kept as zero-padded `HH:MM` text so that day/night checks are
//! plain lexicographic comparisons.
//!
//! Loading is parse + validate. Structural problems (missing month, too few
//! rows, unpadded times) reject the table. Implausible rows are kept verbatim
//! and reported as [`DataWarning`]s for the data owner.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Table shipped with the service
const EMBEDDED_CALENDAR: &str = include_str!("../../data/solar_calendar.toml");

/// Day-to-day change (minutes) beyond which a row is flagged for review
pub const ABRUPT_SHIFT_MINUTES: i64 = 45;

/// English name, table key, and maximum day count of every month
pub const MONTHS: [(&str, &str, usize); 12] = [
    ("January", "Enero", 31),
    ("February", "Febrero", 29),
    ("March", "Marzo", 31),
    ("April", "Abril", 30),
    ("May", "Mayo", 31),
    ("June", "Junio", 30),
    ("July", "Julio", 31),
    ("August", "Agosto", 31),
    ("September", "Septiembre", 30),
    ("October", "Octubre", 31),
    ("November", "Noviembre", 30),
    ("December", "Diciembre", 31),
];

/// Resolve an English month name to the key the table is indexed by
pub fn localized_month(english: &str) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(en, _, _)| *en == english)
        .map(|(_, es, _)| *es)
}

/// A clock time that is not in zero-padded `HH:MM` form
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("clock time {0:?} is not zero-padded HH:MM")]
pub struct ClockFormatError(pub String);

/// Zero-padded 24-hour `HH:MM` clock text
///
/// Ordering is lexicographic on the text. Only the shape is enforced, so
/// transcribed values such as `20:66` parse and are reported separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(String);

impl ClockTime {
    /// Clock text of a wall-clock time
    pub fn from_time(time: chrono::NaiveTime) -> Self {
        Self(time.format("%H:%M").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn hour(&self) -> u32 {
        self.0[..2].parse().unwrap_or(0)
    }

    pub fn minute(&self) -> u32 {
        self.0[3..].parse().unwrap_or(0)
    }

    /// True when hour < 24 and minute < 60
    pub fn is_plausible(&self) -> bool {
        self.hour() < 24 && self.minute() < 60
    }

    fn minutes(&self) -> i64 {
        i64::from(self.hour()) * 60 + i64::from(self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ClockFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit());

        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(ClockFormatError(s.to_string()))
        }
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sunrise and sunset for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolarWindow {
    pub sunrise: ClockTime,
    pub sunset: ClockTime,
}

impl SolarWindow {
    /// Inclusive on both ends
    pub fn contains(&self, clock: &ClockTime) -> bool {
        self.sunrise <= *clock && *clock <= self.sunset
    }
}

/// Calendar loading errors
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Read solar calendar failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse solar calendar failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{month} day {day}: {source}")]
    Clock {
        month: String,
        day: usize,
        source: ClockFormatError,
    },

    #[error("Solar calendar is missing month {0}")]
    MissingMonth(String),

    #[error("Solar calendar has unknown month {0}")]
    UnknownMonth(String),

    #[error("Solar calendar month {month} has {rows} rows, needs at least {required}")]
    TooFewDays {
        month: String,
        rows: usize,
        required: usize,
    },
}

/// What looks wrong about a preserved row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Hour ≥ 24 or minute ≥ 60
    ImpossibleClock,
    /// Sunrise not before sunset
    InvertedWindow,
    /// Sunrise or sunset moved by at least [`ABRUPT_SHIFT_MINUTES`] from the previous day
    AbruptShift,
}

/// A suspicious row kept as tabulated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataWarning {
    pub month: String,
    pub day: usize,
    pub kind: WarningKind,
    pub detail: String,
}

#[derive(Debug, Deserialize)]
struct CalendarFile {
    months: BTreeMap<String, Vec<(String, String)>>,
}

/// Validated solar calendar
#[derive(Debug, Clone)]
pub struct SolarCalendar {
    months: HashMap<String, Vec<SolarWindow>>,
    warnings: Vec<DataWarning>,
}

impl SolarCalendar {
    /// The table shipped with the service
    pub fn embedded() -> Result<Self, CalendarError> {
        Self::load_str(EMBEDDED_CALENDAR)
    }

    /// Load a calendar file
    pub fn load_file(path: &Path) -> Result<Self, CalendarError> {
        let text = std::fs::read_to_string(path)?;
        info!("Loading solar calendar from {}", path.display());
        Self::load_str(&text)
    }

    /// Parse and validate
    pub fn load_str(text: &str) -> Result<Self, CalendarError> {
        let mut calendar = Self::parse(text)?;
        calendar.warnings = calendar.validate()?;

        for warning in &calendar.warnings {
            warn!(
                month = %warning.month,
                day = warning.day,
                kind = ?warning.kind,
                "Solar calendar data warning: {}",
                warning.detail
            );
        }

        Ok(calendar)
    }

    /// Parse without the structural validation pass
    ///
    /// Only the zero-padded shape of every time is checked.
    pub fn parse(text: &str) -> Result<Self, CalendarError> {
        let file: CalendarFile = toml::from_str(text)?;

        let mut months = HashMap::new();
        for (month, rows) in file.months {
            let mut windows = Vec::with_capacity(rows.len());
            for (index, (sunrise, sunset)) in rows.into_iter().enumerate() {
                let clock = |text: String| {
                    text.parse::<ClockTime>().map_err(|source| CalendarError::Clock {
                        month: month.clone(),
                        day: index + 1,
                        source,
                    })
                };
                windows.push(SolarWindow {
                    sunrise: clock(sunrise)?,
                    sunset: clock(sunset)?,
                });
            }
            months.insert(month, windows);
        }

        Ok(Self {
            months,
            warnings: Vec::new(),
        })
    }

    /// Structural checks, then collect data warnings
    pub fn validate(&self) -> Result<Vec<DataWarning>, CalendarError> {
        for key in self.months.keys() {
            if !MONTHS.iter().any(|(_, es, _)| *es == key.as_str()) {
                return Err(CalendarError::UnknownMonth(key.clone()));
            }
        }

        let mut warnings = Vec::new();
        for (_, month, required) in MONTHS {
            let rows = self
                .months
                .get(month)
                .ok_or_else(|| CalendarError::MissingMonth(month.to_string()))?;

            if rows.len() < required {
                return Err(CalendarError::TooFewDays {
                    month: month.to_string(),
                    rows: rows.len(),
                    required,
                });
            }

            collect_warnings(month, rows, &mut warnings);
        }

        Ok(warnings)
    }

    /// Window for a table month key and 1-based day of month
    pub fn window(&self, month: &str, day: u32) -> Option<&SolarWindow> {
        let index = usize::try_from(day).ok()?.checked_sub(1)?;
        self.months.get(month)?.get(index)
    }

    /// Rows stored for a month key
    pub fn rows(&self, month: &str) -> Option<usize> {
        self.months.get(month).map(Vec::len)
    }

    pub fn warnings(&self) -> &[DataWarning] {
        &self.warnings
    }
}

fn collect_warnings(month: &str, rows: &[SolarWindow], warnings: &mut Vec<DataWarning>) {
    let mut push = |day: usize, kind: WarningKind, detail: String| {
        warnings.push(DataWarning {
            month: month.to_string(),
            day,
            kind,
            detail,
        });
    };

    for (index, window) in rows.iter().enumerate() {
        let day = index + 1;

        for clock in [&window.sunrise, &window.sunset] {
            if !clock.is_plausible() {
                push(day, WarningKind::ImpossibleClock, format!("{} is not a valid time", clock));
            }
        }

        if window.sunrise >= window.sunset {
            push(
                day,
                WarningKind::InvertedWindow,
                format!("sunrise {} is not before sunset {}", window.sunrise, window.sunset),
            );
        }

        if let Some(previous) = index.checked_sub(1).map(|i| &rows[i]) {
            let pairs = [
                ("sunrise", &previous.sunrise, &window.sunrise),
                ("sunset", &previous.sunset, &window.sunset),
            ];
            for (column, before, after) in pairs {
                if (after.minutes() - before.minutes()).abs() >= ABRUPT_SHIFT_MINUTES {
                    push(
                        day,
                        WarningKind::AbruptShift,
                        format!("{} moved from {} to {}", column, before, after),
                    );
                }
            }
        }
    }
}

/// Calendar text with every day of every month set to one window
#[cfg(test)]
pub(crate) fn uniform_calendar(sunrise: &str, sunset: &str) -> String {
    let mut text = String::from("[months]\n");
    for (_, month, days) in MONTHS {
        let rows = vec![format!("[\"{}\", \"{}\"]", sunrise, sunset); days];
        text.push_str(&format!("{} = [{}]\n", month, rows.join(", ")));
    }
    text
}

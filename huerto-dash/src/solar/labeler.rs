//! Day/night labeling
//!
//! A timestamp is "day" when its `HH:MM` clock time lies within the inclusive
//! [sunrise, sunset] window tabulated for its calendar day. This is a literal
//! table lookup, not a solar computation, and it is not leap-year aware.

use chrono::{Datelike, NaiveDateTime};
use thiserror::Error;

use super::calendar::{localized_month, ClockFormatError, ClockTime, SolarCalendar};
use crate::models::DayState;

/// Labeling failures
///
/// Every variant is reported to the caller; no failure is turned into a label.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabelError {
    /// Clock text that would break lexicographic comparison
    #[error(transparent)]
    UnpaddedClock(#[from] ClockFormatError),

    #[error("month {0} has no solar calendar entry")]
    UnknownMonth(String),

    /// Day of month beyond the rows stored for that month
    #[error("solar calendar lookup failed for {month} day {day} ({rows} rows stored)")]
    LookupFailure { month: String, day: u32, rows: usize },
}

/// Labels timestamps against a [`SolarCalendar`]
#[derive(Debug, Clone, Copy)]
pub struct DayNightLabeler<'a> {
    calendar: &'a SolarCalendar,
}

impl<'a> DayNightLabeler<'a> {
    pub fn new(calendar: &'a SolarCalendar) -> Self {
        Self { calendar }
    }

    /// Label a wall-clock timestamp
    pub fn label(&self, at: NaiveDateTime) -> Result<DayState, LabelError> {
        let english = at.format("%B").to_string();
        let month = localized_month(&english).ok_or(LabelError::UnknownMonth(english))?;
        self.label_window(month, at.day(), &ClockTime::from_time(at.time()))
    }

    /// Label a clock text for a table month key and day of month
    ///
    /// Unpadded clock text such as `7:00` is rejected.
    pub fn label_clock(&self, month: &str, day: u32, clock: &str) -> Result<DayState, LabelError> {
        let clock: ClockTime = clock.parse()?;
        self.label_window(month, day, &clock)
    }

    fn label_window(&self, month: &str, day: u32, clock: &ClockTime) -> Result<DayState, LabelError> {
        let rows = self
            .calendar
            .rows(month)
            .ok_or_else(|| LabelError::UnknownMonth(month.to_string()))?;

        let window = self
            .calendar
            .window(month, day)
            .ok_or_else(|| LabelError::LookupFailure {
                month: month.to_string(),
                day,
                rows,
            })?;

        Ok(if window.contains(clock) {
            DayState::Day
        } else {
            DayState::Night
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solar::calendar::uniform_calendar;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn seven_to_seven() -> SolarCalendar {
        SolarCalendar::load_str(&uniform_calendar("07:00", "19:00")).unwrap()
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let calendar = seven_to_seven();
        let labeler = DayNightLabeler::new(&calendar);

        assert_eq!(labeler.label(at(2024, 6, 1, 7, 0)), Ok(DayState::Day));
        assert_eq!(labeler.label(at(2024, 6, 1, 19, 0)), Ok(DayState::Day));
        assert_eq!(labeler.label(at(2024, 6, 1, 6, 59)), Ok(DayState::Night));
        assert_eq!(labeler.label(at(2024, 6, 1, 19, 1)), Ok(DayState::Night));
    }

    #[test]
    fn test_seconds_do_not_affect_label() {
        let calendar = seven_to_seven();
        let labeler = DayNightLabeler::new(&calendar);
        let late = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(19, 0, 59)
            .unwrap();
        assert_eq!(labeler.label(late), Ok(DayState::Day));
    }

    #[test]
    fn test_unpadded_clock_is_rejected() {
        let calendar = seven_to_seven();
        let labeler = DayNightLabeler::new(&calendar);

        // "7:00" > "19:00" lexicographically; it must never reach the comparison
        assert_eq!(
            labeler.label_clock("Junio", 1, "7:00"),
            Err(LabelError::UnpaddedClock(ClockFormatError("7:00".to_string())))
        );
        assert_eq!(labeler.label_clock("Junio", 1, "07:00"), Ok(DayState::Day));
    }

    #[test]
    fn test_real_table_lookup() {
        let calendar = SolarCalendar::embedded().unwrap();
        let labeler = DayNightLabeler::new(&calendar);

        // 2024-03-08: sunrise 07:46, sunset 19:21
        assert_eq!(labeler.label(at(2024, 3, 8, 7, 0)), Ok(DayState::Night));
        assert_eq!(labeler.label(at(2024, 3, 8, 8, 0)), Ok(DayState::Day));
        assert_eq!(labeler.label(at(2024, 3, 8, 19, 0)), Ok(DayState::Day));
        assert_eq!(labeler.label(at(2024, 3, 8, 20, 0)), Ok(DayState::Night));

        // Leap day has its own row
        assert_eq!(labeler.label(at(2024, 2, 29, 12, 0)), Ok(DayState::Day));
    }

    #[test]
    fn test_transcribed_sunset_is_used_verbatim() {
        let calendar = SolarCalendar::embedded().unwrap();
        let labeler = DayNightLabeler::new(&calendar);

        // Sunset tabulated as "20:66" on September 30
        assert_eq!(labeler.label(at(2024, 9, 30, 20, 59)), Ok(DayState::Day));
        assert_eq!(labeler.label(at(2024, 9, 30, 21, 0)), Ok(DayState::Night));
    }

    #[test]
    fn test_short_month_is_lookup_failure() {
        // Unvalidated table with a 28-row February
        let text = uniform_calendar("07:00", "19:00").replace(
            "Febrero = [[\"07:00\", \"19:00\"], ",
            "Febrero = [",
        );
        let calendar = SolarCalendar::parse(&text).unwrap();
        let labeler = DayNightLabeler::new(&calendar);

        assert_eq!(labeler.label(at(2024, 2, 28, 12, 0)), Ok(DayState::Day));
        assert_eq!(
            labeler.label(at(2024, 2, 29, 12, 0)),
            Err(LabelError::LookupFailure {
                month: "Febrero".to_string(),
                day: 29,
                rows: 28,
            })
        );
    }

    #[test]
    fn test_unknown_month_key() {
        let calendar = seven_to_seven();
        let labeler = DayNightLabeler::new(&calendar);
        assert_eq!(
            labeler.label_clock("June", 1, "12:00"),
            Err(LabelError::UnknownMonth("June".to_string()))
        );
    }
}

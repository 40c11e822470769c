//! Solar calendar table and day/night labeling

pub mod calendar;
pub mod labeler;

pub use calendar::{
    localized_month, CalendarError, ClockFormatError, ClockTime, DataWarning, SolarCalendar,
    SolarWindow, WarningKind,
};
pub use labeler::{DayNightLabeler, LabelError};

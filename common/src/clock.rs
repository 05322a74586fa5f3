use std::fmt;

use chrono::{DateTime, Datelike, Timelike};
use serde::{Deserialize, Serialize};

const DST_SHIFT_SECONDS: i64 = 3_600;

/// Offset applied to the raw time source before schedule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockSettings {
    pub utc_offset_seconds: i64,
    pub daylight_saving: bool,
}

impl ClockSettings {
    pub fn adjust(&self, raw_epoch: i64) -> i64 {
        adjusted_epoch(raw_epoch, self.utc_offset_seconds, self.daylight_saving)
    }

    pub fn local_stamp(&self, raw_epoch: i64) -> LocalStamp {
        LocalStamp::from_adjusted_epoch(self.adjust(raw_epoch))
    }
}

pub fn adjusted_epoch(raw_epoch: i64, utc_offset_seconds: i64, daylight_saving: bool) -> i64 {
    let dst = if daylight_saving { DST_SHIFT_SECONDS } else { 0 };
    raw_epoch
        .saturating_add(utc_offset_seconds)
        .saturating_add(dst)
}

/// Calendar date rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    /// Exact match against operator-entered text. `2024-3-1` does not match `2024-03-01`.
    pub fn matches(self, text: &str) -> bool {
        self.to_string() == text
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Minute-resolution time of day rendered as zero-padded 24-hour `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }

    /// Exact match against operator-entered text. `8:00` does not match `08:00`.
    pub fn matches(self, text: &str) -> bool {
        self.to_string() == text
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Adjusted wall-clock reading used for one schedule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStamp {
    pub date: CalendarDate,
    pub time: TimeOfDay,
}

impl LocalStamp {
    /// Never fails. Timestamps chrono cannot represent render as the Unix epoch.
    pub fn from_adjusted_epoch(adjusted_epoch: i64) -> Self {
        let dt = DateTime::from_timestamp(adjusted_epoch, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Self {
            date: CalendarDate {
                year: dt.year(),
                month: dt.month(),
                day: dt.day(),
            },
            time: TimeOfDay {
                hour: dt.hour(),
                minute: dt.minute(),
            },
        }
    }
}

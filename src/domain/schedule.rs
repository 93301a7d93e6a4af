use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time on a booking date, stored as minutes past midnight.
///
/// Unlike `chrono::NaiveTime` this can represent `24:00`, which venues use
/// as a closing time. Serialized as zero-padded `"HH:MM"`, so the text form
/// sorts the same way as the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn new(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Convert to a `NaiveTime`. `24:00` has no `NaiveTime` form and maps to `None`.
    pub fn to_naive_time(self) -> Option<chrono::NaiveTime> {
        chrono::NaiveTime::from_hms_opt(self.hour() as u32, self.minute() as u32, 0)
    }

    /// Combine with a date. `24:00` rolls over to midnight of the next day.
    pub fn on(self, date: chrono::NaiveDate) -> chrono::NaiveDateTime {
        date.and_time(chrono::NaiveTime::MIN) + chrono::Duration::minutes(self.0 as i64)
    }

    pub fn from_naive_time(time: chrono::NaiveTime) -> Self {
        use chrono::Timelike;
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = AppError;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds must be zero).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("Invalid time of day: {}", s));

        let mut parts = s.trim().split(':');
        let hour: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minute: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            if seconds.parse::<u16>().map_err(|_| invalid())? != 0 {
                return Err(invalid());
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        TimeOfDay::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeRange {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> crate::error::Result<Self> {
        if start >= end {
            return Err(AppError::Validation(format!(
                "Start time {} must be before end time {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> crate::error::Result<Self> {
        Self::new(start.parse()?, end.parse()?)
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end.minutes() - self.start.minutes()) as i64
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The overlapping part of two ranges, if any.
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeRange { start, end })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

//! Calendar arithmetic and time sources
//!
//! Billing decisions are made on calendar dates in the company's own
//! timezone ("is this customer expired today in Dhaka?"), so the clock is
//! injectable and every date computation goes through a `Timezone`.

use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Date out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Timezone wrapper for company-local dates
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the IANA name, e.g. "Asia/Dhaka"
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Returns the calendar date of `utc` in this timezone
    pub fn date_of(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date in the given timezone
    fn today_in(&self, timezone: Timezone) -> NaiveDate {
        timezone.date_of(self.now())
    }
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for jobs replayed at a given instant and for tests
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Fixes the clock at noon UTC on `date`, which is the same calendar
    /// date in every timezone between UTC-11 and UTC+11
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::hours(12))
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.instant.write() {
            *guard = instant;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Advances a date by whole calendar months
///
/// The day of month is preserved when the target month has it; otherwise
/// the result is the last day of the target month (Jan 31 + 1 month is
/// Feb 28, or Feb 29 in a leap year).
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Result<NaiveDate, TemporalError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| TemporalError::OutOfRange(format!("{} + {} months", date, months)))
}

/// Advances a date by a number of days
pub fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, TemporalError> {
    date.checked_add_days(chrono::Days::new(days))
        .ok_or_else(|| TemporalError::OutOfRange(format!("{} + {} days", date, days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_month_preserves_day() {
        assert_eq!(add_months_clamped(date(2025, 3, 10), 1).unwrap(), date(2025, 4, 10));
    }

    #[test]
    fn test_add_month_clamps_to_month_end() {
        assert_eq!(add_months_clamped(date(2025, 1, 31), 1).unwrap(), date(2025, 2, 28));
        assert_eq!(add_months_clamped(date(2024, 1, 31), 1).unwrap(), date(2024, 2, 29));
        assert_eq!(add_months_clamped(date(2025, 3, 31), 1).unwrap(), date(2025, 4, 30));
    }

    #[test]
    fn test_add_month_across_year() {
        assert_eq!(add_months_clamped(date(2025, 12, 15), 1).unwrap(), date(2026, 1, 15));
    }

    #[test]
    fn test_timezone_date_of() {
        let tz: Timezone = "Asia/Dhaka".parse().unwrap();
        // 20:00 UTC is already the next day in Dhaka (UTC+6)
        let instant = date(2025, 3, 10).and_hms_opt(20, 0, 0).unwrap().and_utc();
        assert_eq!(tz.date_of(instant), date(2025, 3, 11));
    }

    #[test]
    fn test_invalid_timezone() {
        assert!("Mars/Olympus".parse::<Timezone>().is_err());
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at_date(date(2025, 3, 10));
        assert_eq!(clock.today_in(Timezone::default()), date(2025, 3, 10));
        clock.set(date(2025, 4, 1).and_hms_opt(12, 0, 0).unwrap().and_utc());
        assert_eq!(clock.today_in(Timezone::default()), date(2025, 4, 1));
    }
}

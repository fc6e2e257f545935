//! Billing periods and the calendar side of period rotation.
//!
//! A [`Period`] is one calendar month, keyed as `YYYY-MM`. The helpers at the
//! bottom of the module are the pure policy a scheduler consults to decide
//! whether today is a reminder day or the last day of the period.

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::EngineError;

/// A billing cycle, one calendar month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Builds a period, rejecting months outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidPeriod(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// The period a calendar date falls into.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The period an instant falls into, as seen from the instant's timezone.
    #[must_use]
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self::containing(instant.date_naive())
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The period immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the period.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        // Month is validated at construction, day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the period.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month).cmp(&(other.year, other.month))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Period a group moves into when `current` is closed at `today`.
///
/// Normally that is the following month. A group that sat idle across several
/// months jumps straight to the month containing `today` instead of replaying
/// every empty month in between.
#[must_use]
pub fn following_period(current: Period, today: NaiveDate) -> Period {
    current.next().max(Period::containing(today))
}

/// Days remaining until the last day of the month `date` falls in.
#[must_use]
pub fn days_left_in_period(date: NaiveDate) -> u32 {
    let last = Period::containing(date).last_day();
    last.day() - date.day()
}

/// `true` when exactly `days_before` days remain in the month.
#[must_use]
pub fn is_reminder_day(date: NaiveDate, days_before: u32) -> bool {
    days_left_in_period(date) == days_before
}

/// `true` on the last day of the month.
#[must_use]
pub fn is_period_end(date: NaiveDate) -> bool {
    days_left_in_period(date) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn key_round_trips_through_display() {
        let period: Period = "2025-03".parse().unwrap();
        assert_eq!(period.year(), 2025);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2025-03");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("2025-13".parse::<Period>().is_err());
        assert!("2025-00".parse::<Period>().is_err());
        assert!("2025".parse::<Period>().is_err());
        assert!("march".parse::<Period>().is_err());
    }

    #[test]
    fn next_wraps_the_year() {
        let dec = Period::new(2024, 12).unwrap();
        assert_eq!(dec.next(), Period::new(2025, 1).unwrap());
    }

    #[test]
    fn last_day_handles_leap_years() {
        assert_eq!(Period::new(2024, 2).unwrap().last_day(), date(2024, 2, 29));
        assert_eq!(Period::new(2025, 2).unwrap().last_day(), date(2025, 2, 28));
        assert_eq!(Period::new(2025, 12).unwrap().last_day(), date(2025, 12, 31));
    }

    #[test]
    fn following_period_skips_idle_months() {
        let jan = Period::new(2025, 1).unwrap();
        assert_eq!(following_period(jan, date(2025, 1, 31)), jan.next());
        assert_eq!(
            following_period(jan, date(2025, 5, 2)),
            Period::new(2025, 5).unwrap()
        );
    }

    #[test]
    fn reminder_and_end_days() {
        assert_eq!(days_left_in_period(date(2025, 4, 27)), 3);
        assert!(is_reminder_day(date(2025, 4, 27), 3));
        assert!(!is_reminder_day(date(2025, 4, 26), 3));
        assert!(is_period_end(date(2025, 4, 30)));
        assert!(is_period_end(date(2024, 2, 29)));
        assert!(!is_period_end(date(2025, 2, 27)));
    }

    #[test]
    fn orders_chronologically() {
        let a = Period::new(2024, 12).unwrap();
        let b = Period::new(2025, 1).unwrap();
        assert!(a < b);
    }
}

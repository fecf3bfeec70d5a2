//! ISO week identifiers (`2026-W43`).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// An ISO-8601 week: the key a meal plan is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsoWeek {
    year: i32,
    week: u32,
}

impl IsoWeek {
    /// Build a week, checking that `week` exists in `year`.
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|_| Self { year, week })
    }

    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn monday(&self) -> NaiveDate {
        self.date_of(Weekday::Mon)
    }

    /// Calendar date of `weekday` within this week.
    pub fn date_of(&self, weekday: Weekday) -> NaiveDate {
        // Constructed through `new` or `containing`, so the week exists.
        let monday = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or(NaiveDate::MIN);
        monday + Duration::days(i64::from(weekday.num_days_from_monday()))
    }

    pub fn next(&self) -> Self {
        Self::containing(self.monday() + Duration::days(7))
    }

    /// The week `n` weeks before this one.
    pub fn weeks_before(&self, n: u32) -> Self {
        Self::containing(self.monday() - Duration::days(7 * i64::from(n)))
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

impl FromStr for IsoWeek {
    type Err = IsoWeekParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IsoWeekParseError(s.to_owned());
        let (year, week) = s.trim().split_once("-W").ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let week: u32 = week.parse().map_err(|_| err())?;
        Self::new(year, week).ok_or_else(err)
    }
}

/// Error returned when parsing an invalid [`IsoWeek`] string.
#[derive(Debug, Clone)]
pub struct IsoWeekParseError(pub String);

impl fmt::Display for IsoWeekParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ISO week: {:?} (expected e.g. 2026-W43)", self.0)
    }
}

impl std::error::Error for IsoWeekParseError {}

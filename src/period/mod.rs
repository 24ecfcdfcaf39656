//! Month-granularity time buckets for reporting
//!
//! Every aggregate in the engine is bucketed on a `Period`. Reporting is
//! month-based; quarter periods exist only so the repository can reject
//! them explicitly at construction time.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReportError, Result};

/// Granularity of a period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    /// Calendar month
    Month,
    /// Calendar quarter
    Quarter,
}

/// Represents a reporting time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    /// Monthly period (e.g., 2020-01)
    Month(i32, u32), // year, month
    /// Quarterly period (e.g., 2020-Q1)
    Quarter(i32, u32), // year, quarter (1-4)
}

impl Period {
    /// Build a month period, validating the month number
    pub fn month(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ReportError::Period(format!("invalid month: {month}")));
        }
        Ok(Self::Month(year, month))
    }

    /// The month period containing the given date
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        Self::Month(date.year(), date.month())
    }

    /// Granularity of this period
    #[must_use]
    pub const fn period_type(&self) -> PeriodType {
        match self {
            Self::Month(..) => PeriodType::Month,
            Self::Quarter(..) => PeriodType::Quarter,
        }
    }

    /// Get the start date of this period
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        match self {
            Self::Month(year, month) => NaiveDate::from_ymd_opt(*year, *month, 1).unwrap(),
            Self::Quarter(year, quarter) => {
                let month = (quarter - 1) * 3 + 1;
                NaiveDate::from_ymd_opt(*year, month, 1).unwrap()
            }
        }
    }

    /// Get the end date of this period (inclusive)
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        let (year, last_month) = match self {
            Self::Month(year, month) => (*year, *month),
            Self::Quarter(year, quarter) => (*year, quarter * 3),
        };
        let next_month = if last_month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(year, last_month + 1, 1).unwrap()
        };
        next_month.pred_opt().unwrap() // Last day of the period
    }

    /// Check if this period contains the given date
    #[must_use]
    pub fn contains(&self, date: &NaiveDate) -> bool {
        let start = self.start_date();
        let end = self.end_date();
        &start <= date && date <= &end
    }

    /// Absolute month number, used for month-difference arithmetic.
    ///
    /// Only meaningful for month periods; quarters are mapped to their
    /// first month.
    #[must_use]
    pub fn month_index(&self) -> i32 {
        match self {
            Self::Month(year, month) => year * 12 + (*month as i32 - 1),
            Self::Quarter(year, quarter) => year * 12 + (*quarter as i32 - 1) * 3,
        }
    }

    /// Advance by `n` months (negative moves backwards). Quarters advance
    /// by `n` quarters.
    #[must_use]
    pub fn advance(&self, n: i32) -> Self {
        match self {
            Self::Month(..) => {
                let idx = self.month_index() + n;
                Self::Month(idx.div_euclid(12), (idx.rem_euclid(12) + 1) as u32)
            }
            Self::Quarter(year, quarter) => {
                let idx = year * 4 + (*quarter as i32 - 1) + n;
                Self::Quarter(idx.div_euclid(4), (idx.rem_euclid(4) + 1) as u32)
            }
        }
    }

    /// The immediately following period of the same granularity
    #[must_use]
    pub fn succ(&self) -> Self {
        self.advance(1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month(year, month) => write!(f, "{year}-{month:02}"),
            Self::Quarter(year, quarter) => write!(f, "{year}-Q{quarter}"),
        }
    }
}

impl FromStr for Period {
    type Err = ReportError;

    /// Parse a string into a Period
    ///
    /// Supported formats:
    /// - "202001" - Year and month (YYYYMM)
    /// - "2020-01" - Year and month (YYYY-MM)
    /// - "2020Q1" - Year and quarter (YYYYQ1)
    /// - "2020-Q1" - Year and quarter (YYYY-Q1)
    fn from_str(s: &str) -> Result<Self> {
        lazy_static! {
            static ref MONTH_PATTERN: Regex = Regex::new(r"^(\d{4})[-]?(\d{2})$").unwrap();
            static ref QUARTER_PATTERN: Regex = Regex::new(r"^(\d{4})[-]?Q(\d)$").unwrap();
        }

        if let Some(caps) = MONTH_PATTERN.captures(s) {
            let year = caps
                .get(1)
                .unwrap()
                .as_str()
                .parse::<i32>()
                .map_err(|e| ReportError::Period(e.to_string()))?;
            let month = caps
                .get(2)
                .unwrap()
                .as_str()
                .parse::<u32>()
                .map_err(|e| ReportError::Period(e.to_string()))?;
            Self::month(year, month)
        } else if let Some(caps) = QUARTER_PATTERN.captures(s) {
            let year = caps
                .get(1)
                .unwrap()
                .as_str()
                .parse::<i32>()
                .map_err(|e| ReportError::Period(e.to_string()))?;
            let quarter = caps
                .get(2)
                .unwrap()
                .as_str()
                .parse::<u32>()
                .map_err(|e| ReportError::Period(e.to_string()))?;
            if !(1..=4).contains(&quarter) {
                return Err(ReportError::Period(format!("invalid quarter: {quarter}")));
            }
            Ok(Self::Quarter(year, quarter))
        } else {
            Err(ReportError::Period(format!("invalid period format: {s}")))
        }
    }
}

/// An inclusive, iterable range of periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodRange {
    /// First period in the range (inclusive)
    pub start: Period,
    /// Last period in the range (inclusive)
    pub end: Period,
}

impl PeriodRange {
    /// Build an inclusive range, validating granularity and ordering
    pub fn new(start: Period, end: Period) -> Result<Self> {
        if start.period_type() != end.period_type() {
            return Err(ReportError::Period(
                "range bounds must share a granularity".to_string(),
            ));
        }
        if start > end {
            return Err(ReportError::Period(format!(
                "range start {start} exceeds end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Granularity of the range
    #[must_use]
    pub const fn period_type(&self) -> PeriodType {
        self.start.period_type()
    }

    /// Number of periods in the range
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether the range is empty (never true for a validated range)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether the range contains the given period
    #[must_use]
    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    /// Iterate over the periods in the range, earliest first
    pub fn iter(&self) -> impl Iterator<Item = Period> + use<> {
        let end = self.end;
        let mut next = Some(self.start);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current < end { Some(current.succ()) } else { None };
            Some(current)
        })
    }

    /// Stable fingerprint of the bounds, used in cache keys
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}

impl From<Period> for PeriodRange {
    fn from(period: Period) -> Self {
        Self {
            start: period,
            end: period,
        }
    }
}

impl IntoIterator for &PeriodRange {
    type Item = Period;
    type IntoIter = Box<dyn Iterator<Item = Period>>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

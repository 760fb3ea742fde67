use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Cents, ServiceId, ValidationError};

pub const MIN_REPORT_YEAR: i32 = 2007;
pub const MAX_REPORT_YEAR: i32 = 9999;

/// A (year, month) report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if year < MIN_REPORT_YEAR {
            return Err(ValidationError::YearTooEarly(year));
        }
        if year > MAX_REPORT_YEAR {
            return Err(ValidationError::YearOutOfRange(year));
        }
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// Half-open `[start, end)` bounds of the month in UTC.
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let start = month_start(self.year, self.month)
            .ok_or(ValidationError::InvalidMonth(self.month))?;
        let end = month_start(next_year, next_month)
            .ok_or(ValidationError::YearOutOfRange(self.year))?;
        Ok((start, end))
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Per-service revenue for one month: service_id -> summed order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub period: ReportPeriod,
    pub totals: BTreeMap<ServiceId, Cents>,
}

impl ServiceReport {
    /// Sum over all services, saturating at the `i64` bounds.
    pub fn total(&self) -> Cents {
        self.totals
            .values()
            .fold(0, |total, amount| total.saturating_add(*amount))
    }
}

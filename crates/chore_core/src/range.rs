use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::month_label;

/// Allowed month window. Wraps across the year end when `first_month > last_month`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthRange {
    pub first_month: u32,
    pub last_month: u32,
}

impl Default for MonthRange {
    fn default() -> Self {
        Self {
            first_month: 1,
            last_month: 12,
        }
    }
}

impl MonthRange {
    pub fn new(first_month: u32, last_month: u32) -> Self {
        Self {
            first_month: first_month.clamp(1, 12),
            last_month: last_month.clamp(1, 12),
        }
    }

    pub fn date_inside(&self, date: NaiveDate) -> bool {
        let month = date.month();
        if self.first_month <= self.last_month {
            self.first_month <= month && month <= self.last_month
        } else {
            self.first_month <= month || month <= self.last_month
        }
    }

    /// Moves a date outside the window to the first day of the next window.
    ///
    /// A date past a non-wrapping window waits for next year's window; every
    /// other outside date waits for this year's.
    pub fn move_to_range(&self, date: NaiveDate) -> NaiveDate {
        if self.date_inside(date) {
            return date;
        }
        let year = if self.first_month <= self.last_month && self.last_month < date.month() {
            debug!(
                %date,
                from = month_label(self.first_month),
                "outside the range, looking from next year"
            );
            date.year() + 1
        } else {
            debug!(
                %date,
                from = month_label(self.first_month),
                "outside the range, searching forward"
            );
            date.year()
        };
        NaiveDate::from_ymd_opt(year, self.first_month, 1).unwrap_or(date)
    }
}

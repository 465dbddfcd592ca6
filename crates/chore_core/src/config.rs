use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{month_from_name, parse_month_day};
use crate::error::{ChoreError, Result};
use crate::range::MonthRange;

pub const DEFAULT_FORECAST_DATES: u32 = 10;
pub const DEFAULT_ICON_NORMAL: &str = "mdi:broom";
pub const DEFAULT_ICON_TODAY: &str = "mdi:bell";
pub const DEFAULT_ICON_TOMORROW: &str = "mdi:bell-outline";
pub const DEFAULT_ICON_OVERDUE: &str = "mdi:bell-alert";
pub const DEFAULT_DATE_FORMAT: &str = "%b-%d-%Y";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    #[serde(rename = "every-n-days")]
    #[default]
    EveryNDays,
    #[serde(rename = "every-n-weeks")]
    EveryNWeeks,
    #[serde(rename = "every-n-months")]
    EveryNMonths,
    #[serde(rename = "every-n-years")]
    EveryNYears,
    #[serde(rename = "after-n-days")]
    AfterNDays,
    #[serde(rename = "after-n-weeks")]
    AfterNWeeks,
    #[serde(rename = "after-n-months")]
    AfterNMonths,
    #[serde(rename = "after-n-years")]
    AfterNYears,
    #[serde(rename = "blank")]
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl Frequency {
    pub fn is_after(self) -> bool {
        matches!(
            self,
            Frequency::AfterNDays
                | Frequency::AfterNWeeks
                | Frequency::AfterNMonths
                | Frequency::AfterNYears
        )
    }

    /// Unit of the period; `None` for the blank frequency.
    pub fn unit(self) -> Option<PeriodUnit> {
        match self {
            Frequency::EveryNDays | Frequency::AfterNDays => Some(PeriodUnit::Day),
            Frequency::EveryNWeeks | Frequency::AfterNWeeks => Some(PeriodUnit::Week),
            Frequency::EveryNMonths | Frequency::AfterNMonths => Some(PeriodUnit::Month),
            Frequency::EveryNYears | Frequency::AfterNYears => Some(PeriodUnit::Year),
            Frequency::Blank => None,
        }
    }
}

/// Options a chore is created with. Field names match the stored option keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChoreConfig {
    pub name: String,
    pub frequency: Frequency,
    pub period: Option<u32>,
    pub first_month: String,
    pub last_month: String,
    pub start_date: Option<NaiveDate>,
    pub chore_day: Option<String>,
    pub day_of_month: Option<i32>,
    pub weekday_order_number: Option<u32>,
    pub date: Option<String>,
    pub forecast_dates: u32,
    pub manual: bool,
    pub show_overdue_today: bool,
    pub hidden: bool,
    pub auto_assign: bool,
    pub assignee_user: Option<String>,
    pub icon_normal: String,
    pub icon_today: String,
    pub icon_tomorrow: String,
    pub icon_overdue: String,
    pub date_format: String,
}

impl Default for ChoreConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            frequency: Frequency::default(),
            period: Some(1),
            first_month: "jan".to_string(),
            last_month: "dec".to_string(),
            start_date: None,
            chore_day: None,
            day_of_month: None,
            weekday_order_number: None,
            date: None,
            forecast_dates: DEFAULT_FORECAST_DATES,
            manual: false,
            show_overdue_today: false,
            hidden: false,
            auto_assign: false,
            assignee_user: None,
            icon_normal: DEFAULT_ICON_NORMAL.to_string(),
            icon_today: DEFAULT_ICON_TODAY.to_string(),
            icon_tomorrow: DEFAULT_ICON_TOMORROW.to_string(),
            icon_overdue: DEFAULT_ICON_OVERDUE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl ChoreConfig {
    pub fn new(name: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            name: name.into(),
            frequency,
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: Option<u32>) -> Self {
        self.period = period;
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_months(mut self, first: &str, last: &str) -> Self {
        self.first_month = first.to_string();
        self.last_month = last.to_string();
        self
    }

    pub fn with_forecast_dates(mut self, forecast_dates: u32) -> Self {
        self.forecast_dates = forecast_dates;
        self
    }

    pub fn with_chore_day(mut self, chore_day: &str) -> Self {
        self.chore_day = Some(chore_day.to_string());
        self
    }

    /// Clears the "not set" sentinels the options form stores and rejects
    /// values the frequency rules cannot interpret.
    pub fn normalized(mut self) -> Result<Self> {
        if self.day_of_month.is_some_and(|day| day < 1) {
            self.day_of_month = None;
        }
        if matches!(self.date.as_deref(), Some("" | "0" | "0/0")) {
            self.date = None;
        }
        if self.weekday_order_number == Some(0) {
            self.weekday_order_number = None;
        }
        if matches!(self.chore_day.as_deref(), Some("" | "0")) {
            self.chore_day = None;
        }
        if let Some(date) = &self.date {
            if parse_month_day(date).is_none() {
                return Err(ChoreError::configuration(format!(
                    "`{date}` is not a valid MM/DD month-day"
                )));
            }
        }
        if let Some(day) = &self.chore_day {
            if day.parse::<Weekday>().is_err() {
                return Err(ChoreError::configuration(format!(
                    "`{day}` is not a weekday"
                )));
            }
        }
        Ok(self)
    }

    /// Unknown month names fall back to January and December.
    pub fn month_range(&self) -> MonthRange {
        MonthRange::new(
            month_from_name(&self.first_month).unwrap_or(1),
            month_from_name(&self.last_month).unwrap_or(12),
        )
    }

    pub fn weekday(&self) -> Option<Weekday> {
        self.chore_day.as_deref().and_then(|day| day.parse().ok())
    }

    pub fn month_day(&self) -> Option<(u32, u32)> {
        self.date.as_deref().and_then(parse_month_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_option_keys_with_defaults() {
        let raw = r#"{
            "name": "Water plants",
            "frequency": "after-n-weeks",
            "period": 2,
            "first_month": "nov",
            "last_month": "feb",
            "start_date": "2024-01-05",
            "chore_day": "fri"
        }"#;
        let config: ChoreConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.frequency, Frequency::AfterNWeeks);
        assert!(config.frequency.is_after());
        assert_eq!(config.period, Some(2));
        assert_eq!(config.month_range(), MonthRange::new(11, 2));
        assert_eq!(config.weekday(), Some(Weekday::Fri));
        assert_eq!(config.forecast_dates, DEFAULT_FORECAST_DATES);
        assert_eq!(config.icon_overdue, DEFAULT_ICON_OVERDUE);
    }

    #[test]
    fn normalizes_unset_sentinels() {
        let mut config = ChoreConfig::new("Sweep", Frequency::EveryNMonths);
        config.day_of_month = Some(0);
        config.date = Some("0/0".to_string());
        config.weekday_order_number = Some(0);
        config.chore_day = Some("0".to_string());
        let config = config.normalized().unwrap();
        assert_eq!(config.day_of_month, None);
        assert_eq!(config.date, None);
        assert_eq!(config.weekday_order_number, None);
        assert_eq!(config.chore_day, None);
    }

    #[test]
    fn rejects_bad_month_day() {
        let mut config = ChoreConfig::new("Taxes", Frequency::EveryNYears);
        config.date = Some("14/40".to_string());
        assert!(matches!(
            config.normalized(),
            Err(ChoreError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_month_names_fall_back_to_full_year() {
        let config = ChoreConfig::new("Dust", Frequency::EveryNDays).with_months("foo", "bar");
        assert_eq!(config.month_range(), MonthRange::default());
    }
}

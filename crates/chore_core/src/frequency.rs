use std::fmt::Debug;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::debug;

use crate::calendar::{
    add_days, add_months, add_years, days_between, days_in_month, monday_of, months_between,
    next_weekday, nth_weekday_of_month,
};
use crate::config::{ChoreConfig, Frequency, PeriodUnit};
use crate::error::{ChoreError, Result};
use crate::range::MonthRange;

/// Everything the anchor computations need besides the rule itself.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext<'a> {
    pub name: &'a str,
    pub now: NaiveDateTime,
    pub start_date: Option<NaiveDate>,
    pub last_completed: Option<NaiveDateTime>,
    pub range: MonthRange,
}

impl ScheduleContext<'_> {
    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn completed_on(&self, day: NaiveDate) -> bool {
        self.last_completed
            .is_some_and(|completed| completed.date() == day)
    }

    /// Generation anchor: the configured start or the last completion,
    /// whichever is later, confined to the month window.
    pub fn calculate_start_date(&self) -> NaiveDate {
        let mut start_date = self.start_date.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(self.today().year() - 1, 1, 1).unwrap_or(self.today())
        });
        if let Some(completed) = self.last_completed.map(|ts| ts.date()) {
            if completed > start_date {
                start_date = completed;
            } else if completed == start_date {
                start_date = add_days(start_date, 1).unwrap_or(start_date);
            }
        }
        self.range.move_to_range(start_date)
    }

    /// Pattern anchor. For after-N rules a completion restarts the cycle
    /// one period after the completion date.
    pub fn calculate_schedule_start_date(&self, rule: &dyn FrequencyRule) -> Result<NaiveDate> {
        if rule.is_after() {
            if let Some(completed) = self.last_completed {
                let earliest = rule.add_period(completed.date())?;
                return Ok(match self.start_date {
                    Some(start) if start >= earliest => start,
                    _ => earliest,
                });
            }
        }
        self.start_date.ok_or_else(|| {
            ChoreError::configuration(format!("({}) start date is not configured", self.name))
        })
    }

    pub fn calculate_day1(&self, day1: NaiveDate, schedule_start_date: NaiveDate) -> NaiveDate {
        let day1 = day1
            .max(self.calculate_start_date())
            .max(schedule_start_date);
        let today = self.today();
        if day1 == today && self.completed_on(today) {
            return add_days(day1, 1).unwrap_or(day1);
        }
        day1
    }
}

/// One recurrence pattern. Month window and overrides are applied by the
/// schedule generator, not here.
pub trait FrequencyRule: Debug + Send + Sync {
    fn is_after(&self) -> bool;

    /// Shifts a date by one period of this rule.
    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate>;

    /// Next date on or after `anchor` matching the pattern.
    fn next_candidate(&self, anchor: NaiveDate, ctx: &ScheduleContext<'_>)
        -> Result<Option<NaiveDate>>;
}

/// Picks the rule for the configured frequency.
pub fn rule_for(config: &ChoreConfig) -> Box<dyn FrequencyRule> {
    let after = config.frequency.is_after();
    let period = config.period;
    match config.frequency.unit() {
        Some(PeriodUnit::Day) => Box::new(DailyRule { after, period }),
        Some(PeriodUnit::Week) => Box::new(WeeklyRule {
            after,
            period,
            weekday: config.weekday(),
        }),
        Some(PeriodUnit::Month) => Box::new(MonthlyRule {
            after,
            period,
            day_of_month: config.day_of_month.and_then(|day| u32::try_from(day).ok()),
            weekday: config.weekday(),
            weekday_order: config.weekday_order_number,
        }),
        Some(PeriodUnit::Year) => Box::new(YearlyRule {
            after,
            period,
            month_day: config.month_day(),
        }),
        None => {
            debug_assert_eq!(config.frequency, Frequency::Blank);
            Box::new(BlankRule)
        }
    }
}

fn require_period(period: Option<u32>) -> Result<u32> {
    match period {
        Some(period) if period > 0 => Ok(period),
        _ => Err(ChoreError::configuration("period is not configured")),
    }
}

/// The next aligned date lies beyond chrono's calendar, so the schedule ends.
fn past_calendar(ctx: &ScheduleContext<'_>, from: NaiveDate) -> Option<NaiveDate> {
    debug!(chore = ctx.name, %from, "no aligned date within the supported calendar");
    None
}

fn overflow(date: NaiveDate) -> ChoreError {
    ChoreError::configuration(format!("date arithmetic overflowed near {date}"))
}

#[derive(Debug, Clone)]
pub struct DailyRule {
    after: bool,
    period: Option<u32>,
}

impl FrequencyRule for DailyRule {
    fn is_after(&self) -> bool {
        self.after
    }

    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate> {
        let period = require_period(self.period)?;
        add_days(date, i64::from(period)).ok_or_else(|| overflow(date))
    }

    fn next_candidate(
        &self,
        anchor: NaiveDate,
        ctx: &ScheduleContext<'_>,
    ) -> Result<Option<NaiveDate>> {
        let period = i64::from(require_period(self.period)?);
        let schedule_start_date = ctx.calculate_schedule_start_date(self)?;
        let day1 = ctx.calculate_day1(anchor, schedule_start_date);

        let remainder = days_between(schedule_start_date, day1).rem_euclid(period);
        let candidate = if remainder == 0 {
            Some(day1)
        } else {
            add_days(day1, period - remainder)
        };
        let Some(candidate) = candidate else {
            return Ok(past_calendar(ctx, day1));
        };
        debug!(
            chore = ctx.name,
            %day1,
            %schedule_start_date,
            %candidate,
            "calculated daily candidate"
        );
        Ok(Some(candidate))
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyRule {
    after: bool,
    period: Option<u32>,
    weekday: Option<Weekday>,
}

impl FrequencyRule for WeeklyRule {
    fn is_after(&self) -> bool {
        self.after
    }

    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate> {
        let period = require_period(self.period)?;
        add_days(date, 7 * i64::from(period)).ok_or_else(|| overflow(date))
    }

    fn next_candidate(
        &self,
        anchor: NaiveDate,
        ctx: &ScheduleContext<'_>,
    ) -> Result<Option<NaiveDate>> {
        let period = i64::from(require_period(self.period)?);
        let schedule_start_date = ctx.calculate_schedule_start_date(self)?;
        let day1 = ctx.calculate_day1(anchor, schedule_start_date);
        let weekday = self.weekday.unwrap_or(schedule_start_date.weekday());

        let mut candidate = next_weekday(day1, weekday);
        let week = days_between(monday_of(schedule_start_date), monday_of(candidate)) / 7;
        let remainder = week.rem_euclid(period);
        if remainder != 0 {
            match add_days(candidate, 7 * (period - remainder)) {
                Some(aligned) => candidate = aligned,
                None => return Ok(past_calendar(ctx, candidate)),
            }
        }
        debug!(
            chore = ctx.name,
            %day1,
            %schedule_start_date,
            %candidate,
            "calculated weekly candidate"
        );
        Ok(Some(candidate))
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyRule {
    after: bool,
    period: Option<u32>,
    day_of_month: Option<u32>,
    weekday: Option<Weekday>,
    weekday_order: Option<u32>,
}

impl MonthlyRule {
    fn resolve_in_month(&self, year: i32, month: u32, schedule_start_date: NaiveDate) -> Option<NaiveDate> {
        if let (Some(weekday), Some(order), None) = (self.weekday, self.weekday_order, self.day_of_month)
        {
            return nth_weekday_of_month(year, month, weekday, order);
        }
        let day = self.day_of_month.unwrap_or(schedule_start_date.day());
        NaiveDate::from_ymd_opt(year, month, day.clamp(1, days_in_month(year, month)))
    }
}

impl FrequencyRule for MonthlyRule {
    fn is_after(&self) -> bool {
        self.after
    }

    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate> {
        let period = require_period(self.period)?;
        add_months(date, period).ok_or_else(|| overflow(date))
    }

    fn next_candidate(
        &self,
        anchor: NaiveDate,
        ctx: &ScheduleContext<'_>,
    ) -> Result<Option<NaiveDate>> {
        let period = i64::from(require_period(self.period)?);
        let schedule_start_date = ctx.calculate_schedule_start_date(self)?;
        let day1 = ctx.calculate_day1(anchor, schedule_start_date);
        let anchor_month = schedule_start_date
            .with_day(1)
            .ok_or_else(|| overflow(schedule_start_date))?;

        // First aligned month at or after day1's month. The resolved day can
        // fall before day1, so the following aligned month is tried too.
        let elapsed = months_between(anchor_month, day1);
        let mut step = elapsed + (period - elapsed.rem_euclid(period)) % period;
        for _ in 0..3 {
            let Some(month) = u32::try_from(step)
                .ok()
                .and_then(|step| add_months(anchor_month, step))
            else {
                return Ok(past_calendar(ctx, day1));
            };
            if let Some(candidate) =
                self.resolve_in_month(month.year(), month.month(), schedule_start_date)
            {
                if candidate >= day1 {
                    debug!(
                        chore = ctx.name,
                        %day1,
                        %schedule_start_date,
                        %candidate,
                        "calculated monthly candidate"
                    );
                    return Ok(Some(candidate));
                }
            }
            step += period;
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct YearlyRule {
    after: bool,
    period: Option<u32>,
    month_day: Option<(u32, u32)>,
}

impl FrequencyRule for YearlyRule {
    fn is_after(&self) -> bool {
        self.after
    }

    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate> {
        let period = require_period(self.period)?;
        add_years(date, period).ok_or_else(|| overflow(date))
    }

    fn next_candidate(
        &self,
        anchor: NaiveDate,
        ctx: &ScheduleContext<'_>,
    ) -> Result<Option<NaiveDate>> {
        let period = i64::from(require_period(self.period)?);
        let schedule_start_date = ctx.calculate_schedule_start_date(self)?;
        let day1 = ctx.calculate_day1(anchor, schedule_start_date);
        let (month, day) = self
            .month_day
            .unwrap_or((schedule_start_date.month(), schedule_start_date.day()));

        let elapsed = i64::from(day1.year()) - i64::from(schedule_start_date.year());
        let mut step = elapsed + (period - elapsed.rem_euclid(period)) % period;
        for _ in 0..2 {
            let candidate = i32::try_from(i64::from(schedule_start_date.year()) + step)
                .ok()
                .and_then(|year| {
                    NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))
                });
            let Some(candidate) = candidate else {
                return Ok(past_calendar(ctx, day1));
            };
            if candidate >= day1 {
                debug!(
                    chore = ctx.name,
                    %day1,
                    %schedule_start_date,
                    %candidate,
                    "calculated yearly candidate"
                );
                return Ok(Some(candidate));
            }
            step += period;
        }
        Ok(None)
    }
}

/// Produces no dates of its own; the schedule is whatever was added by hand.
#[derive(Debug, Clone)]
pub struct BlankRule;

impl FrequencyRule for BlankRule {
    fn is_after(&self) -> bool {
        false
    }

    fn add_period(&self, date: NaiveDate) -> Result<NaiveDate> {
        Ok(date)
    }

    fn next_candidate(
        &self,
        _anchor: NaiveDate,
        _ctx: &ScheduleContext<'_>,
    ) -> Result<Option<NaiveDate>> {
        Ok(None)
    }
}

use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::add_days;
use crate::error::{ChoreError, Result};
use crate::frequency::{FrequencyRule, ScheduleContext};
use crate::ledger::OverrideLedger;

/// Drives a frequency rule through the month window and the override ledger.
#[derive(Debug)]
pub struct ScheduleGenerator<'a> {
    rule: &'a dyn FrequencyRule,
    ledger: &'a OverrideLedger,
    forecast_dates: u32,
}

impl<'a> ScheduleGenerator<'a> {
    pub fn new(rule: &'a dyn FrequencyRule, ledger: &'a OverrideLedger, forecast_dates: u32) -> Self {
        Self {
            rule,
            ledger,
            forecast_dates,
        }
    }

    /// Runs one generation pass of at most `forecast_dates + 1` steps.
    ///
    /// Surviving generated dates come out ascending; added dates follow them
    /// in ledger order without being merged in.
    pub fn generate(&self, ctx: &ScheduleContext<'_>) -> Result<Vec<NaiveDate>> {
        let mut due_dates = Vec::new();
        let mut cursor = ctx.calculate_start_date();

        for _ in 0..=self.forecast_dates {
            let Some(candidate) = self.rule.next_candidate(cursor, ctx)? else {
                break;
            };

            let moved = ctx.range.move_to_range(candidate);
            if moved != candidate {
                cursor = moved;
                continue;
            }

            if self.ledger.is_removed(candidate) {
                debug!(chore = ctx.name, %candidate, "skipping removed date");
            } else {
                let due = match self.ledger.offset_for(candidate) {
                    Some(days) => add_days(candidate, days).ok_or_else(|| {
                        ChoreError::configuration(format!(
                            "offset of {days} days from {candidate} is out of range"
                        ))
                    })?,
                    None => candidate,
                };
                due_dates.push(due);
            }
            cursor = add_days(candidate, 1).ok_or_else(|| {
                ChoreError::configuration(format!("no dates after {candidate}"))
            })?;
        }

        due_dates.extend(self.ledger.added());
        Ok(due_dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChoreConfig, Frequency};
    use crate::frequency::rule_for;
    use crate::range::MonthRange;
    use chrono::{NaiveDateTime, NaiveTime};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn morning(date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap())
    }

    fn every_three_days() -> Box<dyn FrequencyRule> {
        rule_for(&ChoreConfig::new("Trash", Frequency::EveryNDays).with_period(Some(3)))
    }

    fn ctx(start: NaiveDate, range: MonthRange) -> ScheduleContext<'static> {
        ScheduleContext {
            name: "Trash",
            now: morning(start),
            start_date: Some(start),
            last_completed: None,
            range,
        }
    }

    #[test]
    fn fills_forecast_window_plus_one() {
        let rule = every_three_days();
        let ledger = OverrideLedger::new();
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 5)
            .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()))
            .unwrap();
        assert_eq!(
            dates,
            vec![
                ymd(2024, 1, 1),
                ymd(2024, 1, 4),
                ymd(2024, 1, 7),
                ymd(2024, 1, 10),
                ymd(2024, 1, 13),
                ymd(2024, 1, 16),
            ]
        );
    }

    #[test]
    fn removal_and_offset_do_not_shift_the_cursor() {
        let rule = every_three_days();
        let mut ledger = OverrideLedger::new();
        ledger.remove(ymd(2024, 1, 7));
        ledger.offset(ymd(2024, 1, 10), 2);
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 5)
            .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()))
            .unwrap();
        assert_eq!(
            dates,
            vec![
                ymd(2024, 1, 1),
                ymd(2024, 1, 4),
                ymd(2024, 1, 12),
                ymd(2024, 1, 13),
                ymd(2024, 1, 16),
            ]
        );
    }

    #[test]
    fn added_dates_are_appended_unsorted() {
        // Kept as-is: added dates trail the generated block even when earlier.
        let rule = every_three_days();
        let mut ledger = OverrideLedger::new();
        ledger.add(ymd(2024, 1, 2));
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 1)
            .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()))
            .unwrap();
        assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 4), ymd(2024, 1, 2)]);
    }

    #[test]
    fn out_of_range_candidates_consume_a_step() {
        let rule = every_three_days();
        let ledger = OverrideLedger::new();
        // Window is March only; the start sits at the end of the window.
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 2)
            .generate(&ctx(ymd(2024, 3, 29), MonthRange::new(3, 3)))
            .unwrap();
        // 03-29 emitted, 04-01 moves the cursor to next March, then 2025-03-01 ...
        assert_eq!(dates.first(), Some(&ymd(2024, 3, 29)));
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[1].format("%Y-%m").to_string(), "2025-03");
    }

    #[test]
    fn wrapping_window_crosses_the_year_end() {
        let rule = rule_for(&ChoreConfig::new("Gutters", Frequency::EveryNMonths).with_period(Some(1)));
        let ledger = OverrideLedger::new();
        // November through February; March waits for next November.
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 5)
            .generate(&ctx(ymd(2024, 11, 15), MonthRange::new(11, 2)))
            .unwrap();
        assert_eq!(
            dates,
            vec![
                ymd(2024, 11, 15),
                ymd(2024, 12, 15),
                ymd(2025, 1, 15),
                ymd(2025, 2, 15),
                ymd(2025, 11, 15),
            ]
        );
    }

    #[test]
    fn wrapping_window_jumps_from_february_to_november() {
        let rule = rule_for(&ChoreConfig::new("Salt", Frequency::EveryNDays).with_period(Some(7)));
        let ledger = OverrideLedger::new();
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 3)
            .generate(&ctx(ymd(2024, 2, 22), MonthRange::new(11, 2)))
            .unwrap();
        // 03-07 moves the cursor to 11-01; 11-07 keeps the seven-day rhythm.
        assert_eq!(
            dates,
            vec![ymd(2024, 2, 22), ymd(2024, 2, 29), ymd(2024, 11, 7)]
        );
    }

    #[test]
    fn huge_periods_end_the_schedule_instead_of_overflowing() {
        let ledger = OverrideLedger::new();
        let cases = [
            (Frequency::EveryNDays, u32::MAX),
            (Frequency::EveryNWeeks, u32::MAX),
            (Frequency::EveryNMonths, 3_000_000_000),
            (Frequency::EveryNMonths, u32::MAX),
            (Frequency::EveryNYears, 1_500_000_000),
            (Frequency::EveryNYears, u32::MAX),
        ];
        for (frequency, period) in cases {
            let rule = rule_for(&ChoreConfig::new("Rare", frequency).with_period(Some(period)));
            let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 3)
                .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()))
                .unwrap();
            assert_eq!(dates, vec![ymd(2024, 1, 1)], "{frequency:?} every {period}");
        }
    }

    #[test]
    fn configuration_error_aborts_the_pass() {
        let rule = rule_for(&ChoreConfig::new("Trash", Frequency::EveryNDays).with_period(None));
        let mut ledger = OverrideLedger::new();
        ledger.add(ymd(2024, 1, 2));
        let result = ScheduleGenerator::new(rule.as_ref(), &ledger, 3)
            .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()));
        assert!(matches!(result, Err(ChoreError::Configuration(_))));
    }

    #[test]
    fn blank_frequency_only_yields_added_dates() {
        let rule = rule_for(&ChoreConfig::new("Ad hoc", Frequency::Blank));
        let mut ledger = OverrideLedger::new();
        ledger.add(ymd(2024, 6, 1));
        let dates = ScheduleGenerator::new(rule.as_ref(), &ledger, 3)
            .generate(&ctx(ymd(2024, 1, 1), MonthRange::default()))
            .unwrap();
        assert_eq!(dates, vec![ymd(2024, 6, 1)]);
    }
}

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

/// Time of day after which a due date of today no longer counts.
///
/// Only fractional seconds can pass it, so in practice today stays due until
/// the chore is completed.
pub const TODAY_CUTOFF: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(time) => time,
    None => panic!("23:59:59 is a valid time of day"),
};

/// Picks the active due date out of a generated sequence.
#[derive(Debug, Clone, Copy)]
pub struct NextDueSelector {
    now: NaiveDateTime,
    last_completed: Option<NaiveDateTime>,
}

impl NextDueSelector {
    pub fn new(now: NaiveDateTime, last_completed: Option<NaiveDateTime>) -> Self {
        Self {
            now,
            last_completed,
        }
    }

    pub fn select(
        &self,
        due_dates: &[NaiveDate],
        start_date: NaiveDate,
        ignore_today: bool,
    ) -> Option<NaiveDate> {
        let today = self.now.date();
        let found = due_dates
            .iter()
            .copied()
            .filter(|date| *date >= start_date)
            .find(|date| ignore_today || *date != today || !self.today_handled());
        match found {
            Some(date) => debug!(%date, "next due date found"),
            None => debug!(?due_dates, %start_date, "no next due date found"),
        }
        found
    }

    fn today_handled(&self) -> bool {
        let now_time = self.now.time();
        if now_time > TODAY_CUTOFF {
            return true;
        }
        self.last_completed.is_some_and(|completed| {
            completed.date() == self.now.date() && now_time >= completed.time()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
    }

    #[test]
    fn returns_first_date_on_or_after_start() {
        let today = ymd(2024, 3, 10);
        let dates = [ymd(2024, 3, 8), ymd(2024, 3, 12), ymd(2024, 3, 14)];
        let selector = NextDueSelector::new(at(today, 10, 0, 0), None);
        assert_eq!(selector.select(&dates, ymd(2024, 3, 9), false), Some(ymd(2024, 3, 12)));
        assert_eq!(selector.select(&dates, ymd(2024, 3, 15), false), None);
    }

    #[test]
    fn skips_today_once_completed_earlier_today() {
        let today = ymd(2024, 3, 10);
        let dates = [today, ymd(2024, 3, 13)];
        let selector = NextDueSelector::new(at(today, 10, 0, 0), Some(at(today, 9, 0, 0)));
        assert_eq!(selector.select(&dates, today, false), Some(ymd(2024, 3, 13)));
        assert_eq!(selector.select(&dates, today, true), Some(today));
    }

    #[test]
    fn keeps_today_while_not_yet_completed() {
        let today = ymd(2024, 3, 10);
        let dates = [today, ymd(2024, 3, 13)];
        let yesterday = NextDueSelector::new(at(today, 10, 0, 0), Some(at(ymd(2024, 3, 9), 9, 0, 0)));
        assert_eq!(yesterday.select(&dates, today, false), Some(today));

        // A completion stamped later than now does not count yet.
        let later = NextDueSelector::new(at(today, 8, 0, 0), Some(at(today, 9, 0, 0)));
        assert_eq!(later.select(&dates, today, false), Some(today));
    }

    #[test]
    fn cutoff_at_last_second_is_effectively_unreachable() {
        // Suspicious but kept: only a sub-second timestamp passes 23:59:59.
        let today = ymd(2024, 3, 10);
        let dates = [today, ymd(2024, 3, 13)];
        let last_second = NextDueSelector::new(at(today, 23, 59, 59), None);
        assert_eq!(last_second.select(&dates, today, false), Some(today));

        let fractional = today.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 500).unwrap());
        assert!(fractional.time() > TODAY_CUTOFF);
        let past_cutoff = NextDueSelector::new(fractional, None);
        assert_eq!(past_cutoff.select(&dates, today, false), Some(ymd(2024, 3, 13)));
    }
}

use chrono::{Datelike, Duration, Months, NaiveDate, TimeDelta, Weekday};

pub const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// `None` when the shift leaves chrono's calendar, however large `days` is.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Adds calendar months, clamping the day to the length of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

pub fn add_years(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    let target_year = date.year().checked_add(i32::try_from(years).ok()?)?;
    let day = date.day().min(days_in_month(target_year, date.month()));
    NaiveDate::from_ymd_opt(target_year, date.month(), day)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    i64::from(end.year() - start.year()) * 12 + i64::from(end.month()) - i64::from(start.month())
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days()
}

/// Length of `month`; out-of-calendar input counts as 31 days.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// First `weekday` on or after `date`.
pub fn next_weekday(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date + Duration::days(ahead)
}

/// The `order`-th `weekday` of the month; an order of 5 or more means the last one.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, order: u32) -> Option<NaiveDate> {
    if order >= 5 {
        return NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5)
            .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4));
    }
    let order = u8::try_from(order.max(1)).ok()?;
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, order)
}

/// Month number (1-12) for a three-letter month name.
pub fn month_from_name(name: &str) -> Option<u32> {
    let normalized = name.trim().to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|candidate| *candidate == normalized)
        .map(|idx| idx as u32 + 1)
}

pub fn month_label(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

/// Parses a `MM/DD` month-day pair.
pub fn parse_month_day(text: &str) -> Option<(u32, u32)> {
    let (month, day) = text.trim().split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;
    if !(1..=12).contains(&month) || day < 1 || day > days_in_month(2000, month) {
        return None;
    }
    Some((month, day))
}

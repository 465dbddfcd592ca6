use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::calendar::add_days;
use crate::error::{ChoreError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Manual overrides layered onto a generated schedule.
///
/// Tokens are persisted as space-separated `YYYY-MM-DD` dates (and
/// `YYYY-MM-DD:N` for offsets), kept sorted so the encoded form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideLedger {
    added: BTreeSet<NaiveDate>,
    removed: BTreeSet<NaiveDate>,
    offsets: BTreeMap<NaiveDate, i64>,
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from the three persisted token strings.
    pub fn from_tokens(
        added: Option<&str>,
        removed: Option<&str>,
        offsets: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            added: parse_dates(added.unwrap_or_default())?,
            removed: parse_dates(removed.unwrap_or_default())?,
            offsets: parse_offsets(offsets.unwrap_or_default())?,
        })
    }

    /// Returns false when the date was already added.
    pub fn add(&mut self, date: NaiveDate) -> bool {
        self.added.insert(date)
    }

    /// Returns false when the date was already removed.
    pub fn remove(&mut self, date: NaiveDate) -> bool {
        self.removed.insert(date)
    }

    /// Records an offset for `date`, returning the offset it replaced.
    pub fn offset(&mut self, date: NaiveDate, days: i64) -> Option<i64> {
        self.offsets.insert(date, days)
    }

    pub fn is_removed(&self, date: NaiveDate) -> bool {
        self.removed.contains(&date)
    }

    pub fn offset_for(&self, date: NaiveDate) -> Option<i64> {
        self.offsets.get(&date).copied()
    }

    pub fn added(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.added.iter().copied()
    }

    pub fn removed(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.removed.iter().copied()
    }

    pub fn offsets(&self) -> impl Iterator<Item = (NaiveDate, i64)> + '_ {
        self.offsets.iter().map(|(date, days)| (*date, *days))
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.offsets.is_empty()
    }

    pub fn added_tokens(&self) -> Option<String> {
        encode_dates(&self.added)
    }

    pub fn removed_tokens(&self) -> Option<String> {
        encode_dates(&self.removed)
    }

    pub fn offset_tokens(&self) -> Option<String> {
        if self.offsets.is_empty() {
            return None;
        }
        let tokens: Vec<String> = self
            .offsets
            .iter()
            .map(|(date, days)| format!("{}:{}", date.format(DATE_FORMAT), days))
            .collect();
        Some(tokens.join(" "))
    }
}

fn encode_dates(dates: &BTreeSet<NaiveDate>) -> Option<String> {
    if dates.is_empty() {
        return None;
    }
    let tokens: Vec<String> = dates
        .iter()
        .map(|date| date.format(DATE_FORMAT).to_string())
        .collect();
    Some(tokens.join(" "))
}

fn parse_date_token(token: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(token, DATE_FORMAT)
        .map_err(|err| ChoreError::invalid_token(token, err.to_string()))
}

pub fn parse_dates(text: &str) -> Result<BTreeSet<NaiveDate>> {
    text.split_whitespace().map(parse_date_token).collect()
}

pub fn parse_offsets(text: &str) -> Result<BTreeMap<NaiveDate, i64>> {
    let mut offsets = BTreeMap::new();
    for token in text.split_whitespace() {
        let (date, days) = token
            .split_once(':')
            .ok_or_else(|| ChoreError::invalid_token(token, "missing `:` separator"))?;
        let date = parse_date_token(date)?;
        let days: i64 = days
            .trim_start_matches('+')
            .parse()
            .map_err(|_| ChoreError::invalid_token(token, "offset is not an integer"))?;
        if add_days(date, days).is_none() {
            return Err(ChoreError::invalid_token(
                token,
                "offset moves the date outside the calendar",
            ));
        }
        offsets.insert(date, days);
    }
    Ok(offsets)
}

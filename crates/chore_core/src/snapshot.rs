use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Persisted form of a chore's mutable state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChoreSnapshot {
    /// Days until the next due date, empty when nothing is due.
    pub state: Option<i64>,
    pub last_completed: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    pub next_due_date: Option<NaiveDate>,
    pub overdue: bool,
    pub overdue_days: Option<i64>,
    pub offset_dates: Option<String>,
    pub add_dates: Option<String>,
    pub remove_dates: Option<String>,
    pub assignee: Option<String>,
    pub last_assigned: Option<String>,
}

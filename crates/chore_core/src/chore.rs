use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::assignment::{Assigner, AssignmentError, PERSON_PREFIX};
use crate::calendar::add_days;
use crate::config::ChoreConfig;
use crate::error::{ChoreError, Result};
use crate::events::{ChoreEvent, EventSink};
use crate::frequency::{rule_for, FrequencyRule, ScheduleContext};
use crate::ledger::OverrideLedger;
use crate::schedule::ScheduleGenerator;
use crate::selector::NextDueSelector;
use crate::snapshot::ChoreSnapshot;

/// Whether the host can process updates yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub is_running: bool,
    /// The entity is still being registered, so a missing id is expected.
    pub registration_pending: bool,
}

impl HostStatus {
    pub fn running() -> Self {
        Self {
            is_running: true,
            registration_pending: false,
        }
    }
}

/// Collaborators injected into the operations that talk to the host.
pub struct ChoreContext<'a> {
    pub now: NaiveDateTime,
    pub host: HostStatus,
    pub events: &'a dyn EventSink,
    pub assigner: Option<&'a dyn Assigner>,
}

impl<'a> ChoreContext<'a> {
    pub fn new(now: NaiveDateTime, events: &'a dyn EventSink) -> Self {
        Self {
            now,
            host: HostStatus::running(),
            events,
            assigner: None,
        }
    }

    pub fn with_host(mut self, host: HostStatus) -> Self {
        self.host = host;
        self
    }

    pub fn with_assigner(mut self, assigner: &'a dyn Assigner) -> Self {
        self.assigner = Some(assigner);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IconState {
    #[default]
    Normal,
    Today,
    Tomorrow,
    Overdue,
}

impl IconState {
    pub fn from_days(days: Option<i64>) -> Self {
        match days {
            Some(days) if days < 0 => IconState::Overdue,
            Some(0) => IconState::Today,
            Some(1) => IconState::Tomorrow,
            _ => IconState::Normal,
        }
    }
}

/// Attributes derived from the due dates, the completion record and now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedState {
    pub next_due_date: Option<NaiveDate>,
    pub days_until_due: Option<i64>,
    pub overdue: bool,
    pub overdue_days: Option<i64>,
    pub icon: IconState,
}

impl DerivedState {
    fn due_on(next_due_date: NaiveDate, today: NaiveDate) -> Self {
        let days = next_due_date.signed_duration_since(today).num_days();
        Self {
            next_due_date: Some(next_due_date),
            days_until_due: Some(days),
            overdue: days < 0,
            overdue_days: Some((-days).max(0)),
            icon: IconState::from_days(Some(days)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Already recomputed today, or the host is not running.
    Skipped,
    Aborted(ChoreError),
}

#[derive(Debug)]
pub struct Chore {
    config: ChoreConfig,
    rule: Box<dyn FrequencyRule>,
    entity_id: Option<String>,
    ledger: OverrideLedger,
    due_dates: Vec<NaiveDate>,
    last_completed: Option<NaiveDateTime>,
    last_updated: Option<NaiveDateTime>,
    derived: DerivedState,
    assignee: Option<String>,
    last_assigned: Option<String>,
}

impl Chore {
    pub fn new(config: ChoreConfig) -> Result<Self> {
        let config = config.normalized()?;
        let rule = rule_for(&config);
        let assignee = config.assignee_user.clone();
        Ok(Self {
            config,
            rule,
            entity_id: None,
            ledger: OverrideLedger::new(),
            due_dates: Vec::new(),
            last_completed: None,
            last_updated: None,
            derived: DerivedState::default(),
            assignee,
            last_assigned: None,
        })
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn set_entity_id(&mut self, entity_id: impl Into<String>) {
        self.entity_id = Some(entity_id.into());
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ChoreConfig {
        &self.config
    }

    pub fn ledger(&self) -> &OverrideLedger {
        &self.ledger
    }

    pub fn due_dates(&self) -> &[NaiveDate] {
        &self.due_dates
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn next_due_date(&self) -> Option<NaiveDate> {
        self.derived.next_due_date
    }

    pub fn days_until_due(&self) -> Option<i64> {
        self.derived.days_until_due
    }

    pub fn overdue(&self) -> bool {
        self.derived.overdue
    }

    pub fn overdue_days(&self) -> Option<i64> {
        self.derived.overdue_days
    }

    pub fn last_completed(&self) -> Option<NaiveDateTime> {
        self.last_completed
    }

    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.last_updated
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    pub fn last_assigned(&self) -> Option<&str> {
        self.last_assigned.as_deref()
    }

    pub fn icon_state(&self) -> IconState {
        self.derived.icon
    }

    /// Configured icon selector for the current state.
    pub fn icon(&self) -> &str {
        match self.derived.icon {
            IconState::Normal => &self.config.icon_normal,
            IconState::Today => &self.config.icon_today,
            IconState::Tomorrow => &self.config.icon_tomorrow,
            IconState::Overdue => &self.config.icon_overdue,
        }
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        if self.derived.days_until_due == Some(1) {
            "day"
        } else {
            "days"
        }
    }

    pub fn schedule_context(&self, now: NaiveDateTime) -> ScheduleContext<'_> {
        ScheduleContext {
            name: &self.config.name,
            now,
            start_date: self.config.start_date,
            last_completed: self.last_completed,
            range: self.config.month_range(),
        }
    }

    /// One generation pass from the current anchor, without touching state.
    pub fn generate_due_dates(&self, now: NaiveDateTime) -> Result<Vec<NaiveDate>> {
        ScheduleGenerator::new(self.rule.as_ref(), &self.ledger, self.config.forecast_dates)
            .generate(&self.schedule_context(now))
    }

    /// Replaces the due dates; on failure the previous ones are kept.
    fn load_due_dates(&mut self, now: NaiveDateTime) -> Result<()> {
        debug!(
            chore = %self.config.name,
            last_completed = ?self.last_completed,
            start_date = ?self.config.start_date,
            "loading due dates"
        );
        match self.generate_due_dates(now) {
            Ok(due_dates) => {
                debug!(chore = %self.config.name, ?due_dates, "calculated due dates");
                self.due_dates = due_dates;
                Ok(())
            }
            Err(err) => {
                error!(chore = %self.config.name, %err, "unable to calculate due dates");
                Err(err)
            }
        }
    }

    /// Skips chores already recomputed today, unless today's due date was
    /// just completed and the next cycle has to show up.
    pub fn ready_for_update(&self, now: NaiveDateTime) -> bool {
        let Some(last_updated) = self.last_updated else {
            return true;
        };
        let today = now.date();
        let completed_today = self
            .last_completed
            .is_some_and(|completed| completed.date() == today);
        if self.derived.next_due_date == Some(today) && completed_today {
            return true;
        }
        last_updated.date() != today
    }

    pub fn update(&mut self, ctx: &ChoreContext<'_>) -> UpdateOutcome {
        if !self.ready_for_update(ctx.now) || !ctx.host.is_running {
            return UpdateOutcome::Skipped;
        }

        let Some(entity_id) = self.entity_id.clone() else {
            let message = format!("entity id is not assigned for {}", self.config.name);
            if ctx.host.registration_pending {
                debug!(chore = %self.config.name, "entity id not yet assigned, initialization in progress");
            } else {
                warn!(chore = %self.config.name, "entity id is not assigned, skipping update");
            }
            return UpdateOutcome::Aborted(ChoreError::NotReady(message));
        };

        debug!(chore = %self.config.name, "calling update");
        if let Err(err) = self.load_due_dates(ctx.now) {
            return UpdateOutcome::Aborted(err);
        }
        debug!(chore = %self.config.name, "dates loaded, publishing event");
        ctx.events.publish(ChoreEvent::DatesLoaded {
            entity_id,
            due_dates: self.due_dates.clone(),
        });
        if !self.config.manual {
            self.update_state(ctx.now);
        }
        UpdateOutcome::Updated
    }

    pub fn complete(&mut self, completed_at: NaiveDateTime, ctx: &ChoreContext<'_>) {
        info!(chore = %self.config.name, %completed_at, "completing chore");
        self.last_completed = Some(completed_at);
        // A failed pass keeps the previous dates; the error is already logged.
        let _ = self.load_due_dates(ctx.now);
        if self.due_dates.is_empty() {
            warn!(
                chore = %self.config.name,
                "no due dates calculated after completion, check configuration"
            );
        }
        if self.config.auto_assign {
            self.rotate_assignee(ctx);
        }
        self.update_state(ctx.now);
    }

    fn rotate_assignee(&mut self, ctx: &ChoreContext<'_>) {
        let Some(assigner) = ctx.assigner else {
            warn!(chore = %self.config.name, "auto-assign is enabled but no assigner is available");
            return;
        };
        let result = assigner
            .next_assignee(self.last_assigned.as_deref())
            .and_then(|person| person.ok_or(AssignmentError::NoCandidates));
        match result {
            Ok(person) => {
                debug!(
                    chore = %self.config.name,
                    person = person.display_name(),
                    entity = %person.entity_id,
                    "assigned chore"
                );
                self.assignee = Some(person.entity_id.clone());
                self.last_assigned = Some(person.entity_id.clone());
                self.publish_assignment(ctx, Some(person.display_name().to_string()));
            }
            Err(AssignmentError::NoCandidates) => {
                warn!(chore = %self.config.name, "no person entities found for assignment");
                self.assignee = None;
            }
            Err(err) => {
                error!(chore = %self.config.name, %err, "error during assignment");
                self.assignee = None;
            }
        }
    }

    /// Assigns a person, or clears the assignee when `user_id` is empty.
    pub fn assign_user(&mut self, user_id: Option<&str>, ctx: &ChoreContext<'_>) {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            self.assignee = None;
            self.last_assigned = None;
            debug!(chore = %self.config.name, "cleared assignee");
            self.publish_assignment(ctx, None);
            self.update_state(ctx.now);
            return;
        };

        let person = match (user_id.starts_with(PERSON_PREFIX), ctx.assigner) {
            (true, Some(assigner)) => assigner.lookup(user_id).unwrap_or_else(|err| {
                warn!(chore = %self.config.name, %err, "person lookup failed");
                None
            }),
            _ => None,
        };
        let Some(person) = person else {
            warn!(
                chore = %self.config.name,
                user_id,
                "requested assignee entity not found or not a person"
            );
            return;
        };

        self.assignee = Some(user_id.to_string());
        self.last_assigned = Some(user_id.to_string());
        debug!(chore = %self.config.name, person = person.display_name(), user_id, "manually assigned chore");
        self.publish_assignment(ctx, Some(person.display_name().to_string()));
        self.update_state(ctx.now);
    }

    fn publish_assignment(&self, ctx: &ChoreContext<'_>, assignee_name: Option<String>) {
        ctx.events.publish(ChoreEvent::ChoreAssigned {
            entity_id: self.entity_id.clone().unwrap_or_default(),
            assignee_user_id: self.assignee.clone(),
            assignee_name,
        });
    }

    pub fn add_date(&mut self, date: NaiveDate, now: NaiveDateTime) {
        if !self.ledger.add(date) {
            warn!(chore = %self.config.name, %date, "date was already added");
        }
        self.refresh(now);
    }

    /// Removes `date`, or the next due date when none is given.
    pub fn remove_date(&mut self, date: Option<NaiveDate>, now: NaiveDateTime) {
        let Some(date) = date.or(self.derived.next_due_date) else {
            warn!(chore = %self.config.name, "no date to remove");
            return;
        };
        if !self.due_dates.contains(&date) {
            warn!(chore = %self.config.name, %date, "removed date is not in the current schedule");
        }
        if !self.ledger.remove(date) {
            warn!(chore = %self.config.name, %date, "date was already removed");
        }
        self.refresh(now);
    }

    /// Offsets `date`, or the next due date when none is given.
    pub fn offset_date(&mut self, offset: i64, date: Option<NaiveDate>, now: NaiveDateTime) {
        let Some(date) = date.or(self.derived.next_due_date) else {
            warn!(chore = %self.config.name, "no date to offset");
            return;
        };
        if add_days(date, offset).is_none() {
            warn!(chore = %self.config.name, %date, offset, "offset moves the date outside the calendar");
            return;
        }
        if let Some(previous) = self.ledger.offset(date, offset) {
            debug!(chore = %self.config.name, %date, previous, offset, "replaced offset");
        }
        self.refresh(now);
    }

    /// A failed pass leaves the due dates and derived state as they were.
    fn refresh(&mut self, now: NaiveDateTime) {
        if self.load_due_dates(now).is_ok() {
            self.update_state(now);
        }
    }

    /// Picks the next due date and derives the display attributes from it.
    pub fn update_state(&mut self, now: NaiveDateTime) {
        debug!(chore = %self.config.name, "looking for next chore date");
        self.last_updated = Some(now);
        let today = now.date();
        let start_date = self.schedule_context(now).calculate_start_date();
        let next_due_date = NextDueSelector::new(now, self.last_completed).select(
            &self.due_dates,
            start_date,
            false,
        );
        self.derived = match next_due_date {
            Some(next_due_date) => {
                let derived = DerivedState::due_on(next_due_date, today);
                debug!(
                    chore = %self.config.name,
                    %next_due_date,
                    days = ?derived.days_until_due,
                    "found next chore date"
                );
                derived
            }
            None => {
                warn!(chore = %self.config.name, "no next due date found, state cleared");
                DerivedState::default()
            }
        };
    }

    pub fn snapshot(&self) -> ChoreSnapshot {
        ChoreSnapshot {
            state: self.derived.days_until_due,
            last_completed: self.last_completed,
            last_updated: self.last_updated,
            next_due_date: self.derived.next_due_date,
            overdue: self.derived.overdue,
            overdue_days: self.derived.overdue_days,
            offset_dates: self.ledger.offset_tokens(),
            add_dates: self.ledger.added_tokens(),
            remove_dates: self.ledger.removed_tokens(),
            assignee: self.assignee.clone(),
            last_assigned: self.last_assigned.clone(),
        }
    }

    /// Restores persisted state. Nothing changes if a ledger token is malformed.
    pub fn restore(&mut self, snapshot: ChoreSnapshot) -> Result<()> {
        let ledger = OverrideLedger::from_tokens(
            snapshot.add_dates.as_deref(),
            snapshot.remove_dates.as_deref(),
            snapshot.offset_dates.as_deref(),
        )?;
        self.ledger = ledger;
        self.last_completed = snapshot.last_completed;
        // Due dates are not persisted, so the next update must regenerate them.
        self.last_updated = None;
        self.derived = DerivedState {
            next_due_date: snapshot.next_due_date,
            days_until_due: snapshot.state,
            overdue: snapshot.overdue,
            overdue_days: snapshot.overdue_days,
            icon: IconState::from_days(snapshot.state),
        };
        if snapshot.assignee.is_some() {
            self.assignee = snapshot.assignee;
        }
        self.last_assigned = snapshot.last_assigned;
        Ok(())
    }
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chore_core::assignment::{RoundRobinAssigner, StaticDirectory};
use chore_core::{Chore, ChoreConfig, ChoreService, EventQueue, HostStatus, IconState, UpdateOutcome};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const NOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub(crate) definitions: Option<PathBuf>,
    pub(crate) state: Option<PathBuf>,
    pub(crate) now: Option<NaiveDateTime>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("CHORE_CONFIG") {
            config.definitions = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("CHORE_STATE") {
            config.state = Some(PathBuf::from(path));
        }
        if let Ok(now) = std::env::var("CHORE_NOW") {
            let now = now.trim();
            if !now.is_empty() {
                config.now = Some(parse_now(now)?);
            }
        }
        Ok(config)
    }

    pub fn with_definitions(mut self, path: impl Into<PathBuf>) -> Self {
        self.definitions = Some(path.into());
        self
    }

    pub fn with_state(mut self, path: impl Into<PathBuf>) -> Self {
        self.state = Some(path.into());
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }
}

fn parse_now(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, NOW_FORMAT)
        .with_context(|| format!("CHORE_NOW `{value}` is not in {NOW_FORMAT} form"))
}

/// Contents of the definitions file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub chores: Vec<ChoreDefinition>,
    /// Persons available for assignment.
    #[serde(default)]
    pub directory: Option<StaticDirectory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoreDefinition {
    pub entity_id: String,
    #[serde(default)]
    pub config: ChoreConfig,
}

impl Definitions {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading chore definitions {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing chore definitions {}", path.display()))
    }

    pub fn into_service(self, events: Arc<EventQueue>) -> Result<ChoreService> {
        let mut builder = ChoreService::builder().with_event_sink(events);
        if let Some(directory) = self.directory {
            builder = builder.with_assigner(Box::new(RoundRobinAssigner::new(directory)));
        }
        for definition in self.chores {
            builder = builder.add_chore(definition.entity_id, definition.config);
        }
        builder.build().context("failed to initialize chore service")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Update,
    Show { entity_id: Option<String> },
    Complete { entity_id: String, completed_at: Option<NaiveDateTime> },
    Add { entity_id: String, date: NaiveDate },
    Remove { entity_id: String, date: Option<NaiveDate> },
    Offset { entity_id: String, offset: i64, date: Option<NaiveDate> },
    Assign { entity_id: String, user_id: Option<String> },
}

impl Command {
    pub const USAGE: &'static str = "usage: chore <update | show [ENTITY] | complete ENTITY [YYYY-MM-DDTHH:MM:SS] | add ENTITY DATE | remove ENTITY [DATE] | offset ENTITY DAYS [DATE] | assign ENTITY [PERSON]>";

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Ok(Command::Update);
        };
        let mut entity = || args.next().ok_or_else(|| anyhow!("missing chore entity id\n{}", Self::USAGE));

        let command = match name.as_str() {
            "update" => Command::Update,
            "show" => Command::Show {
                entity_id: entity().ok(),
            },
            "complete" => Command::Complete {
                entity_id: entity()?,
                completed_at: entity().ok().map(|raw| parse_now(&raw)).transpose()?,
            },
            "add" => Command::Add {
                entity_id: entity()?,
                date: parse_date(&entity().context("missing date to add")?)?,
            },
            "remove" => Command::Remove {
                entity_id: entity()?,
                date: entity().ok().map(|raw| parse_date(&raw)).transpose()?,
            },
            "offset" => {
                let entity_id = entity()?;
                let raw = entity().context("missing offset in days")?;
                let offset = raw
                    .trim_start_matches('+')
                    .parse::<i64>()
                    .with_context(|| format!("`{raw}` is not a number of days"))?;
                Command::Offset {
                    entity_id,
                    offset,
                    date: entity().ok().map(|raw| parse_date(&raw)).transpose()?,
                }
            }
            "assign" => Command::Assign {
                entity_id: entity()?,
                user_id: entity().ok(),
            },
            other => bail!("unknown command `{other}`\n{}", Self::USAGE),
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument `{extra}`\n{}", Self::USAGE);
        }
        Ok(command)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("`{value}` is not a YYYY-MM-DD date"))
}

/// One line of `show` output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChoreSummary {
    pub entity_id: String,
    pub name: String,
    pub state: Option<i64>,
    pub unit_of_measurement: &'static str,
    pub next_due_date: Option<String>,
    pub overdue: bool,
    pub overdue_days: Option<i64>,
    pub icon: String,
    pub icon_state: IconState,
    pub assignee: Option<String>,
    pub due_dates: Vec<NaiveDate>,
    /// Display hints passed through for frontends.
    pub show_overdue_today: bool,
    pub hidden: bool,
}

impl ChoreSummary {
    fn from_chore(entity_id: &str, chore: &Chore) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            name: chore.name().to_string(),
            state: chore.days_until_due(),
            unit_of_measurement: chore.unit_of_measurement(),
            next_due_date: chore
                .next_due_date()
                .map(|date| format_date(date, &chore.config().date_format)),
            overdue: chore.overdue(),
            overdue_days: chore.overdue_days(),
            icon: chore.icon().to_string(),
            icon_state: chore.icon_state(),
            assignee: chore.assignee().map(str::to_string),
            due_dates: chore.due_dates().to_vec(),
            show_overdue_today: chore.config().show_overdue_today,
            hidden: chore.config().hidden,
        }
    }
}

/// Falls back to ISO form when the configured format is unusable.
fn format_date(date: NaiveDate, format: &str) -> String {
    use std::fmt::Write as _;
    let mut text = String::new();
    if write!(text, "{}", date.format(format)).is_err() {
        return date.to_string();
    }
    text
}

/// Loads definitions and state, runs one command, writes events and
/// summaries as JSON lines, then saves state.
pub fn run(config: &AppConfig, command: Command, out: &mut dyn Write) -> Result<()> {
    let definitions_path = config
        .definitions
        .as_deref()
        .ok_or_else(|| anyhow!("CHORE_CONFIG must point at a chore definitions file"))?;
    let events = Arc::new(EventQueue::new());
    let service = Definitions::load(definitions_path)?.into_service(events.clone())?;

    if let Some(state) = &config.state {
        let restored = service.load_snapshots(state)?;
        info!(restored, path = %state.display(), "restored chore state");
    }

    let now = config.now();
    info!(?command, %now, "running chore command");
    match &command {
        Command::Update => {
            for (entity_id, outcome) in service.update_all(now, HostStatus::running()) {
                if let UpdateOutcome::Aborted(err) = outcome {
                    warn!(entity_id = %entity_id, %err, "update aborted");
                }
            }
        }
        Command::Show { .. } => {}
        Command::Complete {
            entity_id,
            completed_at,
        } => service.complete(entity_id, completed_at.unwrap_or(now), now)?,
        Command::Add { entity_id, date } => service.add_date(entity_id, *date, now)?,
        Command::Remove { entity_id, date } => service.remove_date(entity_id, *date, now)?,
        Command::Offset {
            entity_id,
            offset,
            date,
        } => service.offset_date(entity_id, *offset, *date, now)?,
        Command::Assign { entity_id, user_id } => {
            service.assign_user(entity_id, user_id.as_deref(), now)?
        }
    }

    for event in events.drain() {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }

    let shown = match &command {
        Command::Show {
            entity_id: Some(entity_id),
        } => vec![entity_id.clone()],
        _ => service.entity_ids(),
    };
    for entity_id in shown {
        let summary = service.inspect(&entity_id, |chore| ChoreSummary::from_chore(&entity_id, chore))?;
        writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    }

    if let Some(state) = &config.state {
        service.save_snapshots(state)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use serde_json::Value;
    use tempfile::tempdir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32) -> NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    const DEFINITIONS: &str = r#"{
        "chores": [
            {
                "entity_id": "sensor.trash",
                "config": {
                    "name": "Trash",
                    "frequency": "every-n-days",
                    "period": 3,
                    "start_date": "2024-01-01",
                    "forecast_dates": 5,
                    "auto_assign": true
                }
            }
        ],
        "directory": {
            "persons": [{"entity_id": "person.alex", "name": "Alex"}]
        }
    }"#;

    fn lines(output: &[u8]) -> Vec<Value> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(Vec::<String>::new()).unwrap(), Command::Update);
        assert_eq!(
            Command::parse(["offset", "sensor.trash", "+2", "2024-01-10"]).unwrap(),
            Command::Offset {
                entity_id: "sensor.trash".into(),
                offset: 2,
                date: Some(ymd(2024, 1, 10)),
            }
        );
        assert_eq!(
            Command::parse(["remove", "sensor.trash"]).unwrap(),
            Command::Remove {
                entity_id: "sensor.trash".into(),
                date: None,
            }
        );
        assert_eq!(
            Command::parse(["complete", "sensor.trash", "2024-01-04T07:30:00"]).unwrap(),
            Command::Complete {
                entity_id: "sensor.trash".into(),
                completed_at: Some(at(ymd(2024, 1, 4), 7) + chrono::Duration::minutes(30)),
            }
        );
        assert!(Command::parse(["add", "sensor.trash"]).is_err());
        assert!(Command::parse(["add", "sensor.trash", "01/02/2024"]).is_err());
        assert!(Command::parse(["frobnicate"]).is_err());
        assert!(Command::parse(["show", "a", "b"]).is_err());
    }

    #[test]
    fn update_then_complete_persists_state() {
        let temp = tempdir().unwrap();
        let definitions = temp.path().join("chores.json");
        let state = temp.path().join("state.json");
        fs::write(&definitions, DEFINITIONS).unwrap();
        let config = AppConfig::default()
            .with_definitions(&definitions)
            .with_state(&state)
            .with_now(at(ymd(2024, 1, 2), 8));

        let mut output = Vec::new();
        run(&config, Command::Update, &mut output).unwrap();
        let printed = lines(&output);
        assert_eq!(printed[0]["event_type"], "chore_helper_loaded");
        assert_eq!(printed[1]["entity_id"], "sensor.trash");
        assert_eq!(printed[1]["next_due_date"], "Jan-01-2024");
        assert_eq!(printed[1]["overdue"], true);
        assert_eq!(printed[1]["icon"], "mdi:bell-alert");
        assert_eq!(printed[1]["show_overdue_today"], false);

        let mut output = Vec::new();
        let complete = Command::Complete {
            entity_id: "sensor.trash".into(),
            completed_at: None,
        };
        run(&config, complete, &mut output).unwrap();
        let printed = lines(&output);
        assert_eq!(printed[0]["event_type"], "chore_assigned");
        assert_eq!(printed[0]["assignee_name"], "Alex");
        assert_eq!(printed[1]["next_due_date"], "Jan-04-2024");
        assert_eq!(printed[1]["state"], 2);
        assert_eq!(printed[1]["unit_of_measurement"], "days");

        let saved: Value = serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
        assert_eq!(saved["sensor.trash"]["last_completed"], "2024-01-02T08:00:00");
        assert_eq!(saved["sensor.trash"]["assignee"], "person.alex");
    }

    #[test]
    fn second_update_on_the_same_day_reloads_due_dates() {
        let temp = tempdir().unwrap();
        let definitions = temp.path().join("chores.json");
        let state = temp.path().join("state.json");
        fs::write(&definitions, DEFINITIONS).unwrap();
        let base = AppConfig::default()
            .with_definitions(&definitions)
            .with_state(&state);

        let mut first = Vec::new();
        run(&base.clone().with_now(at(ymd(2024, 1, 2), 8)), Command::Update, &mut first).unwrap();
        let mut second = Vec::new();
        run(&base.with_now(at(ymd(2024, 1, 2), 10)), Command::Update, &mut second).unwrap();

        let first = lines(&first);
        let second = lines(&second);
        assert_eq!(second[0]["event_type"], "chore_helper_loaded");
        assert_eq!(second[1]["due_dates"], first[1]["due_dates"]);
        assert_eq!(second[1]["due_dates"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn unusable_date_format_falls_back_to_iso() {
        assert_eq!(format_date(ymd(2024, 1, 4), "%b-%d-%Y"), "Jan-04-2024");
        assert_eq!(format_date(ymd(2024, 1, 4), "%Q"), "2024-01-04");
    }

    #[test]
    fn missing_definitions_is_an_error() {
        let mut output = Vec::new();
        assert!(run(&AppConfig::default(), Command::Update, &mut output).is_err());
    }
}

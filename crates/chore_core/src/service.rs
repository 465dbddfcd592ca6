use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use tracing::instrument;

use crate::{
    assignment::Assigner,
    chore::{Chore, ChoreContext, HostStatus, UpdateOutcome},
    config::ChoreConfig,
    events::{EventQueue, EventSink},
    snapshot::ChoreSnapshot,
};

/// Host-side registry of chores keyed by entity id.
pub struct ChoreService {
    chores: RwLock<HashMap<String, Chore>>,
    event_sink: Arc<dyn EventSink>,
    assigner: Option<Box<dyn Assigner>>,
}

pub struct ChoreServiceBuilder {
    chores: Vec<(String, ChoreConfig)>,
    event_sink: Option<Arc<dyn EventSink>>,
    assigner: Option<Box<dyn Assigner>>,
}

impl Default for ChoreServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChoreServiceBuilder {
    pub fn new() -> Self {
        Self {
            chores: Vec::new(),
            event_sink: None,
            assigner: None,
        }
    }

    pub fn add_chore(mut self, entity_id: impl Into<String>, config: ChoreConfig) -> Self {
        let entity_id = entity_id.into();
        if !self.chores.iter().any(|(id, _)| *id == entity_id) {
            self.chores.push((entity_id, config));
        }
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_assigner(mut self, assigner: Box<dyn Assigner>) -> Self {
        self.assigner = Some(assigner);
        self
    }

    pub fn build(self) -> Result<ChoreService> {
        let service = ChoreService {
            chores: RwLock::new(HashMap::new()),
            event_sink: self
                .event_sink
                .unwrap_or_else(|| Arc::new(EventQueue::new())),
            assigner: self.assigner,
        };
        for (entity_id, config) in self.chores {
            service.register(entity_id, config)?;
        }
        Ok(service)
    }
}

impl ChoreService {
    pub fn builder() -> ChoreServiceBuilder {
        ChoreServiceBuilder::new()
    }

    /// Registering an id twice keeps the first chore.
    pub fn register(&self, entity_id: impl Into<String>, config: ChoreConfig) -> Result<()> {
        let entity_id = entity_id.into();
        let mut chores = self.chores.write();
        if chores.contains_key(&entity_id) {
            return Ok(());
        }
        let name = config.name.clone();
        let chore = Chore::new(config)
            .with_context(|| format!("invalid configuration for chore `{name}`"))?
            .with_entity_id(entity_id.clone());
        tracing::debug!(entity_id = %entity_id, "registered chore");
        chores.insert(entity_id, chore);
        Ok(())
    }

    pub fn unregister(&self, entity_id: &str) -> bool {
        self.chores.write().remove(entity_id).is_some()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.chores.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Runs `f` against a chore without mutating it.
    pub fn inspect<R>(&self, entity_id: &str, f: impl FnOnce(&Chore) -> R) -> Result<R> {
        let chores = self.chores.read();
        let chore = chores
            .get(entity_id)
            .ok_or_else(|| anyhow!("unknown chore `{entity_id}`"))?;
        Ok(f(chore))
    }

    pub fn due_dates(&self, entity_id: &str) -> Result<Vec<NaiveDate>> {
        self.inspect(entity_id, |chore| chore.due_dates().to_vec())
    }

    #[instrument(skip(self))]
    pub fn update_all(&self, now: NaiveDateTime, host: HostStatus) -> Vec<(String, UpdateOutcome)> {
        let ctx = self.context(now).with_host(host);
        let mut chores = self.chores.write();
        let mut outcomes: Vec<(String, UpdateOutcome)> = chores
            .iter_mut()
            .map(|(id, chore)| (id.clone(), chore.update(&ctx)))
            .collect();
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    #[instrument(skip(self))]
    pub fn update(&self, entity_id: &str, now: NaiveDateTime, host: HostStatus) -> Result<UpdateOutcome> {
        let ctx = self.context(now).with_host(host);
        self.with_chore_mut(entity_id, |chore| chore.update(&ctx))
    }

    #[instrument(skip(self))]
    pub fn complete(&self, entity_id: &str, completed_at: NaiveDateTime, now: NaiveDateTime) -> Result<()> {
        let ctx = self.context(now);
        self.with_chore_mut(entity_id, |chore| chore.complete(completed_at, &ctx))
    }

    #[instrument(skip(self))]
    pub fn add_date(&self, entity_id: &str, date: NaiveDate, now: NaiveDateTime) -> Result<()> {
        self.with_chore_mut(entity_id, |chore| chore.add_date(date, now))
    }

    #[instrument(skip(self))]
    pub fn remove_date(&self, entity_id: &str, date: Option<NaiveDate>, now: NaiveDateTime) -> Result<()> {
        self.with_chore_mut(entity_id, |chore| chore.remove_date(date, now))
    }

    #[instrument(skip(self))]
    pub fn offset_date(
        &self,
        entity_id: &str,
        offset: i64,
        date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> Result<()> {
        self.with_chore_mut(entity_id, |chore| chore.offset_date(offset, date, now))
    }

    #[instrument(skip(self))]
    pub fn assign_user(&self, entity_id: &str, user_id: Option<&str>, now: NaiveDateTime) -> Result<()> {
        let ctx = self.context(now);
        self.with_chore_mut(entity_id, |chore| chore.assign_user(user_id, &ctx))
    }

    pub fn snapshot(&self, entity_id: &str) -> Result<ChoreSnapshot> {
        self.inspect(entity_id, Chore::snapshot)
    }

    pub fn snapshots(&self) -> BTreeMap<String, ChoreSnapshot> {
        self.chores
            .read()
            .iter()
            .map(|(id, chore)| (id.clone(), chore.snapshot()))
            .collect()
    }

    pub fn restore(&self, entity_id: &str, snapshot: ChoreSnapshot) -> Result<()> {
        self.with_chore_mut(entity_id, |chore| chore.restore(snapshot))?
            .with_context(|| format!("unable to restore chore `{entity_id}`"))
    }

    pub fn save_snapshots(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(&self.snapshots())?;
        fs::write(path, payload).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Restores every registered chore found in the file. A missing file
    /// restores nothing; snapshots for unknown ids are ignored.
    pub fn load_snapshots(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let snapshots: BTreeMap<String, ChoreSnapshot> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        let mut restored = 0;
        for (entity_id, snapshot) in snapshots {
            if !self.chores.read().contains_key(&entity_id) {
                tracing::debug!(entity_id = %entity_id, "skipping snapshot for unknown chore");
                continue;
            }
            self.restore(&entity_id, snapshot)?;
            restored += 1;
        }
        Ok(restored)
    }
}

impl ChoreService {
    fn context(&self, now: NaiveDateTime) -> ChoreContext<'_> {
        let ctx = ChoreContext::new(now, self.event_sink.as_ref());
        match &self.assigner {
            Some(assigner) => ctx.with_assigner(assigner.as_ref()),
            None => ctx,
        }
    }

    fn with_chore_mut<R>(&self, entity_id: &str, f: impl FnOnce(&mut Chore) -> R) -> Result<R> {
        let mut chores = self.chores.write();
        let chore = chores
            .get_mut(entity_id)
            .ok_or_else(|| anyhow!("unknown chore `{entity_id}`"))?;
        Ok(f(chore))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Frequency;
    use chrono::NaiveTime;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn duplicate_registration_keeps_first_chore() {
        let service = ChoreService::builder()
            .add_chore(
                "sensor.trash",
                ChoreConfig::new("Trash", Frequency::EveryNDays).with_start_date(ymd(2024, 1, 1)),
            )
            .build()
            .unwrap();
        service
            .register("sensor.trash", ChoreConfig::new("Other", Frequency::Blank))
            .unwrap();
        let name = service
            .inspect("sensor.trash", |chore| chore.name().to_string())
            .unwrap();
        assert_eq!(name, "Trash");
        assert_eq!(service.entity_ids(), vec!["sensor.trash".to_string()]);
    }

    #[test]
    fn unknown_chore_is_an_error() {
        let service = ChoreService::builder().build().unwrap();
        let now = ymd(2024, 1, 1).and_time(NaiveTime::MIN);
        assert!(service.complete("sensor.nope", now, now).is_err());
        assert!(!service.unregister("sensor.nope"));
    }

    #[test]
    fn invalid_configuration_fails_registration() {
        let mut config = ChoreConfig::new("Taxes", Frequency::EveryNYears);
        config.date = Some("99/99".into());
        let result = ChoreService::builder().add_chore("sensor.taxes", config).build();
        assert!(result.is_err());
    }
}

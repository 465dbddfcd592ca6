use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PERSON_PREFIX: &str = "person.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub entity_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Host user the person is linked to.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Person {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.entity_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("no person entities available for assignment")]
    NoCandidates,
    #[error("person lookup failed: {0}")]
    Lookup(String),
}

/// Decides who a chore goes to next. Called on completion when auto-assign is on.
pub trait Assigner: Send + Sync {
    fn next_assignee(&self, last_assigned: Option<&str>) -> Result<Option<Person>, AssignmentError>;

    fn lookup(&self, entity_id: &str) -> Result<Option<Person>, AssignmentError>;
}

/// Where person and user records come from.
pub trait PersonDirectory: Send + Sync {
    fn persons(&self) -> Result<Vec<Person>, AssignmentError>;
    fn users(&self) -> Result<Vec<User>, AssignmentError>;
}

/// Fixed directory, used by the command-line host and in tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl PersonDirectory for StaticDirectory {
    fn persons(&self) -> Result<Vec<Person>, AssignmentError> {
        Ok(self.persons.clone())
    }

    fn users(&self) -> Result<Vec<User>, AssignmentError> {
        Ok(self.users.clone())
    }
}

/// Rotates through persons, preferring those linked to active users.
#[derive(Debug, Clone)]
pub struct RoundRobinAssigner<D> {
    directory: D,
}

impl<D: PersonDirectory> RoundRobinAssigner<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    fn candidates(&self) -> Result<Vec<Person>, AssignmentError> {
        let persons: Vec<Person> = self
            .directory
            .persons()?
            .into_iter()
            .filter(|person| person.entity_id.starts_with(PERSON_PREFIX))
            .collect();

        let linked: Vec<Person> = match self.directory.users() {
            Ok(users) => {
                let eligible: Vec<&str> = users
                    .iter()
                    .filter(|user| !user.is_system && user.is_active)
                    .map(|user| user.id.as_str())
                    .collect();
                persons
                    .iter()
                    .filter(|person| {
                        person
                            .user_id
                            .as_deref()
                            .is_some_and(|id| eligible.contains(&id))
                    })
                    .cloned()
                    .collect()
            }
            Err(err) => {
                tracing::debug!(%err, "user lookup failed, considering all persons");
                Vec::new()
            }
        };

        let mut candidates = if linked.is_empty() { persons } else { linked };
        candidates.sort_by(|a, b| {
            let a_name = a.name.as_deref().unwrap_or_default().to_lowercase();
            let b_name = b.name.as_deref().unwrap_or_default().to_lowercase();
            a_name
                .cmp(&b_name)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        Ok(candidates)
    }
}

impl<D: PersonDirectory> Assigner for RoundRobinAssigner<D> {
    fn next_assignee(&self, last_assigned: Option<&str>) -> Result<Option<Person>, AssignmentError> {
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let next = last_assigned
            .and_then(|last| candidates.iter().position(|person| person.entity_id == last))
            .map(|idx| (idx + 1) % candidates.len())
            .unwrap_or(0);
        Ok(candidates.into_iter().nth(next))
    }

    fn lookup(&self, entity_id: &str) -> Result<Option<Person>, AssignmentError> {
        Ok(self
            .directory
            .persons()?
            .into_iter()
            .find(|person| person.entity_id == entity_id))
    }
}

pub mod assignment;
pub mod calendar;
pub mod chore;
pub mod config;
pub mod error;
pub mod events;
pub mod frequency;
pub mod ledger;
pub mod range;
pub mod schedule;
pub mod selector;
pub mod service;
pub mod snapshot;

pub use crate::chore::{Chore, ChoreContext, DerivedState, HostStatus, IconState, UpdateOutcome};
pub use crate::config::{ChoreConfig, Frequency};
pub use crate::error::ChoreError;
pub use crate::events::{ChoreEvent, EventQueue, EventSink};
pub use crate::service::{ChoreService, ChoreServiceBuilder};
pub use crate::snapshot::ChoreSnapshot;

use std::collections::VecDeque;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ChoreEvent {
    /// Fired after every generation pass triggered by an update.
    #[serde(rename = "chore_helper_loaded")]
    DatesLoaded {
        entity_id: String,
        due_dates: Vec<NaiveDate>,
    },
    ChoreAssigned {
        entity_id: String,
        assignee_user_id: Option<String>,
        assignee_name: Option<String>,
    },
}

/// Host adapters deliver chore events; publishing must not block on delivery.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ChoreEvent);
}

/// Buffers events until the caller drains them.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Mutex<VecDeque<ChoreEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ChoreEvent> {
        self.pending.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl EventSink for EventQueue {
    fn publish(&self, event: ChoreEvent) {
        self.pending.lock().push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_publish_order() {
        let queue = EventQueue::new();
        queue.publish(ChoreEvent::DatesLoaded {
            entity_id: "sensor.trash".into(),
            due_dates: vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()],
        });
        queue.publish(ChoreEvent::ChoreAssigned {
            entity_id: "sensor.trash".into(),
            assignee_user_id: None,
            assignee_name: None,
        });
        assert_eq!(queue.len(), 2);
        let events = queue.drain();
        assert!(matches!(events[0], ChoreEvent::DatesLoaded { .. }));
        assert!(matches!(events[1], ChoreEvent::ChoreAssigned { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn events_serialize_with_host_event_names() {
        let event = ChoreEvent::DatesLoaded {
            entity_id: "sensor.trash".into(),
            due_dates: vec![NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "chore_helper_loaded");
        assert_eq!(json["due_dates"][0], "2024-01-04");
    }
}

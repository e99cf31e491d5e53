//! Per-node record of lifecycle transitions.
//!
//! The expirer keys its time-in-state decisions off the `failed` event, so
//! history must round-trip through the store with the rest of the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Agent, NodeState};

/// The kind of lifecycle event a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    Provisioned,
    Readied,
    Reserved,
    Activated,
    Deactivated,
    Deallocated,
    Failed,
    Parked,
}

impl HistoryEventType {
    /// The event recorded when a node enters `state`.
    pub fn for_state(state: NodeState) -> Self {
        match state {
            NodeState::Provisioned => Self::Provisioned,
            NodeState::Ready => Self::Readied,
            NodeState::Reserved => Self::Reserved,
            NodeState::Active => Self::Activated,
            NodeState::Inactive => Self::Deactivated,
            NodeState::Dirty => Self::Deallocated,
            NodeState::Failed => Self::Failed,
            NodeState::Parked => Self::Parked,
        }
    }
}

/// One recorded lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_type: HistoryEventType,
    pub at: DateTime<Utc>,
    pub agent: Agent,
}

/// Lifecycle transitions of a node, most recent occurrence per event type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryEvent>);

impl History {
    /// Record an event, replacing any earlier occurrence of the same type.
    pub fn with_event(mut self, event: HistoryEvent) -> Self {
        self.0.retain(|e| e.event_type != event.event_type);
        self.0.push(event);
        self
    }

    /// When the given event last happened, if it did.
    pub fn at(&self, event_type: HistoryEventType) -> Option<DateTime<Utc>> {
        self.0
            .iter()
            .find(|e| e.event_type == event_type)
            .map(|e| e.at)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEvent> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_latest_event_wins() {
        let first = Utc::now();
        let second = first + Duration::hours(1);
        let history = History::default()
            .with_event(HistoryEvent {
                event_type: HistoryEventType::Failed,
                at: first,
                agent: Agent::System,
            })
            .with_event(HistoryEvent {
                event_type: HistoryEventType::Failed,
                at: second,
                agent: Agent::System,
            });
        assert_eq!(history.at(HistoryEventType::Failed), Some(second));
        assert_eq!(history.iter().count(), 1);
    }

    #[test]
    fn test_missing_event_is_none() {
        assert_eq!(History::default().at(HistoryEventType::Failed), None);
    }
}

//! Route modules.

pub mod areas;
pub mod health;
pub mod peers;
pub mod quests;

use serde::Serialize;
use uuid::Uuid;

use questline_quest::domain::events::QuestEvent;

/// One quest event emitted while a command settled.
#[derive(Debug, Serialize)]
pub struct EventSummary {
    /// The peer whose driver emitted the event.
    pub peer_id: u32,
    /// Event type name.
    pub event_type: String,
    /// Unique event identifier.
    pub event_id: Uuid,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Events emitted across the session, in pump order.
    pub events: Vec<EventSummary>,
}

impl CommandResponse {
    pub(crate) fn from_events(events: &[QuestEvent]) -> Self {
        Self {
            events: events
                .iter()
                .map(|event| EventSummary {
                    peer_id: event.metadata.peer_id.get(),
                    event_type: event.metadata.event_type.clone(),
                    event_id: event.metadata.event_id,
                })
                .collect(),
        }
    }
}

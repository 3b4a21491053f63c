//! Domain events for the Quest Progression context.

use questline_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

/// Emitted when a quest is (re)started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestStarted {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
    /// Quest display name.
    pub name: String,
    /// The objective the quest starts on.
    pub objective_index: usize,
}

/// Emitted when a quest's objective cursor moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestUpdated {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
    /// The new current objective.
    pub current_objective_index: usize,
}

/// Emitted once when a quest is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCompleted {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
    /// Quest display name.
    pub name: String,
}

/// Emitted when an objective's count moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveUpdated {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
    /// Position of the objective in the quest.
    pub objective_index: usize,
    /// Count after the update.
    pub current_count: u32,
    /// Count needed for completion.
    pub required_count: u32,
}

/// Emitted once when an objective becomes complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveCompleted {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
    /// Position of the objective in the quest.
    pub objective_index: usize,
}

/// Event type identifier for [`QuestStarted`].
pub const QUEST_STARTED_EVENT_TYPE: &str = "quest.started";

/// Event type identifier for [`QuestUpdated`].
pub const QUEST_UPDATED_EVENT_TYPE: &str = "quest.updated";

/// Event type identifier for [`QuestCompleted`].
pub const QUEST_COMPLETED_EVENT_TYPE: &str = "quest.completed";

/// Event type identifier for [`ObjectiveUpdated`].
pub const OBJECTIVE_UPDATED_EVENT_TYPE: &str = "quest.objective_updated";

/// Event type identifier for [`ObjectiveCompleted`].
pub const OBJECTIVE_COMPLETED_EVENT_TYPE: &str = "quest.objective_completed";

/// Event payload variants for the Quest Progression context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestEventKind {
    /// A quest has started.
    QuestStarted(QuestStarted),
    /// A quest's current objective has moved.
    QuestUpdated(QuestUpdated),
    /// A quest has been completed.
    QuestCompleted(QuestCompleted),
    /// An objective's count has moved.
    ObjectiveUpdated(ObjectiveUpdated),
    /// An objective has been completed.
    ObjectiveCompleted(ObjectiveCompleted),
}

impl QuestEventKind {
    /// Returns the event type name for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::QuestStarted(_) => QUEST_STARTED_EVENT_TYPE,
            Self::QuestUpdated(_) => QUEST_UPDATED_EVENT_TYPE,
            Self::QuestCompleted(_) => QUEST_COMPLETED_EVENT_TYPE,
            Self::ObjectiveUpdated(_) => OBJECTIVE_UPDATED_EVENT_TYPE,
            Self::ObjectiveCompleted(_) => OBJECTIVE_COMPLETED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Quest Progression context.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: QuestEventKind,
}

impl DomainEvent for QuestEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("QuestEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

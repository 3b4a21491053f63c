//! Quest messages replicated between peers.

use questline_core::net::WirePayload;
use serde::{Deserialize, Serialize};

use super::objective::ObjectiveKind;
use super::snapshot::ProgressSnapshot;

/// Message type for [`QuestMessage::StartQuest`].
pub const START_QUEST_MESSAGE_TYPE: &str = "quest.start";

/// Message type for [`QuestMessage::CompleteQuest`].
pub const COMPLETE_QUEST_MESSAGE_TYPE: &str = "quest.complete";

/// Message type for [`QuestMessage::UpdateProgress`].
pub const UPDATE_PROGRESS_MESSAGE_TYPE: &str = "quest.update_progress";

/// Message type for [`QuestMessage::Snapshot`].
pub const SNAPSHOT_MESSAGE_TYPE: &str = "quest.snapshot";

/// A progression operation replayed on a remote peer's driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestMessage {
    /// Start (or restart) the quest at `quest_index`.
    StartQuest {
        /// Quest position in the sequence.
        quest_index: usize,
    },
    /// Complete the quest at `quest_index`.
    CompleteQuest {
        /// Quest position in the sequence.
        quest_index: usize,
    },
    /// Apply progress to the receiver's current quest.
    UpdateProgress {
        /// Objective kind reported.
        kind: ObjectiveKind,
        /// Target reported.
        target_id: String,
        /// Amount reported.
        amount: u32,
    },
    /// Merge the sender's progress into the receiver's.
    Snapshot(ProgressSnapshot),
}

impl WirePayload for QuestMessage {
    fn message_type(&self) -> &'static str {
        match self {
            Self::StartQuest { .. } => START_QUEST_MESSAGE_TYPE,
            Self::CompleteQuest { .. } => COMPLETE_QUEST_MESSAGE_TYPE,
            Self::UpdateProgress { .. } => UPDATE_PROGRESS_MESSAGE_TYPE,
            Self::Snapshot(_) => SNAPSHOT_MESSAGE_TYPE,
        }
    }
}

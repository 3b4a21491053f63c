//! Serializable progress snapshots used to reconcile peers.
//!
//! Every peer runs its own progression driver, and local-only progress
//! (kills, pickups, conversations) is not replicated. Snapshots are the
//! explicit way to pull a peer's state forward: merging is monotonic, so a
//! snapshot can only add progress, never remove it.

use serde::{Deserialize, Serialize};

/// Progress of one objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    /// `current_count` of the objective.
    pub current_count: u32,
    /// Per-item progress of a multi-item collect, in authoring order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_progress: Vec<u32>,
}

/// Progress of one quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    /// Whether the quest is completed.
    pub is_completed: bool,
    /// The objective cursor.
    pub current_objective_index: usize,
    /// Progress per objective, in authoring order.
    pub objectives: Vec<ObjectiveProgress>,
}

/// Progress of a whole quest sequence on one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Fingerprint of the catalog the sequence was built from.
    pub catalog_fingerprint: String,
    /// The active quest.
    pub current_quest_index: usize,
    /// Progress per quest, in sequence order.
    pub quests: Vec<QuestProgress>,
}

/// What a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Objectives whose counts moved.
    pub objectives_advanced: usize,
    /// Objectives that became complete.
    pub objectives_completed: usize,
    /// Quests that became complete.
    pub quests_completed: usize,
}

impl ReconcileReport {
    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

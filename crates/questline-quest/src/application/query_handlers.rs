//! Query handlers for the Quest Progression context.
//!
//! Builds read-only view DTOs from a peer's progression driver.

use serde::Serialize;

use crate::application::progression::ProgressionDriver;
use crate::domain::objective::{Objective, ObjectiveKind};
use crate::domain::quest::{CompletionPolicy, Quest};

/// Read-only view of one collect item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectItemView {
    /// Item identifier.
    pub item_id: String,
    /// Quantity collected so far.
    pub progress: u32,
    /// Quantity needed.
    pub required: u32,
}

/// Read-only view of an objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveView {
    /// Display name.
    pub name: String,
    /// Objective kind.
    pub kind: ObjectiveKind,
    /// Target identifier (empty means any target).
    pub target_id: String,
    /// Current count.
    pub current_count: u32,
    /// Count needed.
    pub required_count: u32,
    /// Whether the objective is complete.
    pub is_complete: bool,
    /// Per-item progress for multi-item collects.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CollectItemView>,
}

/// Read-only view of a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestView {
    /// Position in the sequence.
    pub quest_index: usize,
    /// Display name.
    pub name: String,
    /// Display text.
    pub description: String,
    /// Completion policy.
    pub policy: CompletionPolicy,
    /// Objective cursor.
    pub current_objective_index: usize,
    /// Whether the quest is completed.
    pub is_completed: bool,
    /// Objectives in authoring order.
    pub objectives: Vec<ObjectiveView>,
}

/// Read-only view of a peer's quest log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestLogView {
    /// Peer the log belongs to.
    pub peer_id: u32,
    /// Active quest.
    pub current_quest_index: usize,
    /// Catalog fingerprint.
    pub catalog_fingerprint: String,
    /// Every quest in the sequence.
    pub quests: Vec<QuestView>,
}

/// Builds the quest log view for a driver.
#[must_use]
pub fn get_quest_log(driver: &ProgressionDriver) -> QuestLogView {
    QuestLogView {
        peer_id: driver.peer_id().get(),
        current_quest_index: driver.current_quest_index(),
        catalog_fingerprint: driver.catalog_fingerprint().to_owned(),
        quests: driver
            .quests()
            .iter()
            .enumerate()
            .map(|(index, quest)| quest_view(index, quest))
            .collect(),
    }
}

/// Builds the view of the active quest, if any.
#[must_use]
pub fn get_current_quest(driver: &ProgressionDriver) -> Option<QuestView> {
    driver
        .current_quest()
        .map(|quest| quest_view(driver.current_quest_index(), quest))
}

fn quest_view(quest_index: usize, quest: &Quest) -> QuestView {
    QuestView {
        quest_index,
        name: quest.name.clone(),
        description: quest.description.clone(),
        policy: quest.policy(),
        current_objective_index: quest.current_objective_index(),
        is_completed: quest.is_completed(),
        objectives: quest.objectives().iter().map(objective_view).collect(),
    }
}

fn objective_view(objective: &Objective) -> ObjectiveView {
    ObjectiveView {
        name: objective.name.clone(),
        kind: objective.kind(),
        target_id: objective.target_id().to_owned(),
        current_count: objective.current_count(),
        required_count: objective.required_count(),
        is_complete: objective.is_complete(),
        items: objective
            .multi_target()
            .unwrap_or_default()
            .iter()
            .map(|target| CollectItemView {
                item_id: target.item_id.clone(),
                progress: target.progress,
                required: target.required,
            })
            .collect(),
    }
}

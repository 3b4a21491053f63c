//! The objective model: one trackable unit of quest progress.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of action advances an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Defeat enemies matching the target.
    Kill,
    /// Gather items, optionally several distinct ones.
    Collect,
    /// Speak with an NPC.
    TalkTo,
    /// Enter a spatial region.
    ReachArea,
    /// Discover a spatial region.
    FindArea,
    /// Make an offering at a shrine.
    ShrineOffering,
    /// Absorb a power from a defeated foe.
    PowerSteal,
    /// Anything reported by scripted content.
    Custom,
}

impl ObjectiveKind {
    /// Returns true for the kinds that can be gated by area presence.
    #[must_use]
    pub fn is_area(self) -> bool {
        matches!(self, Self::ReachArea | Self::FindArea)
    }

    /// Stable snake-case name, as used in authoring data.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kill => "kill",
            Self::Collect => "collect",
            Self::TalkTo => "talk_to",
            Self::ReachArea => "reach_area",
            Self::FindArea => "find_area",
            Self::ShrineOffering => "shrine_offering",
            Self::PowerSteal => "power_steal",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Item identifier understood by the inventory.
    pub item_id: String,
    /// Number of items granted.
    pub quantity: u32,
}

impl Reward {
    /// Creates a reward.
    #[must_use]
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// One entry of a multi-item collect objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectTarget {
    /// Item to collect.
    pub item_id: String,
    /// How many are needed.
    pub required: u32,
    /// How many have been collected so far, never above `required`.
    pub progress: u32,
}

/// Result of applying progress to an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressChange {
    /// `current_count` before the update.
    pub previous: u32,
    /// `current_count` after the update.
    pub current: u32,
    /// True if this update made the objective complete.
    pub completed_now: bool,
}

impl ProgressChange {
    /// Returns true if the count moved.
    #[must_use]
    pub fn advanced(&self) -> bool {
        self.current > self.previous
    }
}

/// A unit of quest progress.
///
/// Counts only move through [`Objective::apply_progress`] and
/// [`Objective::merge_counts`], which keep `current_count` within
/// `[0, required_count]` and, for multi-item collects, equal to the sum of
/// the per-item progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Display name.
    pub name: String,
    /// Display text.
    pub description: String,
    kind: ObjectiveKind,
    target_id: String,
    required_count: u32,
    current_count: u32,
    multi_target: Option<Vec<CollectTarget>>,
    reward: Option<Reward>,
}

impl Objective {
    /// Creates a single-target objective. An empty `target_id` matches any target.
    #[must_use]
    pub fn new(kind: ObjectiveKind, target_id: impl Into<String>, required_count: u32) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            kind,
            target_id: target_id.into(),
            required_count,
            current_count: 0,
            multi_target: None,
            reward: None,
        }
    }

    /// Creates a collect objective over several distinct items.
    ///
    /// `required_count` becomes the sum of the per-item requirements.
    #[must_use]
    pub fn collect_many<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let targets: Vec<CollectTarget> = items
            .into_iter()
            .map(|(item_id, required)| CollectTarget {
                item_id: item_id.into(),
                required,
                progress: 0,
            })
            .collect();
        let required_count = targets.iter().map(|t| t.required).sum();
        Self {
            name: String::new(),
            description: String::new(),
            kind: ObjectiveKind::Collect,
            target_id: String::new(),
            required_count,
            current_count: 0,
            multi_target: Some(targets),
            reward: None,
        }
    }

    /// Sets the display text.
    #[must_use]
    pub fn with_text(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    /// Attaches a completion reward.
    #[must_use]
    pub fn with_reward(mut self, reward: Reward) -> Self {
        self.reward = Some(reward);
        self
    }

    /// The objective kind.
    #[must_use]
    pub fn kind(&self) -> ObjectiveKind {
        self.kind
    }

    /// The target identifier; empty means "any".
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Count needed for completion.
    #[must_use]
    pub fn required_count(&self) -> u32 {
        self.required_count
    }

    /// Count reached so far.
    #[must_use]
    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    /// Per-item entries of a multi-item collect objective.
    #[must_use]
    pub fn multi_target(&self) -> Option<&[CollectTarget]> {
        self.multi_target.as_deref()
    }

    /// The completion reward, if any.
    #[must_use]
    pub fn reward(&self) -> Option<&Reward> {
        self.reward.as_ref()
    }

    /// Returns true once the objective's requirement is met.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match &self.multi_target {
            None => self.current_count >= self.required_count,
            Some(targets) => targets.iter().all(|t| t.progress >= t.required),
        }
    }

    /// Returns true if a report of (`kind`, `target_id`) concerns this objective.
    #[must_use]
    pub fn matches(&self, kind: ObjectiveKind, target_id: &str) -> bool {
        self.kind == kind && (self.target_id.is_empty() || self.target_id == target_id)
    }

    /// Adds `amount` toward the objective, clamped to the requirement.
    ///
    /// For a multi-item collect, `target_id` selects the item; an item that is
    /// not part of the objective yields `None` and changes nothing.
    pub fn apply_progress(&mut self, target_id: &str, amount: u32) -> Option<ProgressChange> {
        let was_complete = self.is_complete();
        let previous = self.current_count;

        match &mut self.multi_target {
            Some(targets) => {
                let entry = targets.iter_mut().find(|t| t.item_id == target_id)?;
                entry.progress = entry.progress.saturating_add(amount).min(entry.required);
                self.current_count = targets.iter().map(|t| t.progress).sum();
            }
            None => {
                self.current_count = self
                    .current_count
                    .saturating_add(amount)
                    .min(self.required_count);
            }
        }

        Some(ProgressChange {
            previous,
            current: self.current_count,
            completed_now: !was_complete && self.is_complete(),
        })
    }

    /// Raises counts to at least the given values (element-wise maximum).
    ///
    /// `item_progress` is matched positionally against the multi-item entries
    /// and ignored for single-target objectives. Counts never decrease.
    pub fn merge_counts(&mut self, current_count: u32, item_progress: &[u32]) -> ProgressChange {
        let was_complete = self.is_complete();
        let previous = self.current_count;

        match &mut self.multi_target {
            Some(targets) => {
                for (entry, remote) in targets.iter_mut().zip(item_progress) {
                    entry.progress = entry.progress.max((*remote).min(entry.required));
                }
                self.current_count = targets.iter().map(|t| t.progress).sum();
            }
            None => {
                self.current_count = self
                    .current_count
                    .max(current_count.min(self.required_count));
            }
        }

        ProgressChange {
            previous,
            current: self.current_count,
            completed_now: !was_complete && self.is_complete(),
        }
    }

    /// Clears all progress.
    pub fn reset(&mut self) {
        self.current_count = 0;
        if let Some(targets) = &mut self.multi_target {
            for entry in targets {
                entry.progress = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped_to_required_count() {
        // Arrange
        let mut objective = Objective::new(ObjectiveKind::Kill, "Boar", 2);

        // Act
        let change = objective.apply_progress("Boar", 10).unwrap();

        // Assert
        assert_eq!(objective.current_count(), 2);
        assert_eq!(change.previous, 0);
        assert_eq!(change.current, 2);
        assert!(change.completed_now);
    }

    #[test]
    fn test_completed_now_is_reported_only_on_transition() {
        let mut objective = Objective::new(ObjectiveKind::Kill, "Boar", 1);

        let first = objective.apply_progress("Boar", 1).unwrap();
        let second = objective.apply_progress("Boar", 1).unwrap();

        assert!(first.completed_now);
        assert!(!second.completed_now);
        assert!(!second.advanced());
    }

    #[test]
    fn test_empty_target_matches_any_target_of_same_kind() {
        let objective = Objective::new(ObjectiveKind::TalkTo, "", 1);

        assert!(objective.matches(ObjectiveKind::TalkTo, "Elder"));
        assert!(objective.matches(ObjectiveKind::TalkTo, "Smith"));
        assert!(!objective.matches(ObjectiveKind::Kill, "Elder"));
    }

    #[test]
    fn test_named_target_requires_exact_match() {
        let objective = Objective::new(ObjectiveKind::Kill, "Boar", 1);

        assert!(objective.matches(ObjectiveKind::Kill, "Boar"));
        assert!(!objective.matches(ObjectiveKind::Kill, "Wolf"));
    }

    #[test]
    fn test_multi_target_count_is_sum_of_items() {
        // Arrange
        let mut objective = Objective::collect_many([("Wood", 3), ("Stone", 2)]);
        assert_eq!(objective.required_count(), 5);

        // Act
        objective.apply_progress("Wood", 5).unwrap();

        // Assert
        let items = objective.multi_target().unwrap();
        assert_eq!(items[0].progress, 3);
        assert_eq!(items[1].progress, 0);
        assert_eq!(objective.current_count(), 3);
        assert!(!objective.is_complete());

        let change = objective.apply_progress("Stone", 2).unwrap();
        assert_eq!(objective.current_count(), 5);
        assert!(change.completed_now);
    }

    #[test]
    fn test_multi_target_ignores_unlisted_item() {
        let mut objective = Objective::collect_many([("Wood", 3)]);

        let change = objective.apply_progress("Iron", 1);

        assert!(change.is_none());
        assert_eq!(objective.current_count(), 0);
    }

    #[test]
    fn test_multi_target_completion_requires_every_item() {
        let mut objective = Objective::collect_many([("Wood", 1), ("Stone", 1)]);

        objective.apply_progress("Wood", 1).unwrap();

        assert!(!objective.is_complete());
    }

    #[test]
    fn test_merge_counts_never_decreases() {
        let mut objective = Objective::new(ObjectiveKind::Kill, "Boar", 5);
        objective.apply_progress("Boar", 3).unwrap();

        let lower = objective.merge_counts(1, &[]);
        let higher = objective.merge_counts(9, &[]);

        assert!(!lower.advanced());
        assert_eq!(higher.current, 5);
        assert!(higher.completed_now);
    }

    #[test]
    fn test_merge_counts_takes_item_wise_maximum() {
        let mut objective = Objective::collect_many([("Wood", 3), ("Stone", 2)]);
        objective.apply_progress("Wood", 2).unwrap();

        objective.merge_counts(0, &[1, 7]);

        let items = objective.multi_target().unwrap();
        assert_eq!(items[0].progress, 2);
        assert_eq!(items[1].progress, 2);
        assert_eq!(objective.current_count(), 4);
    }

    #[test]
    fn test_reset_clears_item_progress() {
        let mut objective = Objective::collect_many([("Wood", 3)]);
        objective.apply_progress("Wood", 2).unwrap();

        objective.reset();

        assert_eq!(objective.current_count(), 0);
        assert_eq!(objective.multi_target().unwrap()[0].progress, 0);
    }
}

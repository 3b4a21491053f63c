//! The quest model: an ordered set of objectives plus a completion policy.

use serde::{Deserialize, Serialize};

use super::objective::{Objective, Reward};

/// How many objectives must be complete for the quest to be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Every objective.
    #[default]
    All,
    /// At least one objective.
    Any,
}

/// A quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Display name.
    pub name: String,
    /// Display text.
    pub description: String,
    objectives: Vec<Objective>,
    current_objective_index: usize,
    is_completed: bool,
    policy: CompletionPolicy,
    auto_advance: bool,
    rewards: Vec<Reward>,
    entry_objective: usize,
}

impl Quest {
    /// Creates a quest with the default policy (`All`), no auto-advance and
    /// entry objective 0.
    #[must_use]
    pub fn new(name: impl Into<String>, objectives: Vec<Objective>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            objectives,
            current_objective_index: 0,
            is_completed: false,
            policy: CompletionPolicy::All,
            auto_advance: false,
            rewards: Vec::new(),
            entry_objective: 0,
        }
    }

    /// Sets the display text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the completion policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables or disables auto-advance between objectives.
    #[must_use]
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    /// Sets the quest-level rewards.
    #[must_use]
    pub fn with_rewards(mut self, rewards: Vec<Reward>) -> Self {
        self.rewards = rewards;
        self
    }

    /// Sets the objective the quest starts on.
    #[must_use]
    pub fn with_entry_objective(mut self, entry_objective: usize) -> Self {
        self.entry_objective = entry_objective;
        self.current_objective_index = self.clamped_entry();
        self
    }

    /// The objectives, in authoring order.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// The objective at `index`.
    #[must_use]
    pub fn objective(&self, index: usize) -> Option<&Objective> {
        self.objectives.get(index)
    }

    pub(crate) fn objective_mut(&mut self, index: usize) -> Option<&mut Objective> {
        self.objectives.get_mut(index)
    }

    /// Index of the objective the player is currently directed to.
    #[must_use]
    pub fn current_objective_index(&self) -> usize {
        self.current_objective_index
    }

    /// The objective the player is currently directed to.
    #[must_use]
    pub fn current_objective(&self) -> Option<&Objective> {
        self.objectives.get(self.current_objective_index)
    }

    /// Whether the quest has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// The completion policy.
    #[must_use]
    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Whether completing an objective moves the cursor to the next open one.
    #[must_use]
    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    /// Rewards granted on quest completion.
    #[must_use]
    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    /// The authored entry objective.
    #[must_use]
    pub fn entry_objective(&self) -> usize {
        self.entry_objective
    }

    /// Returns true if the completion policy is met.
    ///
    /// A quest without objectives is never satisfied.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        if self.objectives.is_empty() {
            return false;
        }
        match self.policy {
            CompletionPolicy::All => self.objectives.iter().all(Objective::is_complete),
            CompletionPolicy::Any => self.objectives.iter().any(Objective::is_complete),
        }
    }

    /// Clears all objective progress and moves the cursor to the entry
    /// objective. Returns the cursor position.
    pub(crate) fn restart(&mut self) -> usize {
        for objective in &mut self.objectives {
            objective.reset();
        }
        self.current_objective_index = self.clamped_entry();
        self.current_objective_index
    }

    /// Flips the completed flag. Returns false if it was already set.
    pub(crate) fn mark_completed(&mut self) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        true
    }

    /// Called after `completed_index` completed. An objective finished out of
    /// order leaves an open cursor where it is. Otherwise the cursor moves to
    /// the first incomplete objective after it, wrapping around, and stays put
    /// if every objective is complete. Returns true if the cursor moved.
    pub(crate) fn advance_from(&mut self, completed_index: usize) -> bool {
        let len = self.objectives.len();
        if len == 0 {
            return false;
        }
        let cursor = self.current_objective_index.min(len - 1);
        if completed_index != cursor && !self.objectives[cursor].is_complete() {
            return false;
        }
        let Some(next) = (1..len)
            .map(|offset| (cursor + offset) % len)
            .find(|&i| !self.objectives[i].is_complete())
        else {
            return false;
        };
        self.current_objective_index = next;
        true
    }

    /// Moves the cursor to `index` if it is in range.
    pub(crate) fn set_current_objective_index(&mut self, index: usize) -> bool {
        if index < self.objectives.len() && index != self.current_objective_index {
            self.current_objective_index = index;
            return true;
        }
        false
    }

    fn clamped_entry(&self) -> usize {
        if self.entry_objective < self.objectives.len() {
            self.entry_objective
        } else {
            0
        }
    }
}

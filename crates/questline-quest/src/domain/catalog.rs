//! Authored quest catalogs.
//!
//! Quests, objectives, rewards and area gates are static authoring data
//! loaded from YAML. Every peer must run the same catalog; the catalog
//! fingerprint lets peers detect a mismatch before merging progress.

use questline_core::error::DomainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::objective::{Objective, ObjectiveKind, Reward};
use super::quest::{CompletionPolicy, Quest};

const BUILTIN_CATALOG: &str = include_str!("../../content/default_catalog.yaml");

/// How an area gate decides completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingMode {
    /// Each peer completes the objective on its own when it enters.
    #[default]
    Solo,
    /// The authority completes the objective for everyone once every
    /// connected peer is inside.
    AllPeers,
}

/// One item of a multi-item collect objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectItemDefinition {
    /// Item to collect.
    pub item_id: String,
    /// How many are needed.
    pub required: u32,
}

/// Authored objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveDefinition {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display text.
    #[serde(default)]
    pub description: String,
    /// Objective kind.
    pub kind: ObjectiveKind,
    /// Target; empty matches any.
    #[serde(default)]
    pub target_id: String,
    /// Required count for single-target objectives (default 1).
    #[serde(default)]
    pub required: Option<u32>,
    /// Items of a multi-item collect objective.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CollectItemDefinition>,
    /// Completion reward.
    #[serde(default)]
    pub reward: Option<Reward>,
}

/// Authored quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    /// Display name.
    pub name: String,
    /// Display text.
    #[serde(default)]
    pub description: String,
    /// Completion policy (default `all`).
    #[serde(default)]
    pub completion: CompletionPolicy,
    /// Whether completing an objective moves to the next open one.
    #[serde(default)]
    pub auto_advance: bool,
    /// Objective the quest starts on (default 0).
    #[serde(default)]
    pub entry_objective: usize,
    /// Rewards granted on completion.
    #[serde(default)]
    pub rewards: Vec<Reward>,
    /// Objectives in order.
    pub objectives: Vec<ObjectiveDefinition>,
}

/// Authored presence gate for an area objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaGateDefinition {
    /// The area id, matched against objective targets.
    pub area_id: String,
    /// `reach_area` or `find_area`.
    pub kind: ObjectiveKind,
    /// Solo or all-peers gating.
    #[serde(default)]
    pub mode: GatingMode,
    /// Progress granted on completion.
    #[serde(default = "default_gate_amount")]
    pub amount: u32,
}

fn default_gate_amount() -> u32 {
    1
}

/// Top-level catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// The quest sequence, in play order.
    pub quests: Vec<QuestDefinition>,
    /// Presence gates for area objectives.
    #[serde(default)]
    pub area_gates: Vec<AreaGateDefinition>,
}

/// A validated catalog.
#[derive(Debug, Clone)]
pub struct QuestCatalog {
    document: CatalogDocument,
    fingerprint: String,
}

impl QuestCatalog {
    /// Parses and validates a YAML catalog.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the YAML is malformed or the
    /// catalog fails validation.
    pub fn from_yaml(source: &str) -> Result<Self, DomainError> {
        let document: CatalogDocument = serde_yaml::from_str(source)
            .map_err(|e| DomainError::Configuration(format!("catalog parse failed: {e}")))?;
        Self::from_document(document)
    }

    /// The catalog shipped with the game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the bundled catalog is invalid.
    pub fn builtin() -> Result<Self, DomainError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Validates an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` describing the first problem found.
    pub fn from_document(document: CatalogDocument) -> Result<Self, DomainError> {
        validate(&document)?;
        let fingerprint = fingerprint_of(&document)?;
        debug!(
            quests = document.quests.len(),
            area_gates = document.area_gates.len(),
            %fingerprint,
            "catalog loaded"
        );
        Ok(Self {
            document,
            fingerprint,
        })
    }

    /// Builds a fresh quest sequence from the catalog.
    #[must_use]
    pub fn quests(&self) -> Vec<Quest> {
        self.document.quests.iter().map(build_quest).collect()
    }

    /// The authored area gates.
    #[must_use]
    pub fn area_gates(&self) -> &[AreaGateDefinition] {
        &self.document.area_gates
    }

    /// The parsed document.
    #[must_use]
    pub fn document(&self) -> &CatalogDocument {
        &self.document
    }

    /// Lowercase hex SHA-256 of the canonical JSON form of the catalog.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint_of(document: &CatalogDocument) -> Result<String, DomainError> {
    let canonical = serde_json::to_vec(document)
        .map_err(|e| DomainError::Infrastructure(format!("catalog serialization failed: {e}")))?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

fn validate(document: &CatalogDocument) -> Result<(), DomainError> {
    if document.quests.is_empty() {
        return Err(DomainError::Configuration(
            "catalog defines no quests".to_owned(),
        ));
    }

    for (quest_index, quest) in document.quests.iter().enumerate() {
        if quest.objectives.is_empty() {
            return Err(DomainError::EmptyQuest(quest_index));
        }
        if quest.entry_objective >= quest.objectives.len() {
            return Err(DomainError::Configuration(format!(
                "quest {quest_index} ({}) entry objective {} out of range",
                quest.name, quest.entry_objective
            )));
        }
        for (objective_index, objective) in quest.objectives.iter().enumerate() {
            validate_objective(quest_index, objective_index, objective)?;
        }
    }

    let mut seen = std::collections::HashSet::new();
    for gate in &document.area_gates {
        if !gate.kind.is_area() {
            return Err(DomainError::Configuration(format!(
                "area gate {} has non-area kind {}",
                gate.area_id, gate.kind
            )));
        }
        if gate.area_id.is_empty() {
            return Err(DomainError::Configuration(
                "area gate with empty area id".to_owned(),
            ));
        }
        if !seen.insert(gate.area_id.as_str()) {
            return Err(DomainError::Configuration(format!(
                "duplicate area gate {}",
                gate.area_id
            )));
        }
    }

    Ok(())
}

fn validate_objective(
    quest_index: usize,
    objective_index: usize,
    objective: &ObjectiveDefinition,
) -> Result<(), DomainError> {
    let location = format!("quest {quest_index} objective {objective_index}");
    if objective.items.is_empty() {
        if objective.required == Some(0) {
            return Err(DomainError::Configuration(format!(
                "{location}: required count must be at least 1"
            )));
        }
        return Ok(());
    }

    if objective.kind != ObjectiveKind::Collect {
        return Err(DomainError::Configuration(format!(
            "{location}: item lists are only valid for collect objectives"
        )));
    }
    if objective.items.iter().any(|item| item.required == 0) {
        return Err(DomainError::Configuration(format!(
            "{location}: every item needs a required count of at least 1"
        )));
    }
    Ok(())
}

fn build_quest(definition: &QuestDefinition) -> Quest {
    let objectives = definition.objectives.iter().map(build_objective).collect();
    Quest::new(definition.name.clone(), objectives)
        .with_description(definition.description.clone())
        .with_policy(definition.completion)
        .with_auto_advance(definition.auto_advance)
        .with_rewards(definition.rewards.clone())
        .with_entry_objective(definition.entry_objective)
}

fn build_objective(definition: &ObjectiveDefinition) -> Objective {
    let objective = if definition.items.is_empty() {
        Objective::new(
            definition.kind,
            definition.target_id.clone(),
            definition.required.unwrap_or(1),
        )
    } else {
        Objective::collect_many(
            definition
                .items
                .iter()
                .map(|item| (item.item_id.clone(), item.required)),
        )
    };
    let objective = objective.with_text(definition.name.clone(), definition.description.clone());
    match &definition.reward {
        Some(reward) => objective.with_reward(reward.clone()),
        None => objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
quests:
  - name: Boar Trouble
    auto_advance: true
    rewards:
      - { item_id: gold, quantity: 10 }
    objectives:
      - kind: kill
        target_id: Boar
        required: 2
        reward: { item_id: hide, quantity: 1 }
      - kind: collect
        items:
          - { item_id: Wood, required: 3 }
          - { item_id: Stone, required: 2 }
  - name: The Gate
    completion: any
    objectives:
      - kind: reach_area
        target_id: north_gate
area_gates:
  - area_id: north_gate
    kind: reach_area
    mode: all_peers
";

    #[test]
    fn test_from_yaml_builds_quest_sequence() {
        // Act
        let catalog = QuestCatalog::from_yaml(SAMPLE).unwrap();
        let quests = catalog.quests();

        // Assert
        assert_eq!(quests.len(), 2);
        assert_eq!(quests[0].name, "Boar Trouble");
        assert!(quests[0].auto_advance());
        assert_eq!(quests[0].rewards(), &[Reward::new("gold", 10)]);
        assert_eq!(quests[0].objectives()[0].required_count(), 2);
        assert_eq!(
            quests[0].objectives()[0].reward(),
            Some(&Reward::new("hide", 1))
        );
        assert_eq!(quests[0].objectives()[1].required_count(), 5);
        assert_eq!(quests[1].policy(), CompletionPolicy::Any);
        assert_eq!(quests[1].objectives()[0].required_count(), 1);
    }

    #[test]
    fn test_from_yaml_reads_area_gates_with_default_amount() {
        let catalog = QuestCatalog::from_yaml(SAMPLE).unwrap();

        let gates = catalog.area_gates();

        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].mode, GatingMode::AllPeers);
        assert_eq!(gates[0].amount, 1);
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let first = QuestCatalog::from_yaml(SAMPLE).unwrap();
        let second = QuestCatalog::from_yaml(SAMPLE).unwrap();
        let changed = QuestCatalog::from_yaml(&SAMPLE.replace("required: 2", "required: 4"))
            .unwrap();

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.fingerprint(), changed.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);
    }

    #[test]
    fn test_rejects_quest_without_objectives() {
        let yaml = "quests:\n  - name: Nothing\n    objectives: []\n";

        let result = QuestCatalog::from_yaml(yaml);

        assert_eq!(result.unwrap_err(), DomainError::EmptyQuest(0));
    }

    #[test]
    fn test_rejects_entry_objective_out_of_range() {
        let yaml = "quests:\n  - name: Skip\n    entry_objective: 3\n    objectives:\n      - kind: kill\n";

        let result = QuestCatalog::from_yaml(yaml);

        match result.unwrap_err() {
            DomainError::Configuration(msg) => assert!(msg.contains("entry objective")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_item_list_on_non_collect_objective() {
        let yaml = "quests:\n  - name: Odd\n    objectives:\n      - kind: kill\n        items:\n          - { item_id: Wood, required: 1 }\n";

        let result = QuestCatalog::from_yaml(yaml);

        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_rejects_area_gate_with_non_area_kind() {
        let yaml = "quests:\n  - name: Q\n    objectives:\n      - kind: kill\narea_gates:\n  - area_id: x\n    kind: kill\n";

        let result = QuestCatalog::from_yaml(yaml);

        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_rejects_duplicate_area_gates() {
        let yaml = "quests:\n  - name: Q\n    objectives:\n      - kind: reach_area\narea_gates:\n  - { area_id: x, kind: reach_area }\n  - { area_id: x, kind: find_area }\n";

        let result = QuestCatalog::from_yaml(yaml);

        match result.unwrap_err() {
            DomainError::Configuration(msg) => assert!(msg.contains("duplicate")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let result = QuestCatalog::from_yaml("quests: [");

        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = QuestCatalog::builtin().unwrap();

        assert!(!catalog.quests().is_empty());
        assert!(
            catalog
                .area_gates()
                .iter()
                .any(|gate| gate.mode == GatingMode::AllPeers)
        );
    }
}

//! Area gates and their replicated-state keys.

use questline_core::peer::PeerId;
use questline_quest::domain::catalog::{AreaGateDefinition, GatingMode};
use questline_quest::domain::objective::ObjectiveKind;
use serde::Serialize;

/// Per-peer flag key: the peer is standing inside `area_id`.
#[must_use]
pub fn presence_key(area_id: &str) -> String {
    format!("area.{area_id}.present")
}

/// Session flag key: the quorum for `area_id` has been reached.
#[must_use]
pub fn completed_key(area_id: &str) -> String {
    format!("area.{area_id}.completed")
}

/// Presence requirements for one area objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaGate {
    area_id: String,
    kind: ObjectiveKind,
    mode: GatingMode,
    amount: u32,
    presence_key: String,
    completed_key: String,
}

impl AreaGate {
    /// Creates a gate that grants one unit of progress.
    #[must_use]
    pub fn new(area_id: impl Into<String>, kind: ObjectiveKind, mode: GatingMode) -> Self {
        let area_id = area_id.into();
        Self {
            presence_key: presence_key(&area_id),
            completed_key: completed_key(&area_id),
            area_id,
            kind,
            mode,
            amount: 1,
        }
    }

    /// Sets the progress granted when the gate opens.
    #[must_use]
    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }

    /// Builds a gate from its authoring definition.
    #[must_use]
    pub fn from_definition(definition: &AreaGateDefinition) -> Self {
        Self::new(definition.area_id.clone(), definition.kind, definition.mode)
            .with_amount(definition.amount)
    }

    /// The gated area.
    #[must_use]
    pub fn area_id(&self) -> &str {
        &self.area_id
    }

    /// The objective kind the gate reports.
    #[must_use]
    pub fn kind(&self) -> ObjectiveKind {
        self.kind
    }

    /// Solo or all-peers.
    #[must_use]
    pub fn mode(&self) -> GatingMode {
        self.mode
    }

    /// Progress granted when the gate opens.
    #[must_use]
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Returns true if every connected peer must be inside.
    #[must_use]
    pub fn requires_all_peers(&self) -> bool {
        self.mode == GatingMode::AllPeers
    }

    /// Per-peer presence flag key.
    #[must_use]
    pub fn presence_key(&self) -> &str {
        &self.presence_key
    }

    /// Session completion flag key.
    #[must_use]
    pub fn completed_key(&self) -> &str {
        &self.completed_key
    }
}

/// Lifecycle of one area quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumState {
    /// The local quest is not on this area's objective.
    Inactive,
    /// The area is the current objective and has not opened yet.
    AwaitingQuorum,
    /// The gate has opened. Terminal.
    Completed,
}

/// One peer's presence flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeerPresence {
    /// The peer.
    pub peer_id: PeerId,
    /// Whether it is inside the area.
    pub present: bool,
}

/// Read model of an area gate as seen from one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuorumView {
    /// The gated area.
    pub area_id: String,
    /// Gating mode.
    pub mode: GatingMode,
    /// Lifecycle state.
    pub state: QuorumState,
    /// Whether this peer's trigger still fires.
    pub trigger_enabled: bool,
    /// Current authority holder.
    pub authority: Option<PeerId>,
    /// Presence of every connected peer, in id order.
    pub peers: Vec<PeerPresence>,
}

impl QuorumView {
    /// Connected peers that are not inside the area.
    #[must_use]
    pub fn missing(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|p| !p.present)
            .map(|p| p.peer_id)
            .collect()
    }
}

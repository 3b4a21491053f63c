//! Peer progress relays.
//!
//! Every peer owns one relay. The authority addresses a relay with a
//! targeted message stamped with its authority term; the relay's owner
//! checks that the sender held the token in that term and that the message
//! was meant for it, then applies the progress to its own driver. A delivery
//! stays valid after the token moves on, so a hand-off between the decision
//! and its arrival loses nothing. The relay keeps no state of its own.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use questline_core::authority::Authority;
use questline_core::error::DomainError;
use questline_core::net::{Outbound, SendTarget};
use questline_core::peer::PeerId;
use questline_quest::application::progression::{Origin, ProgressOutcome, ProgressionDriver};
use questline_quest::domain::objective::ObjectiveKind;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::messages::RelayMessage;

/// Which peers currently have a reachable relay.
pub trait RelayDirectory: Send + Sync {
    /// Returns true if `peer` has a relay.
    fn has_relay(&self, peer: PeerId) -> bool;
}

/// A mutable [`RelayDirectory`].
#[derive(Debug, Default)]
pub struct RelayRegistry {
    peers: RwLock<BTreeSet<PeerId>>,
}

impl RelayRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `peer` has a relay.
    pub fn register(&self, peer: PeerId) {
        if let Ok(mut peers) = self.peers.write() {
            peers.insert(peer);
        }
    }

    /// Forgets `peer`'s relay.
    pub fn unregister(&self, peer: PeerId) {
        if let Ok(mut peers) = self.peers.write() {
            peers.remove(&peer);
        }
    }

    /// Peers with a relay, in id order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers
            .read()
            .map(|peers| peers.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl RelayDirectory for RelayRegistry {
    fn has_relay(&self, peer: PeerId) -> bool {
        self.peers
            .read()
            .map(|peers| peers.contains(&peer))
            .unwrap_or(false)
    }
}

/// Builds the targeted delivery of progress to `owner`'s relay.
#[must_use]
pub fn address_progress(
    owner: PeerId,
    kind: ObjectiveKind,
    target_id: &str,
    amount: u32,
    term: u64,
    correlation_id: Uuid,
) -> Outbound<RelayMessage> {
    Outbound {
        target: SendTarget::Peer(owner),
        message: RelayMessage::ApplyProgress {
            owner,
            kind,
            target_id: target_id.to_owned(),
            amount,
            term,
        },
        correlation_id,
    }
}

/// One peer's progress relay.
pub struct PeerProgressRelay {
    owner: PeerId,
    authority: Arc<dyn Authority>,
}

impl std::fmt::Debug for PeerProgressRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerProgressRelay")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl PeerProgressRelay {
    /// Creates the relay owned by `owner`.
    #[must_use]
    pub fn new(owner: PeerId, authority: Arc<dyn Authority>) -> Self {
        Self { owner, authority }
    }

    /// The owning peer.
    #[must_use]
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// Executes a relay message on the owner's driver.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAuthority` if `sender` did not hold the
    /// authority token in the message's term, or `DomainError::Validation` if the message or driver
    /// belongs to another peer. The driver is untouched in both cases.
    pub fn receive(
        &self,
        driver: &mut ProgressionDriver,
        sender: PeerId,
        message: RelayMessage,
    ) -> Result<ProgressOutcome, DomainError> {
        let RelayMessage::ApplyProgress {
            owner,
            kind,
            target_id,
            amount,
            term,
        } = message;

        if owner != self.owner || driver.peer_id() != self.owner {
            warn!(
                relay_owner = %self.owner,
                addressed_to = %owner,
                driver_peer = %driver.peer_id(),
                "relay message for another peer rejected"
            );
            return Err(DomainError::Validation(format!(
                "relay of {} cannot apply progress addressed to {owner}",
                self.owner
            )));
        }
        if !self.authority.held_during(sender, term) {
            warn!(relay_owner = %self.owner, %sender, term, "relay message from non-authority rejected");
            return Err(DomainError::NotAuthority(sender));
        }

        debug!(relay_owner = %self.owner, %kind, %target_id, amount, term, "relay applying progress");
        driver.update_objective_progress(kind, &target_id, amount, Origin::Relay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_quest::domain::objective::Objective;
    use questline_quest::domain::quest::Quest;
    use questline_test_support::{FixedClock, InMemoryReplication};

    fn gate_driver(peer: u32) -> ProgressionDriver {
        let quests = vec![Quest::new(
            "The Gate",
            vec![Objective::new(ObjectiveKind::ReachArea, "north_gate", 1)],
        )];
        let mut driver = ProgressionDriver::new(PeerId(peer), quests, Arc::new(FixedClock::standard()));
        driver.start_quest(0, Origin::Remote).unwrap();
        driver
    }

    fn message_in_term(owner: u32, term: u64) -> RelayMessage {
        address_progress(
            PeerId(owner),
            ObjectiveKind::ReachArea,
            "north_gate",
            1,
            term,
            Uuid::new_v4(),
        )
        .message
    }

    fn message_for(owner: u32) -> RelayMessage {
        message_in_term(owner, 1)
    }

    #[test]
    fn test_address_progress_targets_owner_only() {
        let outbound = address_progress(
            PeerId(2),
            ObjectiveKind::ReachArea,
            "north_gate",
            1,
            1,
            Uuid::new_v4(),
        );

        assert_eq!(outbound.target, SendTarget::Peer(PeerId(2)));
    }

    #[test]
    fn test_receive_applies_progress_from_authority() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let relay = PeerProgressRelay::new(PeerId(2), Arc::new(replication));
        let mut driver = gate_driver(2);

        // Act
        let outcome = relay.receive(&mut driver, PeerId(1), message_for(2)).unwrap();

        // Assert
        assert!(outcome.quest_completed);
        assert!(driver.quest(0).unwrap().is_completed());
        // Relay progress is never re-sent.
        assert!(driver.outbound().is_empty());
    }

    #[test]
    fn test_receive_rejects_non_authority_sender() {
        let replication = InMemoryReplication::with_peers(&[1, 2, 3]);
        let relay = PeerProgressRelay::new(PeerId(2), Arc::new(replication));
        let mut driver = gate_driver(2);

        let result = relay.receive(&mut driver, PeerId(3), message_for(2));

        match result.unwrap_err() {
            DomainError::NotAuthority(peer) => assert_eq!(peer, PeerId(3)),
            other => panic!("expected NotAuthority, got {other:?}"),
        }
        assert!(!driver.quest(0).unwrap().is_completed());
    }

    #[test]
    fn test_receive_accepts_delivery_from_a_previous_authority() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        replication.disconnect(PeerId(1));
        let relay = PeerProgressRelay::new(PeerId(2), Arc::new(replication));
        let mut driver = gate_driver(2);

        // Act
        let outcome = relay.receive(&mut driver, PeerId(1), message_in_term(2, 1)).unwrap();

        // Assert
        assert!(outcome.quest_completed);
    }

    #[test]
    fn test_receive_rejects_term_the_sender_never_held() {
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        replication.set_authority(PeerId(2));
        let relay = PeerProgressRelay::new(PeerId(2), Arc::new(replication));
        let mut driver = gate_driver(2);

        let result = relay.receive(&mut driver, PeerId(1), message_in_term(2, 2));

        match result.unwrap_err() {
            DomainError::NotAuthority(peer) => assert_eq!(peer, PeerId(1)),
            other => panic!("expected NotAuthority, got {other:?}"),
        }
        assert!(!driver.quest(0).unwrap().is_completed());
    }

    #[test]
    fn test_receive_rejects_message_for_another_owner() {
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let relay = PeerProgressRelay::new(PeerId(2), Arc::new(replication));
        let mut driver = gate_driver(2);

        let result = relay.receive(&mut driver, PeerId(1), message_for(1));

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(!driver.quest(0).unwrap().is_completed());
    }

    #[test]
    fn test_registry_tracks_relays() {
        let registry = RelayRegistry::new();
        registry.register(PeerId(2));
        registry.register(PeerId(1));

        assert_eq!(registry.peers(), vec![PeerId(1), PeerId(2)]);
        registry.unregister(PeerId(2));
        assert!(!registry.has_relay(PeerId(2)));
        assert!(registry.has_relay(PeerId(1)));
    }

    #[test]
    fn test_relay_message_wire_shape() {
        let json = serde_json::to_value(message_for(2)).unwrap();

        assert_eq!(json["type"], "apply_progress");
        assert_eq!(json["owner"], 2);
        assert_eq!(json["kind"], "reach_area");
        assert_eq!(json["term"], 1);
    }
}

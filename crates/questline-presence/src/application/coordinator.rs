//! Presence quorum coordinator.
//!
//! One coordinator runs per area gate on every peer. All peers publish their
//! own presence flag; only the authority evaluates the quorum. The session
//! completion flag is the latch: the authority flips it with a
//! compare-and-set, and only the evaluation that wins the swap delivers
//! progress, so repeated or concurrent evaluations complete the area once.

use std::sync::Arc;

use questline_core::authority::Authority;
use questline_core::error::DomainError;
use questline_core::net::Outbound;
use questline_core::peer::PeerId;
use questline_core::replication::ReplicatedState;
use questline_quest::application::progression::{Origin, ProgressOutcome, ProgressionDriver};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::relay::{RelayDirectory, address_progress};
use crate::domain::area::{AreaGate, PeerPresence, QuorumState, QuorumView};
use crate::domain::messages::RelayMessage;

/// Result of a local enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Presence was published; nothing else happened.
    Recorded,
    /// Solo gate on the current objective: progress applied locally.
    SoloProgress(ProgressOutcome),
    /// The trigger had already fired.
    TriggerDisabled,
}

/// Result of a quorum evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumOutcome {
    /// The change concerned another area.
    Ignored,
    /// The gate does not use quorum.
    SoloGate,
    /// This peer does not hold the authority token.
    NotAuthority,
    /// The area is already completed.
    AlreadyCompleted,
    /// The authority's current objective is not this area.
    NotOnObjective,
    /// No peers are connected.
    NoPeers,
    /// Some connected peers are outside.
    Awaiting {
        /// Connected peers not inside the area.
        missing: Vec<PeerId>,
    },
    /// Another evaluation already flipped the latch.
    LatchLost,
    /// The quorum was reached by this evaluation.
    Reached {
        /// Peers whose relay was addressed.
        relayed: Vec<PeerId>,
        /// Peers without a relay.
        fallback: Vec<PeerId>,
    },
}

/// Coordinates one area gate on one peer.
pub struct PresenceQuorumCoordinator {
    gate: AreaGate,
    state: Arc<dyn ReplicatedState>,
    authority: Arc<dyn Authority>,
    relays: Arc<dyn RelayDirectory>,
    trigger_enabled: bool,
    outbox: Vec<Outbound<RelayMessage>>,
}

impl std::fmt::Debug for PresenceQuorumCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceQuorumCoordinator")
            .field("gate", &self.gate)
            .field("local_peer", &self.state.local_peer())
            .field("trigger_enabled", &self.trigger_enabled)
            .field("pending", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl PresenceQuorumCoordinator {
    /// Creates a coordinator for `gate`.
    #[must_use]
    pub fn new(
        gate: AreaGate,
        state: Arc<dyn ReplicatedState>,
        authority: Arc<dyn Authority>,
        relays: Arc<dyn RelayDirectory>,
    ) -> Self {
        let trigger_enabled = !state.session_flag(gate.completed_key());
        Self {
            gate,
            state,
            authority,
            relays,
            trigger_enabled,
            outbox: Vec::new(),
        }
    }

    /// Registers an all-peers gate with the driver so local progress on the
    /// area is broadcast.
    pub fn attach(&self, driver: &mut ProgressionDriver) {
        if self.gate.requires_all_peers() {
            driver.mark_area_gated(self.gate.area_id());
        }
    }

    /// The gate this coordinator owns.
    #[must_use]
    pub fn gate(&self) -> &AreaGate {
        &self.gate
    }

    /// Whether this peer's trigger still fires.
    #[must_use]
    pub fn trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    /// Relay deliveries waiting to be sent.
    pub fn take_outbound(&mut self) -> Vec<Outbound<RelayMessage>> {
        std::mem::take(&mut self.outbox)
    }

    /// The local player entered the area.
    ///
    /// # Errors
    ///
    /// Returns the error of the presence write or the solo progress update.
    pub fn on_local_enter(
        &mut self,
        driver: &mut ProgressionDriver,
    ) -> Result<EnterOutcome, DomainError> {
        if !self.trigger_enabled {
            return Ok(EnterOutcome::TriggerDisabled);
        }
        self.state.set_local_flag(self.gate.presence_key(), true)?;

        if self.gate.requires_all_peers()
            || !driver.is_current_objective(self.gate.kind(), self.gate.area_id())
        {
            return Ok(EnterOutcome::Recorded);
        }

        let outcome = driver.update_objective_progress(
            self.gate.kind(),
            self.gate.area_id(),
            self.gate.amount(),
            Origin::Local,
        )?;
        self.trigger_enabled = false;
        info!(
            peer_id = %driver.peer_id(),
            area_id = %self.gate.area_id(),
            "solo area objective reached"
        );
        Ok(EnterOutcome::SoloProgress(outcome))
    }

    /// The local player left the area.
    ///
    /// # Errors
    ///
    /// Returns the error of the presence write.
    pub fn on_local_exit(&mut self) -> Result<(), DomainError> {
        self.state.set_local_flag(self.gate.presence_key(), false)
    }

    /// A peer's presence flag changed.
    ///
    /// # Errors
    ///
    /// See [`PresenceQuorumCoordinator::evaluate_quorum`].
    pub fn on_presence_changed(
        &mut self,
        driver: &mut ProgressionDriver,
        peer: PeerId,
        key: &str,
    ) -> Result<QuorumOutcome, DomainError> {
        if key != self.gate.presence_key() {
            return Ok(QuorumOutcome::Ignored);
        }
        debug!(area_id = %self.gate.area_id(), %peer, "presence changed");
        self.evaluate_quorum(driver)
    }

    /// A peer joined the session.
    ///
    /// # Errors
    ///
    /// See [`PresenceQuorumCoordinator::evaluate_quorum`].
    pub fn on_peer_joined(
        &mut self,
        driver: &mut ProgressionDriver,
    ) -> Result<QuorumOutcome, DomainError> {
        self.evaluate_quorum(driver)
    }

    /// A peer left the session.
    ///
    /// # Errors
    ///
    /// See [`PresenceQuorumCoordinator::evaluate_quorum`].
    pub fn on_peer_left(
        &mut self,
        driver: &mut ProgressionDriver,
    ) -> Result<QuorumOutcome, DomainError> {
        self.evaluate_quorum(driver)
    }

    /// The authority token moved.
    ///
    /// # Errors
    ///
    /// See [`PresenceQuorumCoordinator::evaluate_quorum`].
    pub fn on_authority_changed(
        &mut self,
        driver: &mut ProgressionDriver,
    ) -> Result<QuorumOutcome, DomainError> {
        self.evaluate_quorum(driver)
    }

    /// A session flag changed. Disables the trigger once the area latch is set.
    pub fn on_session_flag_changed(&mut self, key: &str) {
        if key == self.gate.completed_key() && self.state.session_flag(key) {
            self.trigger_enabled = false;
        }
    }

    /// Evaluates the quorum. Only the authority evaluates; everyone else gets
    /// `QuorumOutcome::NotAuthority`.
    ///
    /// # Errors
    ///
    /// Returns the error of the latch write. A fallback progress failure is
    /// logged, not returned, once the latch is set.
    pub fn evaluate_quorum(
        &mut self,
        driver: &mut ProgressionDriver,
    ) -> Result<QuorumOutcome, DomainError> {
        if !self.gate.requires_all_peers() {
            return Ok(QuorumOutcome::SoloGate);
        }
        let local = self.state.local_peer();
        let term = self.authority.term();
        if !self.authority.held_during(local, term) {
            return Ok(QuorumOutcome::NotAuthority);
        }
        if self.state.session_flag(self.gate.completed_key()) {
            self.trigger_enabled = false;
            return Ok(QuorumOutcome::AlreadyCompleted);
        }
        if !driver.is_current_objective(self.gate.kind(), self.gate.area_id()) {
            return Ok(QuorumOutcome::NotOnObjective);
        }

        let peers = self.state.connected_peers();
        if peers.is_empty() {
            return Ok(QuorumOutcome::NoPeers);
        }
        let missing: Vec<PeerId> = peers
            .iter()
            .copied()
            .filter(|&peer| !self.state.peer_flag(peer, self.gate.presence_key()))
            .collect();
        if !missing.is_empty() {
            debug!(area_id = %self.gate.area_id(), ?missing, "quorum not reached");
            return Ok(QuorumOutcome::Awaiting { missing });
        }

        if !self
            .state
            .compare_and_set_session_flag(self.gate.completed_key(), false, true)?
        {
            self.trigger_enabled = false;
            debug!(area_id = %self.gate.area_id(), "quorum latch already set");
            return Ok(QuorumOutcome::LatchLost);
        }
        self.trigger_enabled = false;

        let correlation_id = Uuid::new_v4();
        let (relayed, fallback): (Vec<PeerId>, Vec<PeerId>) =
            peers.into_iter().partition(|&peer| self.relays.has_relay(peer));
        for &peer in &relayed {
            self.outbox.push(address_progress(
                peer,
                self.gate.kind(),
                self.gate.area_id(),
                self.gate.amount(),
                term,
                correlation_id,
            ));
        }
        info!(
            area_id = %self.gate.area_id(),
            authority = %local,
            term,
            %correlation_id,
            ?relayed,
            "area quorum reached"
        );

        if !fallback.is_empty() {
            warn!(
                area_id = %self.gate.area_id(),
                ?fallback,
                "peers without a progress relay; applying progress on the authority only"
            );
            // The authority's own relay already covers it.
            if !relayed.contains(&local) {
                if let Err(err) = driver.update_objective_progress(
                    self.gate.kind(),
                    self.gate.area_id(),
                    self.gate.amount(),
                    Origin::Relay,
                ) {
                    warn!(area_id = %self.gate.area_id(), %err, "fallback progress failed");
                }
            }
        }

        Ok(QuorumOutcome::Reached { relayed, fallback })
    }

    /// Read model of the gate as seen from this peer.
    #[must_use]
    pub fn view(&self, driver: &ProgressionDriver) -> QuorumView {
        let completed = if self.gate.requires_all_peers() {
            self.state.session_flag(self.gate.completed_key())
        } else {
            !self.trigger_enabled
        };
        let state = if completed {
            QuorumState::Completed
        } else if driver.is_current_objective(self.gate.kind(), self.gate.area_id()) {
            QuorumState::AwaitingQuorum
        } else {
            QuorumState::Inactive
        };
        QuorumView {
            area_id: self.gate.area_id().to_owned(),
            mode: self.gate.mode(),
            state,
            trigger_enabled: self.trigger_enabled,
            authority: self.authority.holder(),
            peers: self
                .state
                .connected_peers()
                .into_iter()
                .map(|peer_id| PeerPresence {
                    peer_id,
                    present: self.state.peer_flag(peer_id, self.gate.presence_key()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_quest::domain::catalog::GatingMode;
    use questline_quest::domain::objective::{Objective, ObjectiveKind};
    use questline_quest::domain::quest::Quest;
    use questline_test_support::{FixedClock, InMemoryReplication};

    use crate::application::relay::RelayRegistry;

    fn gate_quests() -> Vec<Quest> {
        vec![
            Quest::new(
                "The Northern Gate",
                vec![
                    Objective::new(ObjectiveKind::ReachArea, "north_gate", 1),
                    Objective::new(ObjectiveKind::ShrineOffering, "gate_shrine", 1),
                ],
            )
            .with_auto_advance(true),
        ]
    }

    fn driver(peer: u32) -> ProgressionDriver {
        let mut driver =
            ProgressionDriver::new(PeerId(peer), gate_quests(), Arc::new(FixedClock::standard()));
        driver.start_quest(0, Origin::Remote).unwrap();
        driver
    }

    fn relays_for(peers: &[u32]) -> Arc<RelayRegistry> {
        let registry = RelayRegistry::new();
        for &peer in peers {
            registry.register(PeerId(peer));
        }
        Arc::new(registry)
    }

    fn coordinator(
        replication: &InMemoryReplication,
        peer: u32,
        mode: GatingMode,
        relays: Arc<RelayRegistry>,
    ) -> PresenceQuorumCoordinator {
        PresenceQuorumCoordinator::new(
            AreaGate::new("north_gate", ObjectiveKind::ReachArea, mode),
            Arc::new(replication.view(PeerId(peer))),
            Arc::new(replication.clone()),
            relays,
        )
    }

    #[test]
    fn test_only_one_of_two_peers_present_does_not_complete() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1, 2]));
        let mut driver_a = driver(1);

        // Act
        authority.on_local_enter(&mut driver_a).unwrap();
        let outcome = authority
            .on_presence_changed(&mut driver_a, PeerId(1), "area.north_gate.present")
            .unwrap();

        // Assert
        assert_eq!(outcome, QuorumOutcome::Awaiting { missing: vec![PeerId(2)] });
        assert!(!replication.view(PeerId(1)).session_flag("area.north_gate.completed"));
        assert!(authority.take_outbound().is_empty());
        assert!(authority.trigger_enabled());
    }

    #[test]
    fn test_both_peers_present_completes_once_and_relays_each_peer() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let relays = relays_for(&[1, 2]);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays.clone());
        let mut guest = coordinator(&replication, 2, GatingMode::AllPeers, relays);
        let mut driver_a = driver(1);
        let mut driver_b = driver(2);

        // Act
        authority.on_local_enter(&mut driver_a).unwrap();
        guest.on_local_enter(&mut driver_b).unwrap();
        let first = authority.evaluate_quorum(&mut driver_a).unwrap();
        let second = authority.evaluate_quorum(&mut driver_a).unwrap();
        let from_guest = guest.evaluate_quorum(&mut driver_b).unwrap();

        // Assert
        assert_eq!(
            first,
            QuorumOutcome::Reached {
                relayed: vec![PeerId(1), PeerId(2)],
                fallback: vec![],
            }
        );
        assert_eq!(second, QuorumOutcome::AlreadyCompleted);
        assert_eq!(from_guest, QuorumOutcome::NotAuthority);
        let deliveries = authority.take_outbound();
        assert_eq!(deliveries.len(), 2);
        assert!(guest.take_outbound().is_empty());
    }

    #[test]
    fn test_concurrent_evaluations_complete_exactly_once() {
        // Arrange
        let peers = [1, 2, 3, 4];
        let replication = InMemoryReplication::with_peers(&peers);
        for &peer in &peers {
            replication.set_peer_flag(PeerId(peer), "area.north_gate.present", true);
        }
        let relays = relays_for(&peers);

        // Act
        let outcomes: Vec<(QuorumOutcome, usize)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let replication = replication.clone();
                    let relays = relays.clone();
                    scope.spawn(move || {
                        let mut trigger =
                            coordinator(&replication, 1, GatingMode::AllPeers, relays);
                        let mut driver_a = driver(1);
                        let outcome = trigger.evaluate_quorum(&mut driver_a).unwrap();
                        (outcome, trigger.take_outbound().len())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Assert
        let reached = outcomes
            .iter()
            .filter(|(o, _)| matches!(o, QuorumOutcome::Reached { .. }))
            .count();
        let deliveries: usize = outcomes.iter().map(|(_, n)| n).sum();
        assert_eq!(reached, 1);
        assert_eq!(deliveries, peers.len());
    }

    #[test]
    fn test_quorum_requires_authority_on_objective() {
        let replication = InMemoryReplication::with_peers(&[1]);
        replication.set_peer_flag(PeerId(1), "area.north_gate.present", true);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1]));
        let mut driver_a = ProgressionDriver::new(
            PeerId(1),
            vec![
                Quest::new("Hunt", vec![Objective::new(ObjectiveKind::Kill, "Boar", 1)]),
            ],
            Arc::new(FixedClock::standard()),
        );

        let outcome = authority.evaluate_quorum(&mut driver_a).unwrap();

        assert_eq!(outcome, QuorumOutcome::NotOnObjective);
        assert!(!replication.view(PeerId(1)).session_flag("area.north_gate.completed"));
    }

    #[test]
    fn test_objective_finished_out_of_order_keeps_gate_current() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1, 2]));
        let mut driver_a = ProgressionDriver::new(
            PeerId(1),
            vec![
                Quest::new(
                    "Muster",
                    vec![
                        Objective::new(ObjectiveKind::ReachArea, "north_gate", 1),
                        Objective::new(ObjectiveKind::Kill, "Boar", 1),
                        Objective::new(ObjectiveKind::TalkTo, "Elder", 1),
                    ],
                )
                .with_auto_advance(true),
            ],
            Arc::new(FixedClock::standard()),
        );
        driver_a.start_quest(0, Origin::Remote).unwrap();
        driver_a
            .update_objective_progress(ObjectiveKind::Kill, "Boar", 1, Origin::Local)
            .unwrap();
        replication.set_peer_flag(PeerId(1), "area.north_gate.present", true);
        replication.set_peer_flag(PeerId(2), "area.north_gate.present", true);

        // Act
        let outcome = authority.evaluate_quorum(&mut driver_a).unwrap();

        // Assert
        assert!(matches!(outcome, QuorumOutcome::Reached { .. }));
        assert_eq!(driver_a.quest(0).unwrap().current_objective_index(), 0);
    }

    #[test]
    fn test_departed_peer_no_longer_blocks_quorum() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1, 2]));
        let mut driver_a = driver(1);
        authority.on_local_enter(&mut driver_a).unwrap();

        // Act
        replication.disconnect(PeerId(2));
        let outcome = authority.on_peer_left(&mut driver_a).unwrap();

        // Assert
        assert_eq!(
            outcome,
            QuorumOutcome::Reached {
                relayed: vec![PeerId(1)],
                fallback: vec![],
            }
        );
    }

    #[test]
    fn test_departed_peer_stale_flag_cannot_satisfy_quorum() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2, 3]);
        replication.set_peer_flag(PeerId(2), "area.north_gate.present", true);
        let mut authority =
            coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1, 2, 3]));
        let mut driver_a = driver(1);
        authority.on_local_enter(&mut driver_a).unwrap();

        // Act
        replication.disconnect(PeerId(2));
        replication.connect(PeerId(2));
        let outcome = authority.on_peer_joined(&mut driver_a).unwrap();

        // Assert
        assert_eq!(
            outcome,
            QuorumOutcome::Awaiting {
                missing: vec![PeerId(2), PeerId(3)],
            }
        );
    }

    #[test]
    fn test_new_authority_reevaluates_on_handoff() {
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        replication.set_peer_flag(PeerId(1), "area.north_gate.present", true);
        replication.set_peer_flag(PeerId(2), "area.north_gate.present", true);
        let mut guest = coordinator(&replication, 2, GatingMode::AllPeers, relays_for(&[1, 2]));
        let mut driver_b = driver(2);
        assert_eq!(guest.evaluate_quorum(&mut driver_b).unwrap(), QuorumOutcome::NotAuthority);

        replication.set_authority(PeerId(2));
        let outcome = guest.on_authority_changed(&mut driver_b).unwrap();

        assert!(matches!(outcome, QuorumOutcome::Reached { .. }));
    }

    #[test]
    fn test_missing_relay_falls_back_to_authority_driver() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        replication.set_peer_flag(PeerId(1), "area.north_gate.present", true);
        replication.set_peer_flag(PeerId(2), "area.north_gate.present", true);
        let mut authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[]));
        let mut driver_a = driver(1);

        // Act
        let outcome = authority.evaluate_quorum(&mut driver_a).unwrap();

        // Assert
        assert_eq!(
            outcome,
            QuorumOutcome::Reached {
                relayed: vec![],
                fallback: vec![PeerId(1), PeerId(2)],
            }
        );
        assert!(authority.take_outbound().is_empty());
        let gate_objective = &driver_a.quest(0).unwrap().objectives()[0];
        assert_eq!(gate_objective.current_count(), 1);
        assert!(driver_a.outbound().is_empty());
    }

    #[test]
    fn test_solo_enter_on_current_objective_progresses_once() {
        // Arrange
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let mut solo = coordinator(&replication, 2, GatingMode::Solo, relays_for(&[1, 2]));
        let mut driver_b = driver(2);

        // Act
        let first = solo.on_local_enter(&mut driver_b).unwrap();
        solo.on_local_exit().unwrap();
        let second = solo.on_local_enter(&mut driver_b).unwrap();

        // Assert
        assert!(matches!(first, EnterOutcome::SoloProgress(_)));
        assert_eq!(second, EnterOutcome::TriggerDisabled);
        assert_eq!(driver_b.quest(0).unwrap().current_objective_index(), 1);
        assert_eq!(solo.view(&driver_b).state, QuorumState::Completed);
    }

    #[test]
    fn test_solo_enter_off_objective_only_records_presence() {
        let replication = InMemoryReplication::with_peers(&[1]);
        let mut solo = coordinator(&replication, 1, GatingMode::Solo, relays_for(&[1]));
        let mut idle = ProgressionDriver::new(PeerId(1), vec![], Arc::new(FixedClock::standard()));

        let outcome = solo.on_local_enter(&mut idle).unwrap();

        assert_eq!(outcome, EnterOutcome::Recorded);
        assert!(replication.view(PeerId(1)).peer_flag(PeerId(1), "area.north_gate.present"));
        assert!(solo.trigger_enabled());
    }

    #[test]
    fn test_remote_latch_disables_trigger() {
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        let mut guest = coordinator(&replication, 2, GatingMode::AllPeers, relays_for(&[1, 2]));

        replication.set_session_flag("area.north_gate.completed", true);
        guest.on_session_flag_changed("area.north_gate.completed");

        assert!(!guest.trigger_enabled());
    }

    #[test]
    fn test_attach_marks_all_peer_gates_only() {
        let replication = InMemoryReplication::with_peers(&[1]);
        let gated = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1]));
        let solo = PresenceQuorumCoordinator::new(
            AreaGate::new("hidden_grove", ObjectiveKind::FindArea, GatingMode::Solo),
            Arc::new(replication.view(PeerId(1))),
            Arc::new(replication.clone()),
            relays_for(&[1]),
        );
        let mut driver_a = driver(1);

        gated.attach(&mut driver_a);
        solo.attach(&mut driver_a);

        assert!(driver_a.is_area_gated("north_gate"));
        assert!(!driver_a.is_area_gated("hidden_grove"));
    }

    #[test]
    fn test_view_reports_presence_and_state() {
        let replication = InMemoryReplication::with_peers(&[1, 2]);
        replication.set_peer_flag(PeerId(2), "area.north_gate.present", true);
        let authority = coordinator(&replication, 1, GatingMode::AllPeers, relays_for(&[1, 2]));
        let driver_a = driver(1);

        let view = authority.view(&driver_a);

        assert_eq!(view.state, QuorumState::AwaitingQuorum);
        assert_eq!(view.authority, Some(PeerId(1)));
        assert_eq!(view.missing(), vec![PeerId(1)]);
    }
}

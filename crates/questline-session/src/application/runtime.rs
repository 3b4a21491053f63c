//! Per-peer runtime.
//!
//! Wires one peer's progression driver, area coordinators and progress relay
//! to the network, routes incoming deliveries to them and flushes whatever
//! they queue for sending.

use std::sync::Arc;

use questline_core::authority::Authority;
use questline_core::clock::Clock;
use questline_core::error::DomainError;
use questline_core::net::{Outbound, SendTarget, Transport, WireMessage, WirePayload};
use questline_core::observer::{EventObserver, ObserverHandle};
use questline_core::peer::PeerId;
use questline_core::replication::ReplicatedState;
use questline_presence::application::coordinator::{EnterOutcome, PresenceQuorumCoordinator};
use questline_presence::application::relay::{PeerProgressRelay, RelayDirectory};
use questline_presence::domain::area::{AreaGate, QuorumView};
use questline_presence::domain::messages::{APPLY_PROGRESS_MESSAGE_TYPE, RelayMessage};
use questline_quest::application::progression::{Origin, ProgressOutcome, ProgressionDriver};
use questline_quest::application::query_handlers::{QuestLogView, get_quest_log};
use questline_quest::domain::catalog::QuestCatalog;
use questline_quest::domain::events::QuestEvent;
use questline_quest::domain::messages::{
    COMPLETE_QUEST_MESSAGE_TYPE, QuestMessage, SNAPSHOT_MESSAGE_TYPE, START_QUEST_MESSAGE_TYPE,
    UPDATE_PROGRESS_MESSAGE_TYPE,
};
use questline_quest::domain::objective::ObjectiveKind;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ledger::RewardLedger;
use crate::infrastructure::local_network::{Delivery, LocalNetwork, PeerLink};

/// Everything one peer runs.
pub struct PeerRuntime {
    peer_id: PeerId,
    driver: ProgressionDriver,
    coordinators: Vec<PresenceQuorumCoordinator>,
    relay: Option<PeerProgressRelay>,
    link: PeerLink,
    authority: Arc<dyn Authority>,
    ledger: Arc<RewardLedger>,
}

impl std::fmt::Debug for PeerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRuntime")
            .field("peer_id", &self.peer_id)
            .field("driver", &self.driver)
            .field("coordinators", &self.coordinators)
            .field("has_relay", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl PeerRuntime {
    /// Builds the runtime of `peer_id` on `network`, with one coordinator per
    /// area gate of `catalog`, a relay and an unlimited reward ledger.
    #[must_use]
    pub fn new(
        peer_id: PeerId,
        catalog: &QuestCatalog,
        network: &LocalNetwork,
        relays: Arc<dyn RelayDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let link = network.link(peer_id);
        let authority: Arc<dyn Authority> = Arc::new(network.clone());
        let state: Arc<dyn ReplicatedState> = Arc::new(link.clone());
        let ledger = Arc::new(RewardLedger::new());

        let mut driver =
            ProgressionDriver::from_catalog(peer_id, catalog, clock).with_reward_sink(ledger.clone());
        let coordinators: Vec<PresenceQuorumCoordinator> = catalog
            .area_gates()
            .iter()
            .map(|definition| {
                PresenceQuorumCoordinator::new(
                    AreaGate::from_definition(definition),
                    state.clone(),
                    authority.clone(),
                    relays.clone(),
                )
            })
            .collect();
        for coordinator in &coordinators {
            coordinator.attach(&mut driver);
        }

        Self {
            peer_id,
            driver,
            coordinators,
            relay: Some(PeerProgressRelay::new(peer_id, authority.clone())),
            link,
            authority,
            ledger,
        }
    }

    /// Replaces the reward ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<RewardLedger>) -> Self {
        self.driver = self.driver.with_reward_sink(ledger.clone());
        self.ledger = ledger;
        self
    }

    /// Removes the progress relay.
    #[must_use]
    pub fn without_relay(mut self) -> Self {
        self.relay = None;
        self
    }

    /// The peer.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The progression driver.
    #[must_use]
    pub fn driver(&self) -> &ProgressionDriver {
        &self.driver
    }

    /// The reward ledger.
    #[must_use]
    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    /// Whether this peer has a progress relay.
    #[must_use]
    pub fn has_relay(&self) -> bool {
        self.relay.is_some()
    }

    /// Adds an observer for this peer's quest events.
    pub fn register_observer(
        &mut self,
        observer: Arc<dyn EventObserver<QuestEvent>>,
    ) -> ObserverHandle {
        self.driver.register_observer(observer)
    }

    /// Drains the quest events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<QuestEvent> {
        self.driver.take_uncommitted_events()
    }

    /// Quest log view.
    #[must_use]
    pub fn quest_log(&self) -> QuestLogView {
        get_quest_log(&self.driver)
    }

    /// Quorum view of `area_id`, if it is gated.
    #[must_use]
    pub fn quorum_view(&self, area_id: &str) -> Option<QuorumView> {
        self.coordinators
            .iter()
            .find(|c| c.gate().area_id() == area_id)
            .map(|c| c.view(&self.driver))
    }

    /// Starts a quest locally.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::start_quest`].
    pub fn start_quest(&mut self, quest_index: usize) -> Result<(), DomainError> {
        self.driver.start_quest(quest_index, Origin::Local)?;
        self.flush();
        Ok(())
    }

    /// Completes a quest locally.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::complete_quest`].
    pub fn complete_quest(&mut self, quest_index: usize) -> Result<bool, DomainError> {
        let completed = self.driver.complete_quest(quest_index, Origin::Local)?;
        self.flush();
        Ok(completed)
    }

    /// Reports gameplay progress locally.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn report_progress(
        &mut self,
        kind: ObjectiveKind,
        target_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        let outcome = self
            .driver
            .update_objective_progress(kind, target_id, amount, Origin::Local)?;
        self.flush();
        Ok(outcome)
    }

    /// The local player entered `area_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the area is not gated, or the
    /// coordinator's error.
    pub fn enter_area(&mut self, area_id: &str) -> Result<EnterOutcome, DomainError> {
        let index = self.coordinator_index(area_id)?;
        let outcome = self.coordinators[index].on_local_enter(&mut self.driver)?;
        self.flush();
        Ok(outcome)
    }

    /// The local player left `area_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the area is not gated, or the
    /// coordinator's error.
    pub fn exit_area(&mut self, area_id: &str) -> Result<(), DomainError> {
        let index = self.coordinator_index(area_id)?;
        self.coordinators[index].on_local_exit()
    }

    /// Clears every presence flag, as a graceful leave does.
    pub fn exit_all_areas(&mut self) {
        for coordinator in &mut self.coordinators {
            if let Err(err) = coordinator.on_local_exit() {
                warn!(peer_id = %self.peer_id, area_id = %coordinator.gate().area_id(), %err, "presence clear failed");
            }
        }
    }

    /// Sends this peer's progress snapshot to `to`.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub fn share_progress(&self, to: PeerId) -> Result<(), DomainError> {
        let message = QuestMessage::Snapshot(self.driver.snapshot());
        let wire = WireMessage::encode(self.peer_id, Uuid::new_v4(), &message)?;
        self.link.send(wire, SendTarget::Peer(to))
    }

    /// Processes one delivery.
    ///
    /// # Errors
    ///
    /// Returns the error of the message the delivery carried. State is
    /// unchanged for that operation; anything already queued is still sent.
    /// Gate evaluations and snapshot sends log their failures instead.
    pub fn handle(&mut self, delivery: Delivery) -> Result<(), DomainError> {
        let result = self.dispatch(delivery);
        self.flush();
        result
    }

    fn dispatch(&mut self, delivery: Delivery) -> Result<(), DomainError> {
        match delivery {
            Delivery::Message(wire) => self.receive(&wire),
            Delivery::PeerFlagChanged { peer, key } => {
                self.each_coordinator("presence change", |coordinator, driver| {
                    coordinator.on_presence_changed(driver, peer, &key).map(|_| ())
                });
                Ok(())
            }
            Delivery::SessionFlagChanged { key } => {
                for coordinator in &mut self.coordinators {
                    coordinator.on_session_flag_changed(&key);
                }
                Ok(())
            }
            Delivery::PeerJoined(peer) => {
                if peer != self.peer_id && self.authority.is_held_by(self.peer_id) {
                    debug!(peer_id = %self.peer_id, joiner = %peer, "sending progress snapshot to joiner");
                    if let Err(err) = self.share_progress(peer) {
                        warn!(peer_id = %self.peer_id, joiner = %peer, %err, "progress snapshot not sent");
                    }
                }
                self.each_coordinator("peer join", |coordinator, driver| {
                    coordinator.on_peer_joined(driver).map(|_| ())
                });
                Ok(())
            }
            Delivery::PeerLeft(_) => {
                self.each_coordinator("peer leave", |coordinator, driver| {
                    coordinator.on_peer_left(driver).map(|_| ())
                });
                Ok(())
            }
            Delivery::AuthorityChanged(_) => {
                self.each_coordinator("authority change", |coordinator, driver| {
                    coordinator.on_authority_changed(driver).map(|_| ())
                });
                Ok(())
            }
        }
    }

    /// Runs `step` on every coordinator. A failing gate is logged and the
    /// rest still run.
    fn each_coordinator<F>(&mut self, trigger: &str, mut step: F)
    where
        F: FnMut(&mut PresenceQuorumCoordinator, &mut ProgressionDriver) -> Result<(), DomainError>,
    {
        for coordinator in &mut self.coordinators {
            if let Err(err) = step(coordinator, &mut self.driver) {
                warn!(
                    peer_id = %self.peer_id,
                    area_id = %coordinator.gate().area_id(),
                    trigger,
                    %err,
                    "gate evaluation failed"
                );
            }
        }
    }

    fn receive(&mut self, wire: &WireMessage) -> Result<(), DomainError> {
        match wire.message_type.as_str() {
            START_QUEST_MESSAGE_TYPE
            | COMPLETE_QUEST_MESSAGE_TYPE
            | UPDATE_PROGRESS_MESSAGE_TYPE
            | SNAPSHOT_MESSAGE_TYPE => {
                let message: QuestMessage = wire.decode()?;
                self.driver.apply_message(wire.sender, message)
            }
            APPLY_PROGRESS_MESSAGE_TYPE => {
                let message: RelayMessage = wire.decode()?;
                let Some(relay) = &self.relay else {
                    warn!(peer_id = %self.peer_id, sender = %wire.sender, "relay message for a peer without a relay dropped");
                    return Ok(());
                };
                relay.receive(&mut self.driver, wire.sender, message).map(|_| ())
            }
            other => {
                warn!(peer_id = %self.peer_id, message_type = other, "unknown message type");
                Err(DomainError::Validation(format!("unknown message type: {other}")))
            }
        }
    }

    fn flush(&mut self) {
        for outbound in self.driver.take_outbound() {
            self.send(&outbound);
        }
        let relay_deliveries: Vec<Outbound<RelayMessage>> = self
            .coordinators
            .iter_mut()
            .flat_map(PresenceQuorumCoordinator::take_outbound)
            .collect();
        for outbound in relay_deliveries {
            self.send(&outbound);
        }
    }

    fn send<M: WirePayload>(&self, outbound: &Outbound<M>) {
        let result = WireMessage::encode(self.peer_id, outbound.correlation_id, &outbound.message)
            .and_then(|wire| self.link.send(wire, outbound.target));
        if let Err(err) = result {
            warn!(
                peer_id = %self.peer_id,
                correlation_id = %outbound.correlation_id,
                target = ?outbound.target,
                %err,
                "send failed"
            );
        }
    }

    fn coordinator_index(&self, area_id: &str) -> Result<usize, DomainError> {
        self.coordinators
            .iter()
            .position(|c| c.gate().area_id() == area_id)
            .ok_or_else(|| DomainError::Validation(format!("no area gate for {area_id}")))
    }
}

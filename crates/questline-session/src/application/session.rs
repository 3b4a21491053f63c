//! Multi-peer session host.
//!
//! Holds one runtime per connected peer on a shared [`LocalNetwork`] and
//! pumps deliveries until every inbox is empty.

use std::collections::BTreeMap;
use std::sync::Arc;

use questline_core::authority::Authority;
use questline_core::clock::Clock;
use questline_core::error::DomainError;
use questline_core::peer::PeerId;
use questline_presence::application::relay::RelayRegistry;
use questline_quest::domain::catalog::QuestCatalog;
use questline_quest::domain::events::QuestEvent;
use tracing::{info, warn};

use crate::application::runtime::PeerRuntime;
use crate::domain::ledger::RewardLedger;
use crate::infrastructure::local_network::LocalNetwork;

/// Upper bound on delivery rounds in one pump.
const MAX_PUMP_ROUNDS: usize = 1024;

/// How a peer joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    /// Whether the peer spawns a progress relay.
    pub relay: bool,
    /// Distinct item slots in the peer's reward ledger (`None` = unlimited).
    pub reward_slots: Option<usize>,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            relay: true,
            reward_slots: None,
        }
    }
}

/// A multiplayer session running in one process.
pub struct Session {
    catalog: QuestCatalog,
    network: LocalNetwork,
    relays: Arc<RelayRegistry>,
    clock: Arc<dyn Clock>,
    runtimes: BTreeMap<PeerId, PeerRuntime>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("catalog_fingerprint", &self.catalog.fingerprint())
            .field("peers", &self.runtimes.keys().collect::<Vec<_>>())
            .field("authority", &self.network.holder())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an empty session over `catalog`.
    #[must_use]
    pub fn new(catalog: QuestCatalog, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            network: LocalNetwork::new(),
            relays: Arc::new(RelayRegistry::new()),
            clock,
            runtimes: BTreeMap::new(),
        }
    }

    /// The quest catalog every peer runs.
    #[must_use]
    pub fn catalog(&self) -> &QuestCatalog {
        &self.catalog
    }

    /// The underlying network.
    #[must_use]
    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    /// Connected peers, in id order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.runtimes.keys().copied().collect()
    }

    /// The current authority holder.
    #[must_use]
    pub fn authority(&self) -> Option<PeerId> {
        self.network.holder()
    }

    /// Joins `peer` with default options.
    ///
    /// # Errors
    ///
    /// See [`Session::join_with`].
    pub fn join(&mut self, peer: PeerId) -> Result<(), DomainError> {
        self.join_with(peer, JoinOptions::default())
    }

    /// Joins `peer`. Buffered broadcasts are replayed to it on the next pump.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `peer` is already connected.
    pub fn join_with(&mut self, peer: PeerId, options: JoinOptions) -> Result<(), DomainError> {
        if self.runtimes.contains_key(&peer) {
            return Err(DomainError::Validation(format!("{peer} is already connected")));
        }
        let mut runtime = PeerRuntime::new(
            peer,
            &self.catalog,
            &self.network,
            self.relays.clone(),
            self.clock.clone(),
        );
        if let Some(slots) = options.reward_slots {
            runtime = runtime.with_ledger(Arc::new(RewardLedger::with_slot_limit(slots)));
        }
        if !options.relay {
            runtime = runtime.without_relay();
        }

        self.network.connect(peer)?;
        if options.relay {
            self.relays.register(peer);
        }
        self.runtimes.insert(peer, runtime);
        info!(%peer, relay = options.relay, "peer joined");
        Ok(())
    }

    /// Removes `peer`. A graceful leave clears its presence flags first; an
    /// ungraceful one just drops the connection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn leave(&mut self, peer: PeerId, graceful: bool) -> Result<(), DomainError> {
        let mut runtime = self
            .runtimes
            .remove(&peer)
            .ok_or(DomainError::UnknownPeer(peer))?;
        if graceful {
            runtime.exit_all_areas();
        }
        self.relays.unregister(peer);
        self.network.disconnect(peer)?;
        info!(%peer, graceful, "peer left");
        Ok(())
    }

    /// Hands the authority token to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn migrate_authority(&mut self, peer: PeerId) -> Result<(), DomainError> {
        self.network.transfer_authority(peer)
    }

    /// The runtime of `peer`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn runtime(&self, peer: PeerId) -> Result<&PeerRuntime, DomainError> {
        self.runtimes.get(&peer).ok_or(DomainError::UnknownPeer(peer))
    }

    /// The runtime of `peer`, mutably.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn runtime_mut(&mut self, peer: PeerId) -> Result<&mut PeerRuntime, DomainError> {
        self.runtimes
            .get_mut(&peer)
            .ok_or(DomainError::UnknownPeer(peer))
    }

    /// Delivers queued messages until every inbox is empty, then drains the
    /// quest events of every peer.
    ///
    /// Errors raised while a peer processes a delivery are logged and
    /// absorbed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the deliveries do not settle.
    pub fn pump(&mut self) -> Result<Vec<QuestEvent>, DomainError> {
        let mut settled = false;
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut delivered = false;
            for (peer, runtime) in &mut self.runtimes {
                while let Some(delivery) = self.network.next_delivery(*peer)? {
                    delivered = true;
                    if let Err(err) = runtime.handle(delivery) {
                        warn!(peer_id = %peer, %err, "delivery rejected");
                    }
                }
            }
            if !delivered {
                settled = true;
                break;
            }
        }
        if !settled {
            return Err(DomainError::Infrastructure(
                "session deliveries did not settle".into(),
            ));
        }

        Ok(self
            .runtimes
            .values_mut()
            .flat_map(PeerRuntime::take_events)
            .collect())
    }
}

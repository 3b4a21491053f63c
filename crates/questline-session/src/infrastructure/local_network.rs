//! In-memory peer network.
//!
//! Implements every collaborator port a peer needs (transport, replicated
//! state, authority token) for a set of peers living in one process. Each
//! peer has an inbox of [`Delivery`] values that the session drains; nothing
//! is delivered synchronously, so a peer never observes a message before the
//! operation that sent it has returned.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use questline_core::authority::{Authority, TermHistory};
use questline_core::error::DomainError;
use questline_core::net::{SendTarget, Transport, WireMessage};
use questline_core::peer::PeerId;
use questline_core::replication::ReplicatedState;
use tracing::{debug, info};

/// Something a peer must process.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A peer joined the session.
    PeerJoined(PeerId),
    /// A peer left the session.
    PeerLeft(PeerId),
    /// The authority token moved.
    AuthorityChanged(Option<PeerId>),
    /// A per-peer flag changed.
    PeerFlagChanged {
        /// The peer whose flag changed.
        peer: PeerId,
        /// The flag key.
        key: String,
    },
    /// A session flag changed.
    SessionFlagChanged {
        /// The flag key.
        key: String,
    },
    /// A message from another peer (or from itself, when targeted).
    Message(WireMessage),
}

#[derive(Debug, Default)]
struct NetworkState {
    peers: BTreeSet<PeerId>,
    inboxes: BTreeMap<PeerId, VecDeque<Delivery>>,
    buffered: Vec<WireMessage>,
    peer_flags: BTreeMap<PeerId, HashMap<String, bool>>,
    session_flags: HashMap<String, bool>,
    authority: TermHistory,
}

impl NetworkState {
    fn broadcast(&mut self, delivery: &Delivery, except: Option<PeerId>) {
        for (peer, inbox) in &mut self.inboxes {
            if Some(*peer) != except {
                inbox.push_back(delivery.clone());
            }
        }
    }
}

/// An in-memory network shared by every peer of a session.
///
/// Cloning shares the same network.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, NetworkState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Infrastructure("local network state poisoned".into()))
    }

    /// Connects `peer`.
    ///
    /// The peer's inbox starts with every buffered broadcast, in send order.
    /// Everyone else is told about the join. The first peer takes authority.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `peer` is already connected.
    pub fn connect(&self, peer: PeerId) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        if !state.peers.insert(peer) {
            return Err(DomainError::Validation(format!("{peer} is already connected")));
        }
        state.peer_flags.insert(peer, HashMap::new());

        let replay: VecDeque<Delivery> =
            state.buffered.iter().cloned().map(Delivery::Message).collect();
        debug!(%peer, replayed = replay.len(), "replaying buffered messages to joiner");
        state.broadcast(&Delivery::PeerJoined(peer), None);
        state.inboxes.insert(peer, replay);

        if state.authority.holder().is_none() {
            state.authority.hand_to(Some(peer));
            info!(authority = %peer, term = state.authority.term(), "authority assigned");
            state.broadcast(&Delivery::AuthorityChanged(Some(peer)), None);
        }
        Ok(())
    }

    /// Disconnects `peer`, dropping its inbox and per-peer flags.
    ///
    /// If `peer` held authority it moves to the lowest remaining id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn disconnect(&self, peer: PeerId) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        if !state.peers.remove(&peer) {
            return Err(DomainError::UnknownPeer(peer));
        }
        state.inboxes.remove(&peer);
        state.peer_flags.remove(&peer);
        state.broadcast(&Delivery::PeerLeft(peer), None);

        if state.authority.holder() == Some(peer) {
            let next = state.peers.iter().next().copied();
            state.authority.hand_to(next);
            info!(from = %peer, to = ?next, term = state.authority.term(), "authority migrated after disconnect");
            state.broadcast(&Delivery::AuthorityChanged(next), None);
        }
        Ok(())
    }

    /// Hands the authority token to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if `peer` is not connected.
    pub fn transfer_authority(&self, peer: PeerId) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        if !state.peers.contains(&peer) {
            return Err(DomainError::UnknownPeer(peer));
        }
        let from = state.authority.holder();
        if !state.authority.hand_to(Some(peer)) {
            return Ok(());
        }
        info!(from = ?from, to = %peer, term = state.authority.term(), "authority transferred");
        state.broadcast(&Delivery::AuthorityChanged(Some(peer)), None);
        Ok(())
    }

    /// Pops the next delivery for `peer`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the network state is poisoned.
    pub fn next_delivery(&self, peer: PeerId) -> Result<Option<Delivery>, DomainError> {
        let mut state = self.lock()?;
        Ok(state.inboxes.get_mut(&peer).and_then(VecDeque::pop_front))
    }

    /// Connected peers, in id order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.lock()
            .map(|state| state.peers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of buffered broadcasts retained for late joiners.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.lock().map(|state| state.buffered.len()).unwrap_or(0)
    }

    /// The ports as seen from `peer`.
    #[must_use]
    pub fn link(&self, peer: PeerId) -> PeerLink {
        PeerLink {
            network: self.clone(),
            peer,
        }
    }
}

impl Authority for LocalNetwork {
    fn holder(&self) -> Option<PeerId> {
        self.lock().ok().and_then(|state| state.authority.holder())
    }

    fn term(&self) -> u64 {
        self.lock().map(|state| state.authority.term()).unwrap_or(0)
    }

    fn held_during(&self, peer: PeerId, term: u64) -> bool {
        self.lock()
            .is_ok_and(|state| state.authority.held_during(peer, term))
    }
}

/// One peer's endpoint on a [`LocalNetwork`].
#[derive(Debug, Clone)]
pub struct PeerLink {
    network: LocalNetwork,
    peer: PeerId,
}

impl Transport for PeerLink {
    fn send(&self, message: WireMessage, target: SendTarget) -> Result<(), DomainError> {
        let mut state = self.network.lock()?;
        if !state.peers.contains(&self.peer) {
            return Err(DomainError::UnknownPeer(self.peer));
        }
        match target {
            SendTarget::Peer(to) => {
                let inbox = state
                    .inboxes
                    .get_mut(&to)
                    .ok_or(DomainError::UnknownPeer(to))?;
                inbox.push_back(Delivery::Message(message));
            }
            SendTarget::All | SendTarget::AllBuffered => {
                if target.is_buffered() {
                    state.buffered.push(message.clone());
                }
                state.broadcast(&Delivery::Message(message), Some(self.peer));
            }
        }
        Ok(())
    }
}

impl ReplicatedState for PeerLink {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.network.peers()
    }

    fn peer_flag(&self, peer: PeerId, key: &str) -> bool {
        self.network
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .peer_flags
                    .get(&peer)
                    .and_then(|flags| flags.get(key))
                    .copied()
            })
            .unwrap_or(false)
    }

    fn set_local_flag(&self, key: &str, value: bool) -> Result<(), DomainError> {
        let mut state = self.network.lock()?;
        let flags = state
            .peer_flags
            .get_mut(&self.peer)
            .ok_or(DomainError::UnknownPeer(self.peer))?;
        let previous = flags.insert(key.to_owned(), value).unwrap_or(false);
        if previous != value {
            state.broadcast(
                &Delivery::PeerFlagChanged {
                    peer: self.peer,
                    key: key.to_owned(),
                },
                None,
            );
        }
        Ok(())
    }

    fn session_flag(&self, key: &str) -> bool {
        self.network
            .lock()
            .ok()
            .and_then(|state| state.session_flags.get(key).copied())
            .unwrap_or(false)
    }

    fn compare_and_set_session_flag(
        &self,
        key: &str,
        expected: bool,
        value: bool,
    ) -> Result<bool, DomainError> {
        let mut state = self.network.lock()?;
        if state.authority.holder() != Some(self.peer) {
            return Err(DomainError::NotAuthority(self.peer));
        }
        let current = state.session_flags.get(key).copied().unwrap_or(false);
        if current != expected {
            return Ok(false);
        }
        state.session_flags.insert(key.to_owned(), value);
        if current != value {
            state.broadcast(&Delivery::SessionFlagChanged { key: key.to_owned() }, None);
        }
        Ok(true)
    }
}

//! In-memory replicated state shared by several simulated peers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use questline_core::authority::{Authority, TermHistory};
use questline_core::error::DomainError;
use questline_core::peer::PeerId;
use questline_core::replication::ReplicatedState;

#[derive(Debug, Default)]
struct Inner {
    peers: BTreeSet<PeerId>,
    peer_flags: BTreeMap<PeerId, HashMap<String, bool>>,
    session_flags: HashMap<String, bool>,
    authority: TermHistory,
}

/// Replicated flags for a whole session, with the authority token.
///
/// Cloning shares the same state. Use [`InMemoryReplication::view`] to get
/// the `ReplicatedState` port as seen from one peer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReplication {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryReplication {
    /// Creates a session with `peers` connected. The lowest id holds authority.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_peers(peers: &[u32]) -> Self {
        let replication = Self::default();
        for &peer in peers {
            replication.connect(PeerId(peer));
        }
        replication
    }

    /// Connects `peer`. The first peer to connect takes authority.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn connect(&self, peer: PeerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.peers.insert(peer);
        inner.peer_flags.entry(peer).or_default();
        if inner.authority.holder().is_none() {
            inner.authority.hand_to(Some(peer));
        }
    }

    /// Disconnects `peer`, dropping its flags. Authority moves to the lowest
    /// remaining id if `peer` held it.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn disconnect(&self, peer: PeerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.peers.remove(&peer);
        inner.peer_flags.remove(&peer);
        if inner.authority.holder() == Some(peer) {
            let next = inner.peers.iter().next().copied();
            inner.authority.hand_to(next);
        }
    }

    /// Hands the authority token to `peer`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_authority(&self, peer: PeerId) {
        self.inner.lock().unwrap().authority.hand_to(Some(peer));
    }

    /// Writes a flag on behalf of `peer`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_peer_flag(&self, peer: PeerId, key: &str, value: bool) {
        self.inner
            .lock()
            .unwrap()
            .peer_flags
            .entry(peer)
            .or_default()
            .insert(key.to_owned(), value);
    }

    /// Writes a session flag directly, bypassing the authority check.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_session_flag(&self, key: &str, value: bool) {
        self.inner
            .lock()
            .unwrap()
            .session_flags
            .insert(key.to_owned(), value);
    }

    /// The state as seen from `peer`.
    #[must_use]
    pub fn view(&self, peer: PeerId) -> ReplicaView {
        ReplicaView {
            replication: self.clone(),
            peer,
        }
    }
}

impl Authority for InMemoryReplication {
    fn holder(&self) -> Option<PeerId> {
        self.inner.lock().unwrap().authority.holder()
    }

    fn term(&self) -> u64 {
        self.inner.lock().unwrap().authority.term()
    }

    fn held_during(&self, peer: PeerId, term: u64) -> bool {
        self.inner.lock().unwrap().authority.held_during(peer, term)
    }
}

/// One peer's view of an [`InMemoryReplication`].
#[derive(Debug, Clone)]
pub struct ReplicaView {
    replication: InMemoryReplication,
    peer: PeerId,
}

impl ReplicatedState for ReplicaView {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let inner = self.replication.inner.lock().unwrap();
        inner.peers.iter().copied().collect()
    }

    fn peer_flag(&self, peer: PeerId, key: &str) -> bool {
        let inner = self.replication.inner.lock().unwrap();
        inner
            .peer_flags
            .get(&peer)
            .and_then(|flags| flags.get(key))
            .copied()
            .unwrap_or(false)
    }

    fn set_local_flag(&self, key: &str, value: bool) -> Result<(), DomainError> {
        let mut inner = self.replication.inner.lock().unwrap();
        if !inner.peers.contains(&self.peer) {
            return Err(DomainError::UnknownPeer(self.peer));
        }
        inner
            .peer_flags
            .entry(self.peer)
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn session_flag(&self, key: &str) -> bool {
        let inner = self.replication.inner.lock().unwrap();
        inner.session_flags.get(key).copied().unwrap_or(false)
    }

    fn compare_and_set_session_flag(
        &self,
        key: &str,
        expected: bool,
        value: bool,
    ) -> Result<bool, DomainError> {
        let mut inner = self.replication.inner.lock().unwrap();
        if inner.authority.holder() != Some(self.peer) {
            return Err(DomainError::NotAuthority(self.peer));
        }
        let current = inner.session_flags.get(key).copied().unwrap_or(false);
        if current != expected {
            return Ok(false);
        }
        inner.session_flags.insert(key.to_owned(), value);
        Ok(true)
    }
}

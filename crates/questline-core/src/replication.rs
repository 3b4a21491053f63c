//! Replicated key/value peer state port.

use crate::error::DomainError;
use crate::peer::PeerId;

/// Boolean state replicated across the session, viewed from one peer.
///
/// Two scopes exist:
///
/// * per-peer flags: each peer writes only its own, every peer reads all of
///   them. A peer's flags disappear when it leaves the session.
/// * session flags: readable by everyone, written only by the authority.
///
/// Missing keys read as `false`.
pub trait ReplicatedState: Send + Sync {
    /// The peer this view belongs to.
    fn local_peer(&self) -> PeerId;

    /// Currently connected peers, in ascending id order.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Reads `key` from `peer`'s flags.
    fn peer_flag(&self, peer: PeerId, key: &str) -> bool;

    /// Writes `key` in the local peer's flags.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` if the local peer has left.
    fn set_local_flag(&self, key: &str, value: bool) -> Result<(), DomainError>;

    /// Reads a session-wide flag.
    fn session_flag(&self, key: &str) -> bool;

    /// Atomically replaces a session flag if it still equals `expected`.
    /// Returns `Ok(true)` when this call performed the swap.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAuthority` if the local peer does not hold the
    /// authority token.
    fn compare_and_set_session_flag(
        &self,
        key: &str,
        expected: bool,
        value: bool,
    ) -> Result<bool, DomainError>;
}

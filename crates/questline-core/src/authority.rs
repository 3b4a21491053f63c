//! Authority token port.
//!
//! Exactly one connected peer holds the authority token at any instant. The
//! token migrates when its holder leaves or when the session hands it over
//! explicitly. Components that make shared decisions check the token rather
//! than asking the transport whether they are "the master".
//!
//! Every change of holder opens a new term. A decision taken by the
//! authority carries the term it was taken in, so receivers can accept it
//! after the token has moved on.

use crate::peer::PeerId;

/// Read access to the session's authority token.
pub trait Authority: Send + Sync {
    /// The current holder, or `None` while the session has no peers.
    fn holder(&self) -> Option<PeerId>;

    /// The current term. Starts at 0 before any holder is assigned and
    /// increases on every change of holder.
    fn term(&self) -> u64;

    /// Returns true if `peer` held the token during `term`.
    fn held_during(&self, peer: PeerId, term: u64) -> bool;

    /// Returns true if `peer` currently holds the token.
    fn is_held_by(&self, peer: PeerId) -> bool {
        self.holder() == Some(peer)
    }
}

/// Holder of every term so far, oldest first.
///
/// Term `n` (1-based) was held by `holders[n - 1]`; term 0 has no holder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermHistory {
    holders: Vec<Option<PeerId>>,
}

impl TermHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current holder.
    #[must_use]
    pub fn holder(&self) -> Option<PeerId> {
        self.holders.last().copied().flatten()
    }

    /// The current term.
    #[must_use]
    pub fn term(&self) -> u64 {
        self.holders.len() as u64
    }

    /// Opens a new term held by `holder`, unless it already holds the
    /// current one. Returns true if a term was opened.
    pub fn hand_to(&mut self, holder: Option<PeerId>) -> bool {
        if self.term() > 0 && self.holder() == holder {
            return false;
        }
        self.holders.push(holder);
        true
    }

    /// Returns true if `peer` held the token during `term`.
    #[must_use]
    pub fn held_during(&self, peer: PeerId, term: u64) -> bool {
        let Some(index) = term.checked_sub(1) else {
            return false;
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| self.holders.get(i))
            .is_some_and(|holder| *holder == Some(peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_has_no_holder() {
        let history = TermHistory::new();

        assert_eq!(history.term(), 0);
        assert_eq!(history.holder(), None);
        assert!(!history.held_during(PeerId(1), 0));
    }

    #[test]
    fn test_each_hand_off_opens_a_term() {
        // Arrange
        let mut history = TermHistory::new();

        // Act
        history.hand_to(Some(PeerId(1)));
        let repeated = history.hand_to(Some(PeerId(1)));
        history.hand_to(Some(PeerId(2)));

        // Assert
        assert!(!repeated);
        assert_eq!(history.term(), 2);
        assert_eq!(history.holder(), Some(PeerId(2)));
        assert!(history.held_during(PeerId(1), 1));
        assert!(!history.held_during(PeerId(1), 2));
        assert!(history.held_during(PeerId(2), 2));
        assert!(!history.held_during(PeerId(2), 3));
    }

    #[test]
    fn test_losing_every_peer_opens_an_empty_term() {
        let mut history = TermHistory::new();
        history.hand_to(Some(PeerId(1)));

        history.hand_to(None);

        assert_eq!(history.term(), 2);
        assert_eq!(history.holder(), None);
        assert!(history.held_during(PeerId(1), 1));
    }
}

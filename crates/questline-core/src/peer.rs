//! Peer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one connected peer (one player's game client) in a session.
///
/// Peer ids are assigned by the transport in join order and are never reused
/// within a session; the lowest connected id is the default authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Returns the raw actor number.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

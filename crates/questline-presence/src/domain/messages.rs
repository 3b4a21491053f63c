//! Messages sent through peer progress relays.

use questline_core::net::WirePayload;
use questline_core::peer::PeerId;
use questline_quest::domain::objective::ObjectiveKind;
use serde::{Deserialize, Serialize};

/// Message type for [`RelayMessage::ApplyProgress`].
pub const APPLY_PROGRESS_MESSAGE_TYPE: &str = "relay.apply_progress";

/// A targeted instruction from the authority to one peer's relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Apply progress to the owner's own driver.
    ApplyProgress {
        /// The peer whose relay must execute this.
        owner: PeerId,
        /// Objective kind.
        kind: ObjectiveKind,
        /// Target id.
        target_id: String,
        /// Amount.
        amount: u32,
        /// Authority term the delivery was decided in.
        term: u64,
    },
}

impl WirePayload for RelayMessage {
    fn message_type(&self) -> &'static str {
        match self {
            Self::ApplyProgress { .. } => APPLY_PROGRESS_MESSAGE_TYPE,
        }
    }
}

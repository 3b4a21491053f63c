//! Domain error types.

use thiserror::Error;

use crate::peer::PeerId;

/// Top-level domain error type.
///
/// Every variant describes a rejected operation that left state unchanged.
/// None of them is fatal to a peer: the runtime logs and absorbs them, and
/// only outer surfaces (HTTP, startup) turn them into responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A quest index outside the loaded quest sequence.
    #[error("quest index {index} out of range (sequence has {len} quests)")]
    QuestIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of quests in the sequence.
        len: usize,
    },

    /// An objective index outside a quest's objective list.
    #[error("objective index {index} out of range for quest {quest_index}")]
    ObjectiveIndexOutOfRange {
        /// The owning quest.
        quest_index: usize,
        /// The requested objective index.
        index: usize,
    },

    /// A quest authored without any objectives.
    #[error("quest {0} has no objectives")]
    EmptyQuest(usize),

    /// A peer that is not connected to the session.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// An authority-only operation attempted by a peer without the token.
    #[error("{0} does not hold the authority token")]
    NotAuthority(PeerId),

    /// Invalid authoring data or runtime configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A transport or serialization failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quest_index_message_names_bounds() {
        let err = DomainError::QuestIndexOutOfRange { index: 5, len: 2 };
        assert_eq!(
            err.to_string(),
            "quest index 5 out of range (sequence has 2 quests)"
        );
    }

    #[test]
    fn test_not_authority_message_names_peer() {
        let err = DomainError::NotAuthority(PeerId(2));
        assert_eq!(err.to_string(), "peer-2 does not hold the authority token");
    }
}

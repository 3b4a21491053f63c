//! Transport port.
//!
//! The peer-to-peer transport (connection setup, delivery, buffering) is an
//! external collaborator. The engine only needs to hand it an addressed,
//! serialized message; everything it sends goes through [`Transport::send`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::peer::PeerId;

/// Who a message is delivered to.
///
/// Broadcast targets reach every *other* connected peer. The sender always
/// applies its own copy of an operation before handing it to the transport,
/// so the transport never loops a broadcast back to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendTarget {
    /// Every other connected peer, fire-and-forget.
    All,
    /// Every other connected peer, retained and replayed in order to peers
    /// that join later.
    AllBuffered,
    /// Exactly one peer (may be the sender itself).
    Peer(PeerId),
}

impl SendTarget {
    /// Returns true for targets that are retained for late joiners.
    #[must_use]
    pub fn is_buffered(self) -> bool {
        matches!(self, Self::AllBuffered)
    }
}

/// Serialized message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Unique message identifier.
    pub message_id: Uuid,
    /// Routing name, e.g. `quest.complete` or `relay.apply_progress`.
    pub message_type: String,
    /// The peer that sent the message.
    pub sender: PeerId,
    /// Correlation ID of the operation that produced the message.
    pub correlation_id: Uuid,
    /// Serialized message body.
    pub payload: serde_json::Value,
}

impl WireMessage {
    /// Encodes a typed message for the wire.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the message cannot be serialized.
    pub fn encode<M: WirePayload>(
        sender: PeerId,
        correlation_id: Uuid,
        message: &M,
    ) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(message).map_err(|e| {
            DomainError::Infrastructure(format!("message serialization failed: {e}"))
        })?;
        Ok(Self {
            message_id: Uuid::new_v4(),
            message_type: message.message_type().to_owned(),
            sender,
            correlation_id,
            payload,
        })
    }

    /// Decodes the payload back into a typed message.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not match `M`.
    pub fn decode<M: DeserializeOwned>(&self) -> Result<M, DomainError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!(
                "message deserialization failed for {}: {e}",
                self.message_type
            ))
        })
    }
}

/// A message type that can travel over the transport.
pub trait WirePayload: Serialize + DeserializeOwned + std::fmt::Debug {
    /// Routing name for this message.
    fn message_type(&self) -> &'static str;
}

/// A message a component wants sent, queued until the runtime flushes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound<M> {
    /// Delivery target.
    pub target: SendTarget,
    /// The message body.
    pub message: M,
    /// Correlation ID of the operation that produced it.
    pub correlation_id: Uuid,
}

/// Sends serialized messages to remote peers.
pub trait Transport: Send + Sync {
    /// Queues `message` for delivery to `target`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownPeer` for a targeted send to a peer that is
    /// not connected, or `DomainError::Infrastructure` if the transport is down.
    fn send(&self, message: WireMessage, target: SendTarget) -> Result<(), DomainError>;
}

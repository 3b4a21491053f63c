//! Command abstractions.

use uuid::Uuid;

use crate::peer::PeerId;

/// Trait that all commands implement.
///
/// A command is an intent issued on behalf of one peer (player input, a
/// trigger volume, a debug console). It is handled on that peer only; any
/// replication is decided by the component that handles it.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The peer the command is issued on behalf of.
    fn peer_id(&self) -> PeerId;
}

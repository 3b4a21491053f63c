//! Domain layer: model types, events, replicated messages, authoring data.

pub mod catalog;
pub mod events;
pub mod messages;
pub mod objective;
pub mod quest;
pub mod snapshot;

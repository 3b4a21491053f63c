//! Application layer for the Presence context.

pub mod coordinator;
pub mod relay;

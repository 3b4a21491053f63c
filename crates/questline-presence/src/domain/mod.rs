//! Domain layer for the Presence context.

pub mod area;
pub mod messages;

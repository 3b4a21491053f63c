//! Application layer: the progression driver and read-only views.

pub mod progression;
pub mod query_handlers;

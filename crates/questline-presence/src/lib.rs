//! Questline Presence — area-gated objectives.
//!
//! Area objectives (reach/find an area) can be gated on the whole party
//! standing in the area at once. Each peer publishes its own presence flag
//! through replicated state; the authority alone decides when the quorum is
//! reached and delivers the resulting progress to every peer through that
//! peer's progress relay.

pub mod application;
pub mod domain;

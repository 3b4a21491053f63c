//! Questline Core — shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the quest,
//! presence and session crates depend on, including the ports through which
//! the engine talks to its external collaborators (transport, replicated
//! peer state, authority token, reward sink). It contains no infrastructure
//! code.

pub mod authority;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod net;
pub mod observer;
pub mod peer;
pub mod replication;
pub mod reward;

//! Questline Session — running the progression engine for several peers.
//!
//! Each peer gets a runtime that wires its progression driver, area
//! coordinators and progress relay to the collaborator ports. The
//! `LocalNetwork` implements those ports in memory so a whole multiplayer
//! session can run in one process, which is how the HTTP host and the
//! scenario tests drive it.

pub mod application;
pub mod domain;
pub mod infrastructure;

//! Questline — Quest Progression context.
//!
//! Responsible for the quest and objective model, the per-peer progression
//! driver (start, progress, complete, cascade), the replication decisions
//! attached to those operations, progress snapshots for reconciliation, and
//! loading authored quest catalogs.

pub mod application;
pub mod domain;

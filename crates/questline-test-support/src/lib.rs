//! Shared test doubles for the Questline progression engine.

mod clock;
mod observer;
mod replication;
mod rewards;

pub use clock::FixedClock;
pub use observer::RecordingObserver;
pub use replication::{InMemoryReplication, ReplicaView};
pub use rewards::{FailingRewardSink, RecordingRewardSink};

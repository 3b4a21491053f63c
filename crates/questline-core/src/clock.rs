//! Time source used to stamp quest and session events.

use chrono::{DateTime, Utc};

/// Source of event timestamps. Injected so event streams stay reproducible
/// in tests and simulated sessions.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, used by the game client and the HTTP host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

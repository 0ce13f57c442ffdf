use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Logical milliseconds since the session clock started.
/// The machine never reads a wall clock; the driver stamps every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub ms: u64,
}

impl Timestamp {
    pub fn new(ms: u64) -> Self {
        Timestamp { ms }
    }

    pub fn advance(&self, by: Duration) -> Self {
        Timestamp { ms: self.ms + by.as_millis() as u64 }
    }

    /// Saturating distance from `earlier` to `self`.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.ms.saturating_sub(earlier.ms)
    }
}

/// Driver side: maps real time onto `Timestamp`.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: std::time::Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self { origin: std::time::Instant::now() }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp { ms: self.origin.elapsed().as_millis() as u64 }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

use std::collections::VecDeque;

use super::event::{LogEntry, LogEventKind};
use crate::kernel::state::PipelineState;
use crate::kernel::time::Timestamp;

pub const MAX_LOG_ENTRIES: usize = 1_000;

/// Bounded append-only log. Oldest entries are evicted first.
#[derive(Debug)]
pub struct EventLog {
    buffer: VecDeque<LogEntry>,
    capacity: usize,
    evicted: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    pub fn record(
        &mut self,
        timestamp: Timestamp,
        event: LogEventKind,
        state: PipelineState,
        payload: serde_json::Value,
    ) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            self.evicted += 1;
        }
        self.buffer.push_back(LogEntry { timestamp, event, state, payload });
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut log = EventLog::new();
        assert!(log.is_empty());
        for i in 0..(MAX_LOG_ENTRIES as u64 + 5) {
            log.record(Timestamp::new(i), LogEventKind::Transition, PipelineState::Idle, json!({ "i": i }));
        }
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(log.evicted(), 5);
        assert_eq!(log.entries()[0].timestamp, Timestamp::new(5));
    }
}

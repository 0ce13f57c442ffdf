//! Session diagnostics.
//!
//! # INVARIANT
//! Telemetry is a write-only side channel for the state machine. Nothing in
//! the transition logic reads it back; it exists for diagnostics
//! consumers.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{LogEntry, LogEventKind};
pub use metrics::{Metrics, MetricsSnapshot};
pub use recorder::EventLog;

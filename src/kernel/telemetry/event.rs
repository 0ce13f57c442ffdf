use serde::Serialize;

use crate::kernel::state::PipelineState;
use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventKind {
    Transition,
    Transcript,
    Preview,
    Parse,
    Gate,
    Dispatch,
    DispatchResult,
    Cancel,
    Error,
    Context,
    Ignored,
}

/// One appended record. `state` is the state at emission time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub event: LogEventKind,
    pub state: PipelineState,
    pub payload: serde_json::Value,
}

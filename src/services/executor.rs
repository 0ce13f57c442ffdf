//! Contract with the controlled application.
//!
//! Action identifiers here are the executor's own vocabulary ("locate",
//! "mute_on", "volume_nudge"); only the dispatcher translates intents into
//! them.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::info;

use crate::error::ExecutorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub detail: String,
}

impl ExecutionResult {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self { success: true, detail: detail.into() }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self { success: false, detail: detail.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackRef {
    Index(u32),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarSpan {
    At(u32),
    Range(u32, u32),
}

/// One call against the executor, already validated.
///
/// The `action` strings are the executor vocabulary, which differs from the
/// spoken one (saying "play" sends `start`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutorCommand {
    /// `start`, `stop`, `pause`, `record`.
    Transport { action: &'static str },
    /// `undo`, `redo`.
    Edit { action: &'static str },
    /// `save`.
    Project { action: &'static str },
    /// `locate` (with a bar), `locate_start`, `locate_end`, `marker_next`, `marker_prev`.
    Navigation { action: &'static str, bar: Option<u32> },
    /// `mute_on`, `mute_off`, `solo_on`, `solo_off`, `rec_arm_on`, `rec_arm_off`, `select`.
    Track { action: &'static str, target: TrackRef },
    /// `volume_set` (dB), `volume_nudge` (dB delta), `pan_set` (-1.0 to 1.0).
    Mixer { action: &'static str, target: TrackRef, value: f32 },
    /// `loop_enable`, `loop_disable`, `loop_range`, `punch_in`, `punch_out`, `punch_range`.
    PunchLoop { action: &'static str, span: Option<BarSpan> },
}

impl fmt::Display for ExecutorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorCommand::Transport { action } => write!(f, "transport({})", action),
            ExecutorCommand::Edit { action } => write!(f, "edit({})", action),
            ExecutorCommand::Project { action } => write!(f, "project({})", action),
            ExecutorCommand::Navigation { action, bar } => write!(f, "navigation({}, {:?})", action, bar),
            ExecutorCommand::Track { action, target } => write!(f, "track({}, {:?})", action, target),
            ExecutorCommand::Mixer { action, target, value } => {
                write!(f, "mixer({}, {:?}, {})", action, target, value)
            }
            ExecutorCommand::PunchLoop { action, span } => write!(f, "punch_loop({}, {:?})", action, span),
        }
    }
}

type ExecResult = Result<ExecutionResult, ExecutorError>;

/// Per-category entry points of the controlled application.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn transport(&self, action: &str) -> ExecResult;
    async fn edit(&self, action: &str) -> ExecResult;
    async fn project(&self, action: &str) -> ExecResult;
    async fn navigation(&self, action: &str, bar: Option<u32>) -> ExecResult;
    async fn track(&self, action: &str, target: TrackRef) -> ExecResult;
    async fn mixer(&self, action: &str, target: TrackRef, value: f32) -> ExecResult;
    async fn punch_loop(&self, action: &str, span: Option<BarSpan>) -> ExecResult;
}

/// Accepts everything and logs it. Used by the interactive binary.
#[derive(Debug, Default)]
pub struct LoggingExecutor;

#[async_trait]
impl ActionExecutor for LoggingExecutor {
    async fn transport(&self, action: &str) -> ExecResult {
        info!("[EXEC] transport {}", action);
        Ok(ExecutionResult::ok(action))
    }

    async fn edit(&self, action: &str) -> ExecResult {
        info!("[EXEC] edit {}", action);
        Ok(ExecutionResult::ok(action))
    }

    async fn project(&self, action: &str) -> ExecResult {
        info!("[EXEC] project {}", action);
        Ok(ExecutionResult::ok(action))
    }

    async fn navigation(&self, action: &str, bar: Option<u32>) -> ExecResult {
        info!("[EXEC] navigation {} {:?}", action, bar);
        Ok(ExecutionResult::ok(action))
    }

    async fn track(&self, action: &str, target: TrackRef) -> ExecResult {
        info!("[EXEC] track {} {:?}", action, target);
        Ok(ExecutionResult::ok(action))
    }

    async fn mixer(&self, action: &str, target: TrackRef, value: f32) -> ExecResult {
        info!("[EXEC] mixer {} {:?} {}", action, target, value);
        Ok(ExecutionResult::ok(action))
    }

    async fn punch_loop(&self, action: &str, span: Option<BarSpan>) -> ExecResult {
        info!("[EXEC] punch_loop {} {:?}", action, span);
        Ok(ExecutionResult::ok(action))
    }
}

/// Records every call; optionally fails them. For tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    fail_with: Option<ExecutorError>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: ExecutorError) -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_with: Some(error) }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> ExecResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(ExecutionResult::ok(call)),
        }
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn transport(&self, action: &str) -> ExecResult {
        self.record(format!("transport({})", action))
    }

    async fn edit(&self, action: &str) -> ExecResult {
        self.record(format!("edit({})", action))
    }

    async fn project(&self, action: &str) -> ExecResult {
        self.record(format!("project({})", action))
    }

    async fn navigation(&self, action: &str, bar: Option<u32>) -> ExecResult {
        self.record(format!("navigation({}, {:?})", action, bar))
    }

    async fn track(&self, action: &str, target: TrackRef) -> ExecResult {
        self.record(format!("track({}, {:?})", action, target))
    }

    async fn mixer(&self, action: &str, target: TrackRef, value: f32) -> ExecResult {
        self.record(format!("mixer({}, {:?}, {})", action, target, value))
    }

    async fn punch_loop(&self, action: &str, span: Option<BarSpan>) -> ExecResult {
        self.record(format!("punch_loop({}, {:?})", action, span))
    }
}

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::PipelineConfig;

/// The explicit lifecycle of one voice-command session.
/// Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    #[default]
    Idle,
    /// Speech in progress.
    Listening,
    /// Speech ended, waiting for the final transcript.
    Transcribing,
    /// Resolving an intent; also hosts the cancel window.
    Parsing,
    /// Waiting for a yes/no or a re-spoken command.
    Confirming,
    /// Dispatch issued, waiting for the executor.
    Executing,
    /// Spoken feedback in flight.
    Speaking,
    /// Always recovers to Idle.
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a scheduled timer means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    StateTimeout(PipelineState),
    CancelWindow,
}

impl PipelineState {
    /// Deadline scheduled on entry. Idle waits forever.
    pub fn timeout(&self, config: &PipelineConfig) -> Option<Duration> {
        let t = &config.timeouts;
        match self {
            PipelineState::Idle => None,
            PipelineState::Listening => Some(t.listening()),
            PipelineState::Transcribing => Some(t.transcribing()),
            PipelineState::Parsing => Some(t.parsing()),
            PipelineState::Confirming => Some(t.confirming()),
            PipelineState::Executing => Some(t.executing()),
            PipelineState::Speaking => Some(t.speaking()),
            PipelineState::Error => Some(t.error_recovery()),
        }
    }

    /// States an explicit cancel can leave.
    pub fn is_cancellable(&self) -> bool {
        !matches!(self, PipelineState::Idle | PipelineState::Error)
    }
}

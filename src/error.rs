use serde::Serialize;
use thiserror::Error;

/// Failure kinds the pipeline recognises. None is fatal: timeouts and
/// execution failures route through `Error` back to `Idle`, while
/// `UnknownIntent` is answered with a re-prompt instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum PipelineErrorKind {
    #[error("transcription timeout")]
    TranscriptionTimeout,
    #[error("parse timeout")]
    ParseTimeout,
    #[error("confirmation timeout")]
    ConfirmationTimeout,
    #[error("execution timeout")]
    ExecutionTimeout,
    #[error("execution failure")]
    ExecutionFailure,
    #[error("unknown intent")]
    UnknownIntent,
    #[error("invalid target")]
    InvalidTarget,
}

impl PipelineErrorKind {
    /// Apology spoken on entry to `Error`.
    pub fn apology(&self) -> &'static str {
        match self {
            PipelineErrorKind::TranscriptionTimeout => "Sorry, I didn't catch that.",
            PipelineErrorKind::ParseTimeout => "Sorry, I couldn't work that out.",
            PipelineErrorKind::ConfirmationTimeout => "No response, cancelled.",
            PipelineErrorKind::ExecutionTimeout => "Sorry, that took too long.",
            PipelineErrorKind::ExecutionFailure => "Sorry, that didn't work.",
            PipelineErrorKind::UnknownIntent => "Sorry, I didn't understand.",
            PipelineErrorKind::InvalidTarget => "Sorry, that target doesn't exist.",
        }
    }
}

/// Preconditions rejected before anything reaches the executor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("invalid track number {0}")]
    InvalidTrackNumber(u32),
    #[error("invalid bar {0}")]
    InvalidBar(u32),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("intent has no resolved target")]
    MissingTarget,
}

impl DispatchError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            DispatchError::InvalidTrackNumber(_)
            | DispatchError::InvalidBar(_)
            | DispatchError::InvalidParameter(_)
            | DispatchError::MissingTarget => PipelineErrorKind::InvalidTarget,
        }
    }
}

/// Raised by an `ActionExecutor` implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    #[error("executor rejected command: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("pipeline actor has stopped")]
    Closed,
}

use serde::Serialize;
use std::time::Duration;

use super::context::HoverContext;
use super::state::TimerKind;
use super::time::Timestamp;
use crate::intent::types::QuickGuess;
use crate::services::executor::{ExecutionResult, ExecutorCommand};

/// A recogniser result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    /// 0.0 - 1.0 as reported by the recogniser.
    pub confidence: f32,
    pub is_final: bool,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerId {
    pub seq: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DispatchTicket(pub u64);

/// Everything the machine reacts to. All inbound signals, including timer
/// firings and dispatch completions, arrive as one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SpeechStart,
    SpeechEnd,
    InterimTranscript { text: String, confidence: f32 },
    FinalTranscript { text: String, confidence: f32 },
    /// Typed command: speech start, end and a final transcript at full
    /// confidence in one step.
    Typed(String),
    /// Explicit cancel (button, hotkey).
    Cancel,
    ContextUpdated(HoverContext),
    DispatchCompleted { ticket: DispatchTicket, result: ExecutionResult },
    TimerFired(TimerId),
}

impl PipelineEvent {
    pub fn final_transcript(text: &str, confidence: f32) -> Self {
        PipelineEvent::FinalTranscript { text: text.to_string(), confidence }
    }

    pub fn interim_transcript(text: &str, confidence: f32) -> Self {
        PipelineEvent::InterimTranscript { text: text.to_string(), confidence }
    }

    pub fn typed(text: &str) -> Self {
        PipelineEvent::Typed(text.to_string())
    }
}

/// Work the driver performs on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Fire-and-forget TTS.
    Speak(String),
    /// Cut off whatever is being spoken (barge-in).
    StopSpeaking,
    /// Interim quick-guess preview. Never executes anything.
    Preview(QuickGuess),
    Dispatch { ticket: DispatchTicket, command: ExecutorCommand },
    ScheduleTimer { id: TimerId, after: Duration },
    CancelTimer(TimerId),
}

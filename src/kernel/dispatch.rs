use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::DispatchError;
use crate::intent::types::*;
use crate::services::executor::{ActionExecutor, BarSpan, ExecutionResult, ExecutorCommand, TrackRef};

pub const FAILURE_PHRASE: &str = "Sorry, that didn't work.";

const MIN_VOLUME_DB: f32 = -96.0;
const MAX_VOLUME_DB: f32 = 12.0;
const MAX_VOLUME_STEP_DB: f32 = 48.0;
const MAX_PAN: u32 = 100;

/// Translates intents into executor commands and builds spoken results.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    max_track: u32,
    max_bar: u32,
}

impl Dispatcher {
    pub fn new(max_track: u32, max_bar: u32) -> Self {
        Self { max_track, max_bar }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_track, config.max_bar)
    }

    /// Validates preconditions and maps to the executor vocabulary.
    /// Nothing is sent when this fails.
    ///
    /// The action strings are the executor's own names (`"start"` for play,
    /// `"locate"` for a bar jump, and so on), listed on
    /// [`ExecutorCommand`](crate::services::executor::ExecutorCommand), not
    /// the spoken verbs.
    pub fn prepare(&self, intent: &Intent) -> Result<ExecutorCommand, DispatchError> {
        let command = match intent.action() {
            Action::Transport(action) => ExecutorCommand::Transport {
                action: match action {
                    TransportAction::Play => "start",
                    TransportAction::Stop => "stop",
                    TransportAction::Pause => "pause",
                    TransportAction::Record => "record",
                },
            },
            Action::Edit(action) => ExecutorCommand::Edit {
                action: match action {
                    EditAction::Undo => "undo",
                    EditAction::Redo => "redo",
                },
            },
            Action::Project(ProjectAction::Save) => ExecutorCommand::Project { action: "save" },
            Action::Navigation(action) => match action {
                NavigationAction::GotoBar(bar) => {
                    ExecutorCommand::Navigation { action: "locate", bar: Some(self.bar(*bar)?) }
                }
                NavigationAction::GotoStart => ExecutorCommand::Navigation { action: "locate_start", bar: None },
                NavigationAction::GotoEnd => ExecutorCommand::Navigation { action: "locate_end", bar: None },
                NavigationAction::NextMarker => ExecutorCommand::Navigation { action: "marker_next", bar: None },
                NavigationAction::PreviousMarker => {
                    ExecutorCommand::Navigation { action: "marker_prev", bar: None }
                }
            },
            Action::Track { action, target } => ExecutorCommand::Track {
                action: match action {
                    TrackAction::Mute => "mute_on",
                    TrackAction::Unmute => "mute_off",
                    TrackAction::Solo => "solo_on",
                    TrackAction::Unsolo => "solo_off",
                    TrackAction::Arm => "rec_arm_on",
                    TrackAction::Disarm => "rec_arm_off",
                    TrackAction::Select => "select",
                },
                target: self.track(*target)?,
            },
            Action::Mixer { action, target } => {
                let target = self.track(*target)?;
                match action {
                    MixerAction::SetVolume(db) => {
                        if !(MIN_VOLUME_DB..=MAX_VOLUME_DB).contains(db) {
                            return Err(DispatchError::InvalidParameter(format!("volume {} dB", db)));
                        }
                        ExecutorCommand::Mixer { action: "volume_set", target, value: *db }
                    }
                    MixerAction::AdjustVolume(delta) => {
                        if delta.abs() > MAX_VOLUME_STEP_DB {
                            return Err(DispatchError::InvalidParameter(format!("volume step {} dB", delta)));
                        }
                        ExecutorCommand::Mixer { action: "volume_nudge", target, value: *delta }
                    }
                    MixerAction::SetPan(pan) => {
                        if pan.unsigned_abs() > MAX_PAN {
                            return Err(DispatchError::InvalidParameter(format!("pan {}", pan)));
                        }
                        ExecutorCommand::Mixer { action: "pan_set", target, value: *pan as f32 / 100.0 }
                    }
                }
            }
            Action::PunchLoop(action) => match action {
                PunchLoopAction::LoopOn => ExecutorCommand::PunchLoop { action: "loop_enable", span: None },
                PunchLoopAction::LoopOff => ExecutorCommand::PunchLoop { action: "loop_disable", span: None },
                PunchLoopAction::SetLoop(range) => {
                    ExecutorCommand::PunchLoop { action: "loop_range", span: Some(self.range(*range)?) }
                }
                PunchLoopAction::PunchIn(bar) => {
                    ExecutorCommand::PunchLoop { action: "punch_in", span: Some(BarSpan::At(self.bar(*bar)?)) }
                }
                PunchLoopAction::PunchOut(bar) => {
                    ExecutorCommand::PunchLoop { action: "punch_out", span: Some(BarSpan::At(self.bar(*bar)?)) }
                }
                PunchLoopAction::SetPunch(range) => {
                    ExecutorCommand::PunchLoop { action: "punch_range", span: Some(self.range(*range)?) }
                }
            },
        };
        Ok(command)
    }

    fn track(&self, target: Option<Target>) -> Result<TrackRef, DispatchError> {
        match target {
            Some(Target::All) => Ok(TrackRef::All),
            Some(Target::Track(n)) if (1..=self.max_track).contains(&n) => Ok(TrackRef::Index(n)),
            Some(Target::Track(n)) => Err(DispatchError::InvalidTrackNumber(n)),
            None => Err(DispatchError::MissingTarget),
        }
    }

    fn bar(&self, bar: u32) -> Result<u32, DispatchError> {
        if (1..=self.max_bar).contains(&bar) {
            Ok(bar)
        } else {
            Err(DispatchError::InvalidBar(bar))
        }
    }

    fn range(&self, range: BarRange) -> Result<BarSpan, DispatchError> {
        let start = self.bar(range.start)?;
        let end = self.bar(range.end)?;
        if start >= end {
            return Err(DispatchError::InvalidParameter(format!("bar range {} to {}", start, end)));
        }
        Ok(BarSpan::Range(start, end))
    }

    /// Short spoken result for a successful dispatch.
    pub fn confirmation(&self, intent: &Intent) -> String {
        let subject = |target: Option<Target>, verb: &str| match target {
            Some(Target::All) => format!("All tracks {}.", verb),
            Some(Target::Track(n)) => format!("Track {} {}.", n, verb),
            None => format!("{}.", verb),
        };
        match intent.action() {
            Action::Transport(TransportAction::Play) => "Playing.".into(),
            Action::Transport(TransportAction::Stop) => "Stopped.".into(),
            Action::Transport(TransportAction::Pause) => "Paused.".into(),
            Action::Transport(TransportAction::Record) => "Recording.".into(),
            Action::Edit(EditAction::Undo) => "Undone.".into(),
            Action::Edit(EditAction::Redo) => "Redone.".into(),
            Action::Project(ProjectAction::Save) => "Project saved.".into(),
            Action::Navigation(NavigationAction::GotoBar(bar)) => format!("Bar {}.", bar),
            Action::Navigation(NavigationAction::GotoStart) => "Start.".into(),
            Action::Navigation(NavigationAction::GotoEnd) => "End.".into(),
            Action::Navigation(NavigationAction::NextMarker) => "Next marker.".into(),
            Action::Navigation(NavigationAction::PreviousMarker) => "Previous marker.".into(),
            Action::Track { action, target } => subject(*target, action.participle()),
            Action::Mixer { action, target } => {
                let detail = match action {
                    MixerAction::SetVolume(db) => format!("volume {} dB", fmt_db(*db)),
                    MixerAction::AdjustVolume(d) if *d >= 0.0 => format!("volume up {} dB", fmt_db(*d)),
                    MixerAction::AdjustVolume(d) => format!("volume down {} dB", fmt_db(-*d)),
                    MixerAction::SetPan(pan) => format!("pan {}", fmt_pan(*pan)),
                };
                subject(*target, &detail)
            }
            Action::PunchLoop(PunchLoopAction::LoopOn) => "Loop on.".into(),
            Action::PunchLoop(PunchLoopAction::LoopOff) => "Loop off.".into(),
            Action::PunchLoop(PunchLoopAction::SetLoop(r)) => format!("Loop bars {} to {}.", r.start, r.end),
            Action::PunchLoop(PunchLoopAction::PunchIn(bar)) => format!("Punch in at bar {}.", bar),
            Action::PunchLoop(PunchLoopAction::PunchOut(bar)) => format!("Punch out at bar {}.", bar),
            Action::PunchLoop(PunchLoopAction::SetPunch(r)) => format!("Punch bars {} to {}.", r.start, r.end),
        }
    }
}

/// Issues exactly one executor call. Executor errors are folded into an
/// unsuccessful `ExecutionResult` so the pipeline sees a single shape.
pub async fn execute(executor: &dyn ActionExecutor, command: &ExecutorCommand) -> ExecutionResult {
    let result = match command {
        ExecutorCommand::Transport { action } => executor.transport(action).await,
        ExecutorCommand::Edit { action } => executor.edit(action).await,
        ExecutorCommand::Project { action } => executor.project(action).await,
        ExecutorCommand::Navigation { action, bar } => executor.navigation(action, *bar).await,
        ExecutorCommand::Track { action, target } => executor.track(action, *target).await,
        ExecutorCommand::Mixer { action, target, value } => executor.mixer(action, *target, *value).await,
        ExecutorCommand::PunchLoop { action, span } => executor.punch_loop(action, *span).await,
    };

    match result {
        Ok(result) => result,
        Err(e) => {
            warn!("Executor error for {}: {}", command, e);
            ExecutionResult::failed(e.to_string())
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Executor-facing category of an intent. Each maps to one executor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Transport,
    Edit,
    Project,
    Navigation,
    Track,
    Mixer,
    PunchLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportAction {
    Play,
    Stop,
    Pause,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectAction {
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationAction {
    GotoBar(u32),
    GotoStart,
    GotoEnd,
    NextMarker,
    PreviousMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackAction {
    Mute,
    Unmute,
    Solo,
    Unsolo,
    Arm,
    Disarm,
    Select,
}

impl TrackAction {
    pub fn verb(&self) -> &'static str {
        match self {
            TrackAction::Mute => "mute",
            TrackAction::Unmute => "unmute",
            TrackAction::Solo => "solo",
            TrackAction::Unsolo => "unsolo",
            TrackAction::Arm => "arm",
            TrackAction::Disarm => "disarm",
            TrackAction::Select => "select",
        }
    }

    /// Past participle used in spoken confirmations ("Track 3 muted.").
    pub fn participle(&self) -> &'static str {
        match self {
            TrackAction::Mute => "muted",
            TrackAction::Unmute => "unmuted",
            TrackAction::Solo => "soloed",
            TrackAction::Unsolo => "unsoloed",
            TrackAction::Arm => "armed",
            TrackAction::Disarm => "disarmed",
            TrackAction::Select => "selected",
        }
    }
}

/// Volume is in dB, pan in percent (-100 hard left, 100 hard right).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MixerAction {
    SetVolume(f32),
    AdjustVolume(f32),
    SetPan(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchLoopAction {
    LoopOn,
    LoopOff,
    SetLoop(BarRange),
    PunchIn(u32),
    PunchOut(u32),
    SetPunch(BarRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Track(u32),
    All,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Track(n) => write!(f, "track {}", n),
            Target::All => write!(f, "all tracks"),
        }
    }
}

/// How a track/mixer target was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSource {
    /// Number stated in the utterance.
    Explicit,
    /// "all tracks".
    Global,
    /// "this", or no reference with an active hover target.
    Hover,
    /// "that": most recent entry of the recent-target history.
    Recent,
    /// "selected" / "current".
    Selection,
    Unresolved,
}

impl TargetSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, TargetSource::Hover | TargetSource::Recent | TargetSource::Selection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Transport(TransportAction),
    Edit(EditAction),
    Project(ProjectAction),
    Navigation(NavigationAction),
    Track { action: TrackAction, target: Option<Target> },
    Mixer { action: MixerAction, target: Option<Target> },
    PunchLoop(PunchLoopAction),
}

impl Action {
    pub fn kind(&self) -> IntentKind {
        match self {
            Action::Transport(_) => IntentKind::Transport,
            Action::Edit(_) => IntentKind::Edit,
            Action::Project(_) => IntentKind::Project,
            Action::Navigation(_) => IntentKind::Navigation,
            Action::Track { .. } => IntentKind::Track,
            Action::Mixer { .. } => IntentKind::Mixer,
            Action::PunchLoop(_) => IntentKind::PunchLoop,
        }
    }

    /// Stable snake_case name, used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Transport(TransportAction::Play) => "play",
            Action::Transport(TransportAction::Stop) => "stop",
            Action::Transport(TransportAction::Pause) => "pause",
            Action::Transport(TransportAction::Record) => "record",
            Action::Edit(EditAction::Undo) => "undo",
            Action::Edit(EditAction::Redo) => "redo",
            Action::Project(ProjectAction::Save) => "save",
            Action::Navigation(NavigationAction::GotoBar(_)) => "goto_bar",
            Action::Navigation(NavigationAction::GotoStart) => "goto_start",
            Action::Navigation(NavigationAction::GotoEnd) => "goto_end",
            Action::Navigation(NavigationAction::NextMarker) => "next_marker",
            Action::Navigation(NavigationAction::PreviousMarker) => "previous_marker",
            Action::Track { action, .. } => action.verb(),
            Action::Mixer { action: MixerAction::SetVolume(_), .. } => "set_volume",
            Action::Mixer { action: MixerAction::AdjustVolume(_), .. } => "adjust_volume",
            Action::Mixer { action: MixerAction::SetPan(_), .. } => "set_pan",
            Action::PunchLoop(PunchLoopAction::LoopOn) => "loop_on",
            Action::PunchLoop(PunchLoopAction::LoopOff) => "loop_off",
            Action::PunchLoop(PunchLoopAction::SetLoop(_)) => "set_loop",
            Action::PunchLoop(PunchLoopAction::PunchIn(_)) => "punch_in",
            Action::PunchLoop(PunchLoopAction::PunchOut(_)) => "punch_out",
            Action::PunchLoop(PunchLoopAction::SetPunch(_)) => "set_punch",
        }
    }

    pub fn target(&self) -> Option<Target> {
        match self {
            Action::Track { target, .. } | Action::Mixer { target, .. } => *target,
            _ => None,
        }
    }

    /// Short phrase describing what will happen, without punctuation.
    pub fn summary(&self) -> String {
        let on = |target: &Option<Target>| match target {
            Some(Target::Track(n)) => format!("track {}", n),
            Some(Target::All) => "all tracks".to_string(),
            None => "the track".to_string(),
        };
        match self {
            Action::Transport(TransportAction::Play) => "Play".into(),
            Action::Transport(TransportAction::Stop) => "Stop".into(),
            Action::Transport(TransportAction::Pause) => "Pause".into(),
            Action::Transport(TransportAction::Record) => "Record".into(),
            Action::Edit(EditAction::Undo) => "Undo".into(),
            Action::Edit(EditAction::Redo) => "Redo".into(),
            Action::Project(ProjectAction::Save) => "Save the project".into(),
            Action::Navigation(NavigationAction::GotoBar(bar)) => format!("Go to bar {}", bar),
            Action::Navigation(NavigationAction::GotoStart) => "Go to the start".into(),
            Action::Navigation(NavigationAction::GotoEnd) => "Go to the end".into(),
            Action::Navigation(NavigationAction::NextMarker) => "Next marker".into(),
            Action::Navigation(NavigationAction::PreviousMarker) => "Previous marker".into(),
            Action::Track { action, target } => {
                let verb = action.verb();
                let mut s = format!("{} {}", verb, on(target));
                s[..1].make_ascii_uppercase();
                s
            }
            Action::Mixer { action, target } => match action {
                MixerAction::SetVolume(db) => format!("Set {} volume to {} dB", on(target), fmt_db(*db)),
                MixerAction::AdjustVolume(delta) if *delta >= 0.0 => {
                    format!("Raise {} volume by {} dB", on(target), fmt_db(*delta))
                }
                MixerAction::AdjustVolume(delta) => {
                    format!("Lower {} volume by {} dB", on(target), fmt_db(-*delta))
                }
                MixerAction::SetPan(pan) => format!("Pan {} {}", on(target), fmt_pan(*pan)),
            },
            Action::PunchLoop(PunchLoopAction::LoopOn) => "Loop on".into(),
            Action::PunchLoop(PunchLoopAction::LoopOff) => "Loop off".into(),
            Action::PunchLoop(PunchLoopAction::SetLoop(r)) => format!("Loop bars {} to {}", r.start, r.end),
            Action::PunchLoop(PunchLoopAction::PunchIn(bar)) => format!("Punch in at bar {}", bar),
            Action::PunchLoop(PunchLoopAction::PunchOut(bar)) => format!("Punch out at bar {}", bar),
            Action::PunchLoop(PunchLoopAction::SetPunch(r)) => format!("Punch bars {} to {}", r.start, r.end),
        }
    }
}

pub(crate) fn fmt_db(db: f32) -> String {
    if db.fract() == 0.0 {
        format!("{:.0}", db)
    } else {
        format!("{:.1}", db)
    }
}

pub(crate) fn fmt_pan(pan: i32) -> String {
    match pan {
        0 => "center".to_string(),
        p if p < 0 => format!("left {}", p.unsigned_abs()),
        p => format!("right {}", p),
    }
}

/// A resolved, typed meaning of one utterance.
///
/// Immutable once built: the pipeline replaces its current intent on every
/// parse instead of editing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    id: Uuid,
    action: Action,
    target_source: Option<TargetSource>,
    confidence: f32,
    summary: String,
    clarification_prompt: Option<String>,
    utterance: String,
}

impl Intent {
    pub(crate) fn new(
        action: Action,
        target_source: Option<TargetSource>,
        confidence: f32,
        clarification_prompt: Option<String>,
        utterance: &str,
    ) -> Self {
        let summary = action.summary();
        Self {
            id: Uuid::new_v4(),
            action,
            target_source,
            confidence: confidence.clamp(0.0, 1.0),
            summary,
            clarification_prompt,
            utterance: utterance.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> IntentKind {
        self.action.kind()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn action_name(&self) -> &'static str {
        self.action.name()
    }

    pub fn target(&self) -> Option<Target> {
        self.action.target()
    }

    pub fn target_source(&self) -> Option<TargetSource> {
        self.target_source
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn needs_clarification(&self) -> bool {
        self.clarification_prompt.is_some()
    }

    pub fn clarification_prompt(&self) -> Option<&str> {
        self.clarification_prompt.as_deref()
    }

    /// Normalized text the intent was parsed from.
    pub fn utterance(&self) -> &str {
        &self.utterance
    }
}

/// Low-latency guess from an interim transcript. Never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickGuess {
    pub word: &'static str,
    pub kind: IntentKind,
}

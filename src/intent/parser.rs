//! Full-parse rule cascade.
//!
//! Categories are evaluated in `CASCADE` order and the first rule that
//! matches wins. Transport-stage words ("play", "stop", "undo") therefore
//! beat any longer compound phrase that happens to contain them, which is
//! documented behaviour: "stop loop" stops the transport.

use serde::Serialize;
use tracing::debug;

use super::normalize::Utterance;
use super::types::*;
use crate::kernel::context::HoverContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleCategory {
    Transport,
    Navigation,
    Track,
    Mixer,
    PunchLoop,
}

/// Evaluation order of the cascade.
pub const CASCADE: [RuleCategory; 5] = [
    RuleCategory::Transport,
    RuleCategory::Navigation,
    RuleCategory::Track,
    RuleCategory::Mixer,
    RuleCategory::PunchLoop,
];

pub const EXPLICIT_TARGET_CONFIDENCE: f32 = 0.95;
pub const GLOBAL_TARGET_CONFIDENCE: f32 = 0.9;
pub const FALLBACK_TARGET_CONFIDENCE: f32 = 0.85;
pub const UNRESOLVED_TARGET_CONFIDENCE: f32 = 0.6;

/// What an extractor produced before confidence promotion.
struct Extracted {
    action: Action,
    source: Option<TargetSource>,
    confidence: Option<f32>,
    clarification: Option<String>,
}

impl Extracted {
    fn plain(action: Action) -> Self {
        Self { action, source: None, confidence: None, clarification: None }
    }
}

type Extractor = fn(&Utterance, &HoverContext) -> Option<Extracted>;

struct Rule {
    name: &'static str,
    category: RuleCategory,
    confidence: f32,
    extract: Extractor,
}

static RULES: &[Rule] = &[
    // Transport stage. Edit and project commands share it: they are the
    // other single-word, latency-sensitive commands.
    Rule { name: "stop", category: RuleCategory::Transport, confidence: 0.9, extract: transport_stop },
    Rule { name: "pause", category: RuleCategory::Transport, confidence: 0.9, extract: transport_pause },
    Rule { name: "record", category: RuleCategory::Transport, confidence: 0.9, extract: transport_record },
    Rule { name: "play", category: RuleCategory::Transport, confidence: 0.9, extract: transport_play },
    Rule { name: "undo", category: RuleCategory::Transport, confidence: 0.8, extract: edit_undo },
    Rule { name: "redo", category: RuleCategory::Transport, confidence: 0.8, extract: edit_redo },
    Rule { name: "save", category: RuleCategory::Transport, confidence: 0.9, extract: project_save },
    // Navigation
    Rule { name: "goto_bar", category: RuleCategory::Navigation, confidence: 0.9, extract: nav_goto_bar },
    Rule { name: "goto_start", category: RuleCategory::Navigation, confidence: 0.9, extract: nav_goto_start },
    Rule { name: "goto_end", category: RuleCategory::Navigation, confidence: 0.9, extract: nav_goto_end },
    Rule { name: "marker", category: RuleCategory::Navigation, confidence: 0.9, extract: nav_marker },
    // Track
    Rule { name: "track_state", category: RuleCategory::Track, confidence: EXPLICIT_TARGET_CONFIDENCE, extract: track_state },
    // Mixer
    Rule { name: "pan", category: RuleCategory::Mixer, confidence: EXPLICIT_TARGET_CONFIDENCE, extract: mixer_pan },
    Rule { name: "adjust_volume", category: RuleCategory::Mixer, confidence: EXPLICIT_TARGET_CONFIDENCE, extract: mixer_adjust_volume },
    Rule { name: "set_volume", category: RuleCategory::Mixer, confidence: EXPLICIT_TARGET_CONFIDENCE, extract: mixer_set_volume },
    // Punch / loop
    Rule { name: "set_loop", category: RuleCategory::PunchLoop, confidence: 0.9, extract: loop_range },
    Rule { name: "loop_toggle", category: RuleCategory::PunchLoop, confidence: 0.9, extract: loop_toggle },
    Rule { name: "set_punch", category: RuleCategory::PunchLoop, confidence: 0.9, extract: punch_range },
    Rule { name: "punch_point", category: RuleCategory::PunchLoop, confidence: 0.9, extract: punch_point },
];

/// Result of a full parse, with the rule that produced it.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub category: RuleCategory,
    pub rule: &'static str,
    pub intent: Intent,
}

/// Pure function: (utterance, ASR confidence, context) -> Intent.
pub fn parse(utterance: &Utterance, asr_confidence: f32, context: &HoverContext) -> Option<Intent> {
    parse_with_trace(utterance, asr_confidence, context).map(|o| o.intent)
}

pub fn parse_with_trace(
    utterance: &Utterance,
    asr_confidence: f32,
    context: &HoverContext,
) -> Option<ParseOutcome> {
    if utterance.is_empty() {
        return None;
    }

    for category in CASCADE {
        for rule in RULES.iter().filter(|r| r.category == category) {
            let Some(extracted) = (rule.extract)(utterance, context) else {
                continue;
            };

            // Promotion: never below what the recogniser reported.
            let rule_confidence = extracted.confidence.unwrap_or(rule.confidence);
            let confidence = rule_confidence.max(asr_confidence.clamp(0.0, 1.0));

            let intent = Intent::new(
                extracted.action,
                extracted.source,
                confidence,
                extracted.clarification,
                utterance.text(),
            );
            debug!(
                "Parsed '{}' -> {:?}/{} (rule {:.2}, final {:.2})",
                utterance.text(),
                category,
                rule.name,
                rule_confidence,
                confidence
            );
            return Some(ParseOutcome { category, rule: rule.name, intent });
        }
    }

    debug!("No rule matched '{}'", utterance.text());
    None
}

// --- Transport stage ---

fn transport_stop(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    u.has_any(&["stop", "halt"]).then(|| Extracted::plain(Action::Transport(TransportAction::Stop)))
}

fn transport_pause(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    u.has_word("pause").then(|| Extracted::plain(Action::Transport(TransportAction::Pause)))
}

fn transport_record(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    (u.has_word("record") || u.has_phrase("start recording"))
        .then(|| Extracted::plain(Action::Transport(TransportAction::Record)))
}

fn transport_play(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    (u.has_word("play") || u.has_phrase("start playback") || u.has_phrase("resume playback"))
        .then(|| Extracted::plain(Action::Transport(TransportAction::Play)))
}

fn edit_undo(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    u.has_word("undo").then(|| Extracted::plain(Action::Edit(EditAction::Undo)))
}

fn edit_redo(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    u.has_word("redo").then(|| Extracted::plain(Action::Edit(EditAction::Redo)))
}

fn project_save(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    u.has_word("save").then(|| Extracted::plain(Action::Project(ProjectAction::Save)))
}

// --- Navigation ---

const MOTION_WORDS: [&str; 7] = ["go", "goto", "jump", "move", "skip", "return", "back"];

fn as_bar(n: f32) -> Option<u32> {
    (n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f32).then_some(n as u32)
}

fn nav_goto_bar(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    let leading_bar = matches!(u.tokens().first().map(String::as_str), Some("bar" | "measure"));
    if !(u.has_any(&MOTION_WORDS) || leading_bar) {
        return None;
    }
    let bar = as_bar(u.number_after(&["bar", "measure"])?)?;
    Some(Extracted::plain(Action::Navigation(NavigationAction::GotoBar(bar))))
}

fn nav_goto_start(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    let to_start = u.has_any(&MOTION_WORDS) && u.has_any(&["start", "beginning", "top"]);
    (to_start || u.has_word("rewind"))
        .then(|| Extracted::plain(Action::Navigation(NavigationAction::GotoStart)))
}

fn nav_goto_end(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    (u.has_any(&MOTION_WORDS) && u.has_word("end"))
        .then(|| Extracted::plain(Action::Navigation(NavigationAction::GotoEnd)))
}

fn nav_marker(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    if !u.has_word("marker") {
        return None;
    }
    let action = if u.has_word("next") {
        NavigationAction::NextMarker
    } else if u.has_any(&["previous", "prev", "last"]) {
        NavigationAction::PreviousMarker
    } else {
        return None;
    };
    Some(Extracted::plain(Action::Navigation(action)))
}

// --- Target resolution (track + mixer) ---

struct Resolution {
    target: Option<Target>,
    source: TargetSource,
    confidence: f32,
}

/// Precedence, first match wins:
/// "all tracks", explicit number, "this" (hover), "that" (recent history),
/// "selected"/"current", implicit hover target, otherwise unresolved.
fn resolve_target(u: &Utterance, context: &HoverContext, verbs: &[&str]) -> Resolution {
    let resolved = |target, source, confidence| Resolution { target: Some(target), source, confidence };
    let unresolved = Resolution { target: None, source: TargetSource::Unresolved, confidence: UNRESOLVED_TARGET_CONFIDENCE };

    if u.has_phrase("all tracks") || u.has_phrase("every track") || u.has_phrase("all channels") {
        return resolved(Target::All, TargetSource::Global, GLOBAL_TARGET_CONFIDENCE);
    }

    let mut anchors = vec!["track", "channel", "number"];
    anchors.extend_from_slice(verbs);
    if let Some(n) = u.number_after(&anchors) {
        // A spoken number that is not a track index stays explicit; track 0
        // never exists, so dispatch rejects it instead of guessing from context.
        let track = as_bar(n).unwrap_or(0);
        return resolved(Target::Track(track), TargetSource::Explicit, EXPLICIT_TARGET_CONFIDENCE);
    }

    if u.has_word("this") {
        return match context.active_target_id {
            Some(id) => resolved(Target::Track(id), TargetSource::Hover, FALLBACK_TARGET_CONFIDENCE),
            None => unresolved,
        };
    }

    if u.has_word("that") {
        return match context.most_recent() {
            Some(id) => resolved(Target::Track(id), TargetSource::Recent, FALLBACK_TARGET_CONFIDENCE),
            None => unresolved,
        };
    }

    if u.has_any(&["selected", "current"]) {
        return match context.selected_target_id {
            Some(id) => resolved(Target::Track(id), TargetSource::Selection, FALLBACK_TARGET_CONFIDENCE),
            None => unresolved,
        };
    }

    match context.active_target_id {
        Some(id) => resolved(Target::Track(id), TargetSource::Hover, FALLBACK_TARGET_CONFIDENCE),
        None => unresolved,
    }
}

// --- Track ---

const TRACK_VERBS: [(&str, TrackAction); 9] = [
    ("unmute", TrackAction::Unmute),
    ("mute", TrackAction::Mute),
    ("unsolo", TrackAction::Unsolo),
    ("solo", TrackAction::Solo),
    ("disarm", TrackAction::Disarm),
    ("unarm", TrackAction::Disarm),
    ("arm", TrackAction::Arm),
    ("select", TrackAction::Select),
    ("silence", TrackAction::Mute),
];

fn track_state(u: &Utterance, context: &HoverContext) -> Option<Extracted> {
    let (verb, action) = TRACK_VERBS.iter().find(|(verb, _)| u.has_word(verb))?;
    let resolution = resolve_target(u, context, &[*verb]);
    let clarification = resolution
        .target
        .is_none()
        .then(|| format!("Which track would you like to {}?", action.verb()));

    Some(Extracted {
        action: Action::Track { action: *action, target: resolution.target },
        source: Some(resolution.source),
        confidence: Some(resolution.confidence),
        clarification,
    })
}

// --- Mixer ---

fn mixer(action: MixerAction, u: &Utterance, context: &HoverContext, verbs: &[&str]) -> Extracted {
    let resolution = resolve_target(u, context, verbs);
    let clarification = resolution
        .target
        .is_none()
        .then(|| "Which track would you like to adjust?".to_string());
    Extracted {
        action: Action::Mixer { action, target: resolution.target },
        source: Some(resolution.source),
        confidence: Some(resolution.confidence),
        clarification,
    }
}

fn mixer_pan(u: &Utterance, context: &HoverContext) -> Option<Extracted> {
    if !u.has_word("pan") {
        return None;
    }
    let pan = if u.has_any(&["center", "centre", "middle"]) {
        0.0
    } else if u.has_word("left") {
        -u.number_after(&["left"]).unwrap_or(100.0)
    } else if u.has_word("right") {
        u.number_after(&["right"]).unwrap_or(100.0)
    } else {
        return None;
    };
    Some(mixer(MixerAction::SetPan(pan_position(pan)), u, context, &[]))
}

/// Out-of-range amounts stay out of range for dispatch to reject, but are
/// bounded so the integer conversion cannot wrap.
const PAN_SPOKEN_LIMIT: f32 = 1_000.0;

fn pan_position(amount: f32) -> i32 {
    amount.clamp(-PAN_SPOKEN_LIMIT, PAN_SPOKEN_LIMIT).round() as i32
}

const DEFAULT_VOLUME_STEP_DB: f32 = 3.0;

fn mixer_adjust_volume(u: &Utterance, context: &HoverContext) -> Option<Extracted> {
    let louder = u.has_any(&["louder", "raise"]);
    let quieter = u.has_any(&["quieter", "softer", "lower"]);
    let volume_word = u.has_any(&["volume", "level", "gain"]);
    let turn = u.has_any(&["turn", "bring"]);
    let volume_control = matches!(
        context.active_control_kind,
        None | Some(crate::kernel::context::ControlKind::Volume) | Some(crate::kernel::context::ControlKind::Track)
    );

    let up = louder || ((volume_word || (turn && volume_control)) && u.has_word("up"));
    let down = quieter || ((volume_word || (turn && volume_control)) && u.has_word("down"));
    if up == down {
        return None;
    }

    let step = u
        .number_after(&["by"])
        .or_else(|| u.number_after(&["up", "down"]))
        .map(f32::abs)
        .unwrap_or(DEFAULT_VOLUME_STEP_DB);
    let delta = if up { step } else { -step };
    Some(mixer(MixerAction::AdjustVolume(delta), u, context, &[]))
}

fn mixer_set_volume(u: &Utterance, context: &HoverContext) -> Option<Extracted> {
    if !u.has_any(&["volume", "level", "gain", "fader"]) {
        return None;
    }
    let db = u.number_after(&["to", "at"]).or_else(|| u.number_after(&["volume", "level", "gain", "fader"]))?;
    Some(mixer(MixerAction::SetVolume(db), u, context, &[]))
}

// --- Punch / loop ---

fn bar_range(u: &Utterance) -> Option<BarRange> {
    match u.numbers().as_slice() {
        [a, b, ..] => Some(BarRange { start: as_bar(*a)?, end: as_bar(*b)? }),
        _ => None,
    }
}

fn loop_range(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    if !u.has_any(&["loop", "cycle"]) {
        return None;
    }
    let range = bar_range(u)?;
    Some(Extracted::plain(Action::PunchLoop(PunchLoopAction::SetLoop(range))))
}

fn loop_toggle(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    if !u.has_any(&["loop", "looping", "cycle"]) {
        return None;
    }
    let action = if u.has_any(&["off", "disable", "disabled"]) {
        PunchLoopAction::LoopOff
    } else if u.has_any(&["on", "enable", "enabled"]) {
        PunchLoopAction::LoopOn
    } else {
        return None;
    };
    Some(Extracted::plain(Action::PunchLoop(action)))
}

fn punch_range(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    if !u.has_word("punch") {
        return None;
    }
    let range = bar_range(u)?;
    Some(Extracted::plain(Action::PunchLoop(PunchLoopAction::SetPunch(range))))
}

fn punch_point(u: &Utterance, _: &HoverContext) -> Option<Extracted> {
    let bar = || u.number_after(&["bar", "measure", "at"]).and_then(as_bar);
    if u.has_phrase("punch in") {
        return Some(Extracted::plain(Action::PunchLoop(PunchLoopAction::PunchIn(bar()?))));
    }
    if u.has_phrase("punch out") {
        return Some(Extracted::plain(Action::PunchLoop(PunchLoopAction::PunchOut(bar()?))));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(text: &str) -> Option<ParseOutcome> {
        parse_with_trace(&Utterance::new(text), 0.5, &HoverContext::default())
    }

    #[test]
    fn every_rule_belongs_to_a_cascade_stage() {
        for rule in RULES {
            assert!(CASCADE.contains(&rule.category), "{} has no stage", rule.name);
        }
    }

    #[test]
    fn transport_word_beats_compound_phrase() {
        let o = outcome("stop the loop").unwrap();
        assert_eq!(o.category, RuleCategory::Transport);
        assert_eq!(o.intent.action_name(), "stop");
    }

    #[test]
    fn empty_utterance_has_no_intent() {
        assert!(outcome("").is_none());
        assert!(outcome("hmm well").is_none());
    }

    #[test]
    fn reversed_bar_numbers_are_kept_for_dispatch_validation() {
        let o = outcome("loop bars 8 to 4").unwrap();
        assert_eq!(
            o.intent.action(),
            &Action::PunchLoop(PunchLoopAction::SetLoop(BarRange { start: 8, end: 4 }))
        );
    }

    #[test]
    fn unusable_track_number_never_falls_back_to_hover() {
        let hovered = HoverContext::with_active(5);
        for text in ["mute track 2.5", "mute track minus 2", "mute track 0"] {
            let intent = parse(&Utterance::new(text), 0.5, &hovered).unwrap();
            assert_eq!(intent.target(), Some(Target::Track(0)), "{}", text);
            assert_eq!(intent.target_source(), Some(TargetSource::Explicit), "{}", text);
        }
    }

    #[test]
    fn huge_pan_amounts_stay_bounded_and_out_of_range() {
        let left = outcome("pan track 2 left minus 3000000000").unwrap();
        assert_eq!(left.intent.action(), &Action::Mixer { action: MixerAction::SetPan(1_000), target: Some(Target::Track(2)) });

        let right = outcome("pan track 2 right 500").unwrap();
        assert_eq!(right.intent.action(), &Action::Mixer { action: MixerAction::SetPan(500), target: Some(Target::Track(2)) });
    }
}

use voxdaw::intent::normalize::Utterance;
use voxdaw::intent::parser::{parse, parse_with_trace, RuleCategory};
use voxdaw::intent::quick::quick_guess;
use voxdaw::intent::types::*;
use voxdaw::kernel::context::{ContextTracker, HoverContext};

fn parse_text(text: &str, confidence: f32, context: &HoverContext) -> Intent {
    parse(&Utterance::new(text), confidence, context).unwrap_or_else(|| panic!("'{}' did not parse", text))
}

fn category(text: &str) -> RuleCategory {
    parse_with_trace(&Utterance::new(text), 0.5, &HoverContext::default())
        .unwrap_or_else(|| panic!("'{}' did not parse", text))
        .category
}

#[test]
fn test_explicit_track_number() {
    let intent = parse_text("mute track 3", 0.5, &HoverContext::default());
    assert_eq!(intent.kind(), IntentKind::Track);
    assert_eq!(intent.action(), &Action::Track { action: TrackAction::Mute, target: Some(Target::Track(3)) });
    assert_eq!(intent.target_source(), Some(TargetSource::Explicit));
    assert!((intent.confidence() - 0.95).abs() < 1e-6);
    assert!(!intent.needs_clarification());
}

#[test]
fn test_hover_fallback_has_lower_confidence() {
    let intent = parse_text("mute", 0.5, &HoverContext::with_active(5));
    assert_eq!(intent.target(), Some(Target::Track(5)));
    assert_eq!(intent.target_source(), Some(TargetSource::Hover));
    assert!((intent.confidence() - 0.85).abs() < 1e-6);
}

#[test]
fn test_goto_bar() {
    let intent = parse_text("go to bar 12", 0.5, &HoverContext::default());
    assert_eq!(intent.kind(), IntentKind::Navigation);
    assert_eq!(intent.action_name(), "goto_bar");
    assert_eq!(intent.action(), &Action::Navigation(NavigationAction::GotoBar(12)));

    let words = parse_text("jump to bar twenty-one", 0.5, &HoverContext::default());
    assert_eq!(words.action(), &Action::Navigation(NavigationAction::GotoBar(21)));
    let spaced = parse_text("go to bar twenty one", 0.5, &HoverContext::default());
    assert_eq!(spaced.action(), &Action::Navigation(NavigationAction::GotoBar(21)));
}

#[test]
fn test_cascade_order_is_fixed() {
    assert_eq!(category("stop the loop"), RuleCategory::Transport);
    assert_eq!(category("play from bar 5"), RuleCategory::Transport);
    assert_eq!(category("go to bar 5"), RuleCategory::Navigation);
    assert_eq!(category("solo track 2"), RuleCategory::Track);
    assert_eq!(category("pan track 2 left"), RuleCategory::Mixer);
    assert_eq!(category("loop bars 4 to 8"), RuleCategory::PunchLoop);

    // Same input, same winner.
    for _ in 0..10 {
        assert_eq!(category("stop the loop"), RuleCategory::Transport);
    }
}

#[test]
fn test_target_precedence() {
    let context = HoverContext {
        active_target_id: Some(4),
        active_control_kind: None,
        recent_targets: vec![7, 2],
        selected_target_id: Some(9),
    };

    let explicit = parse_text("solo track 11", 0.5, &context);
    assert_eq!(explicit.target(), Some(Target::Track(11)));

    let this = parse_text("solo this", 0.5, &context);
    assert_eq!(this.target(), Some(Target::Track(4)));
    assert_eq!(this.target_source(), Some(TargetSource::Hover));

    let that = parse_text("unmute that", 0.5, &context);
    assert_eq!(that.target(), Some(Target::Track(7)));
    assert_eq!(that.target_source(), Some(TargetSource::Recent));

    let selected = parse_text("arm the selected track", 0.5, &context);
    assert_eq!(selected.target(), Some(Target::Track(9)));
    assert_eq!(selected.target_source(), Some(TargetSource::Selection));
}

#[test]
fn test_all_tracks_beats_hover() {
    let intent = parse_text("mute all tracks", 0.5, &HoverContext::with_active(5));
    assert_eq!(intent.target(), Some(Target::All));
    assert_eq!(intent.target_source(), Some(TargetSource::Global));
}

#[test]
fn test_missing_target_asks_which_track() {
    let intent = parse_text("mute", 0.9, &HoverContext::default());
    assert!(intent.needs_clarification());
    assert_eq!(intent.target(), None);
    assert_eq!(intent.clarification_prompt(), Some("Which track would you like to mute?"));

    // "this" with nothing under the pointer cannot resolve either.
    let this = parse_text("solo this", 0.9, &HoverContext::default());
    assert!(this.needs_clarification());
}

#[test]
fn test_confidence_is_promoted_never_lowered() {
    let high = parse_text("play", 0.99, &HoverContext::default());
    assert!((high.confidence() - 0.99).abs() < 1e-6);
    let low = parse_text("play", 0.1, &HoverContext::default());
    assert!((low.confidence() - 0.9).abs() < 1e-6);
}

#[test]
fn test_mixer_phrases() {
    let none = HoverContext::default();

    let set = parse_text("set volume on track 2 to minus 6", 0.5, &none);
    assert_eq!(
        set.action(),
        &Action::Mixer { action: MixerAction::SetVolume(-6.0), target: Some(Target::Track(2)) }
    );

    let nudge = parse_text("turn track 4 up by 2", 0.5, &none);
    assert_eq!(
        nudge.action(),
        &Action::Mixer { action: MixerAction::AdjustVolume(2.0), target: Some(Target::Track(4)) }
    );

    let pan = parse_text("pan track 1 left 30", 0.5, &none);
    assert_eq!(pan.action(), &Action::Mixer { action: MixerAction::SetPan(-30), target: Some(Target::Track(1)) });

    let center = parse_text("pan center", 0.5, &HoverContext::with_active(3));
    assert_eq!(center.action(), &Action::Mixer { action: MixerAction::SetPan(0), target: Some(Target::Track(3)) });
}

#[test]
fn test_punch_and_loop_phrases() {
    let none = HoverContext::default();
    assert_eq!(
        parse_text("loop bars 4 to 8", 0.5, &none).action(),
        &Action::PunchLoop(PunchLoopAction::SetLoop(BarRange { start: 4, end: 8 }))
    );
    assert_eq!(parse_text("loop on", 0.5, &none).action(), &Action::PunchLoop(PunchLoopAction::LoopOn));
    assert_eq!(
        parse_text("punch in at bar 9", 0.5, &none).action(),
        &Action::PunchLoop(PunchLoopAction::PunchIn(9))
    );
    assert_eq!(
        parse_text("next marker", 0.5, &none).action(),
        &Action::Navigation(NavigationAction::NextMarker)
    );
    assert_eq!(parse_text("rewind", 0.5, &none).action(), &Action::Navigation(NavigationAction::GotoStart));
}

#[test]
fn test_quick_guess_is_preview_only_vocabulary() {
    for word in ["play", "stop", "record", "undo", "redo", "save", "pause"] {
        assert_eq!(quick_guess(word).map(|g| g.word), Some(word));
    }
    assert!(quick_guess("mute").is_none());
    assert!(quick_guess("play track").is_none());
}

#[test]
fn test_context_tracker_keeps_latest_update() {
    let mut tracker = ContextTracker::new();
    tracker.update(HoverContext::with_active(1));
    tracker.update(HoverContext::with_active(2));
    assert_eq!(tracker.snapshot().active_target_id, Some(2));
    assert_eq!(tracker.update_count(), 2);

    let intent = parse_text("mute", 0.5, tracker.snapshot());
    assert_eq!(intent.target(), Some(Target::Track(2)));
}

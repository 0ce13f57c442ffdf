use voxdaw::error::{DispatchError, ExecutorError, PipelineErrorKind};
use voxdaw::intent::normalize::Utterance;
use voxdaw::intent::parser::parse;
use voxdaw::kernel::context::HoverContext;
use voxdaw::kernel::dispatch::{self, Dispatcher};
use voxdaw::services::executor::{BarSpan, ExecutorCommand, RecordingExecutor, TrackRef};

fn prepare(text: &str) -> Result<ExecutorCommand, DispatchError> {
    let intent = parse(&Utterance::new(text), 0.9, &HoverContext::default()).unwrap();
    Dispatcher::new(64, 500).prepare(&intent)
}

#[test]
fn test_intents_map_to_executor_vocabulary() {
    assert_eq!(prepare("play").unwrap(), ExecutorCommand::Transport { action: "start" });
    assert_eq!(prepare("go to bar 12").unwrap(), ExecutorCommand::Navigation { action: "locate", bar: Some(12) });
    assert_eq!(
        prepare("unsolo track 4").unwrap(),
        ExecutorCommand::Track { action: "solo_off", target: TrackRef::Index(4) }
    );
    assert_eq!(
        prepare("volume down by 2 on track 1").unwrap(),
        ExecutorCommand::Mixer { action: "volume_nudge", target: TrackRef::Index(1), value: -2.0 }
    );
    assert_eq!(
        prepare("punch bars 3 to 7").unwrap(),
        ExecutorCommand::PunchLoop { action: "punch_range", span: Some(BarSpan::Range(3, 7)) }
    );
}

#[test]
fn test_preconditions_fail_before_any_call() {
    assert_eq!(prepare("mute track 65"), Err(DispatchError::InvalidTrackNumber(65)));
    assert_eq!(prepare("go to bar 501"), Err(DispatchError::InvalidBar(501)));
    assert!(matches!(prepare("set volume on track 2 to 40"), Err(DispatchError::InvalidParameter(_))));
    assert_eq!(prepare("mute"), Err(DispatchError::MissingTarget));
    assert_eq!(DispatchError::MissingTarget.kind(), PipelineErrorKind::InvalidTarget);
}

#[tokio::test]
async fn test_execute_issues_exactly_one_call() {
    let executor = RecordingExecutor::new();
    let command = prepare("loop bars 1 to 4").unwrap();
    let result = dispatch::execute(&executor, &command).await;
    assert!(result.success);
    assert_eq!(executor.calls(), vec!["punch_loop(loop_range, Some(Range(1, 4)))".to_string()]);
}

#[tokio::test]
async fn test_executor_errors_become_failed_results() {
    let executor = RecordingExecutor::failing(ExecutorError::Rejected("read-only project".into()));
    let result = dispatch::execute(&executor, &ExecutorCommand::Project { action: "save" }).await;
    assert!(!result.success);
    assert!(result.detail.contains("read-only project"));
    assert_eq!(executor.calls().len(), 1);
}

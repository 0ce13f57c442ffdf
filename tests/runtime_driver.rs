use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use voxdaw::config::{PipelineConfig, Timeouts};
use voxdaw::error::{ExecutorError, RuntimeError};
use voxdaw::kernel::state::PipelineState;
use voxdaw::kernel::telemetry::LogEventKind;
use voxdaw::outputs::speech::RecordingSpeech;
use voxdaw::runtime::PipelineRuntime;
use voxdaw::services::executor::{ActionExecutor, BarSpan, ExecutionResult, RecordingExecutor, TrackRef};

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        cancel_window_ms: 40,
        timeouts: Timeouts {
            listening_ms: 2_000,
            transcribing_ms: 500,
            parsing_ms: 500,
            confirming_ms: 300,
            executing_ms: 100,
            speaking_ms: 1_000,
            error_recovery_ms: 150,
            feedback_return_ms: 60,
        },
        ..PipelineConfig::default()
    }
}

async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test]
async fn test_typed_command_reaches_executor_and_speaks() {
    let executor = Arc::new(RecordingExecutor::new());
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(fast_config(), executor.clone(), speech.clone());

    handle.typed("mute track 3").await.unwrap();
    settle(150).await;

    assert_eq!(executor.calls(), vec!["track(mute_on, Index(3))".to_string()]);
    assert_eq!(speech.spoken(), vec!["Track 3 muted.".to_string()]);

    let metrics = handle.metrics().await.unwrap();
    assert_eq!(metrics.command_count, 1);
    assert_eq!(metrics.success_count, 1);
    assert!(metrics.rolling_average_latency_ms.is_some());

    // Speaking returns to listening after the feedback delay.
    settle(100).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Listening);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_cancel_inside_window_never_dispatches() {
    let executor = Arc::new(RecordingExecutor::new());
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(fast_config(), executor.clone(), speech.clone());

    handle.typed("play").await.unwrap();
    handle.cancel().await.unwrap();
    settle(120).await;

    assert!(executor.calls().is_empty());
    assert_eq!(speech.spoken(), vec!["Cancelled.".to_string()]);
    assert_eq!(handle.state().await.unwrap(), PipelineState::Idle);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_confirmation_round_trip() {
    let executor = Arc::new(RecordingExecutor::new());
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(fast_config(), executor.clone(), speech.clone());

    handle.speech_start().await.unwrap();
    handle.speech_end().await.unwrap();
    handle.transcript("undo", 0.5, true).await.unwrap();
    settle(20).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Confirming);

    handle.transcript("yes", 0.9, true).await.unwrap();
    settle(60).await;

    assert_eq!(executor.calls(), vec!["edit(undo)".to_string()]);
    assert_eq!(speech.spoken(), vec!["Undo?".to_string(), "Undone.".to_string()]);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_executor_error_recovers_to_idle() {
    let executor = Arc::new(RecordingExecutor::failing(ExecutorError::Unavailable("offline".into())));
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(fast_config(), executor.clone(), speech.clone());

    handle.typed("save").await.unwrap();
    settle(80).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Error);
    assert_eq!(speech.spoken(), vec!["Sorry, that didn't work.".to_string()]);

    settle(200).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Idle);
    assert_eq!(handle.metrics().await.unwrap().error_count, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

/// Never answers within the execution budget.
struct StalledExecutor;

#[async_trait]
impl ActionExecutor for StalledExecutor {
    async fn transport(&self, action: &str) -> Result<ExecutionResult, ExecutorError> {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok(ExecutionResult::ok(action))
    }
    async fn edit(&self, action: &str) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
    async fn project(&self, action: &str) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
    async fn navigation(&self, action: &str, _bar: Option<u32>) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
    async fn track(&self, action: &str, _target: TrackRef) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
    async fn mixer(&self, action: &str, _target: TrackRef, _value: f32) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
    async fn punch_loop(&self, action: &str, _span: Option<BarSpan>) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult::ok(action))
    }
}

#[tokio::test]
async fn test_slow_executor_times_out_and_late_result_is_dropped() {
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(fast_config(), Arc::new(StalledExecutor), speech.clone());

    handle.typed("play").await.unwrap();
    settle(200).await;
    assert_eq!(speech.spoken(), vec!["Sorry, that took too long.".to_string()]);

    // The stalled call completes after the machine has moved on.
    settle(400).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Idle);
    assert_eq!(handle.metrics().await.unwrap().success_count, 0);
    assert_eq!(speech.spoken().len(), 1);

    let log = handle.log().await.unwrap();
    assert!(log.iter().any(|e| e.event == LogEventKind::Ignored));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_interim_previews_reach_the_sink() {
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) =
        PipelineRuntime::spawn(fast_config(), Arc::new(RecordingExecutor::new()), speech.clone());

    handle.speech_start().await.unwrap();
    handle.transcript("stop", 0.6, false).await.unwrap();
    handle.transcript("stop", 0.7, false).await.unwrap();
    settle(20).await;

    let previews = speech.previews();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].word, "stop");

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_barge_in_stops_the_speech_sink() {
    let mut config = fast_config();
    config.timeouts.feedback_return_ms = 1_000;
    let speech = Arc::new(RecordingSpeech::new());
    let (handle, task) = PipelineRuntime::spawn(config, Arc::new(RecordingExecutor::new()), speech.clone());

    handle.typed("mute track 3").await.unwrap();
    settle(120).await;
    assert_eq!(handle.state().await.unwrap(), PipelineState::Speaking);
    assert_eq!(speech.stops(), 0);

    handle.speech_start().await.unwrap();
    settle(20).await;
    assert_eq!(speech.stops(), 1);
    assert_eq!(handle.state().await.unwrap(), PipelineState::Listening);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_handle_reports_closed_after_shutdown() {
    let (handle, task) = PipelineRuntime::spawn(
        fast_config(),
        Arc::new(RecordingExecutor::new()),
        Arc::new(RecordingSpeech::new()),
    );
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(matches!(handle.typed("play").await, Err(RuntimeError::Closed)));
    assert!(matches!(handle.metrics().await, Err(RuntimeError::Closed)));
}

//! Async driver around the pure `PipelineMachine`.
//!
//! One task owns the machine. Every inbound signal (speech events, context
//! updates, timer firings, dispatch completions, diagnostics queries) goes
//! through a single channel, so events are applied strictly one at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::RuntimeError;
use crate::kernel::context::HoverContext;
use crate::kernel::dispatch;
use crate::kernel::event::{DispatchTicket, PipelineEvent, SideEffect, TimerId};
use crate::kernel::machine::PipelineMachine;
use crate::kernel::state::PipelineState;
use crate::kernel::telemetry::{LogEntry, MetricsSnapshot};
use crate::kernel::time::SessionClock;
use crate::outputs::speech::SpeechSink;
use crate::services::executor::{ActionExecutor, ExecutorCommand};

const CHANNEL_CAPACITY: usize = 128;

#[derive(Debug)]
pub enum RuntimeMessage {
    Event(PipelineEvent),
    State(oneshot::Sender<PipelineState>),
    Metrics(oneshot::Sender<MetricsSnapshot>),
    Log(oneshot::Sender<Vec<LogEntry>>),
    Shutdown,
}

/// Cloneable front door to a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<RuntimeMessage>,
}

impl PipelineHandle {
    pub async fn send(&self, event: PipelineEvent) -> Result<(), RuntimeError> {
        self.tx
            .send(RuntimeMessage::Event(event))
            .await
            .map_err(|_| RuntimeError::Closed)
    }

    pub async fn speech_start(&self) -> Result<(), RuntimeError> {
        self.send(PipelineEvent::SpeechStart).await
    }

    pub async fn speech_end(&self) -> Result<(), RuntimeError> {
        self.send(PipelineEvent::SpeechEnd).await
    }

    pub async fn transcript(&self, text: &str, confidence: f32, is_final: bool) -> Result<(), RuntimeError> {
        let event = if is_final {
            PipelineEvent::final_transcript(text, confidence)
        } else {
            PipelineEvent::interim_transcript(text, confidence)
        };
        self.send(event).await
    }

    pub async fn typed(&self, text: &str) -> Result<(), RuntimeError> {
        self.send(PipelineEvent::typed(text)).await
    }

    pub async fn cancel(&self) -> Result<(), RuntimeError> {
        self.send(PipelineEvent::Cancel).await
    }

    pub async fn update_context(&self, context: HoverContext) -> Result<(), RuntimeError> {
        self.send(PipelineEvent::ContextUpdated(context)).await
    }

    pub async fn state(&self) -> Result<PipelineState, RuntimeError> {
        self.query(RuntimeMessage::State).await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, RuntimeError> {
        self.query(RuntimeMessage::Metrics).await
    }

    pub async fn log(&self) -> Result<Vec<LogEntry>, RuntimeError> {
        self.query(RuntimeMessage::Log).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.tx.send(RuntimeMessage::Shutdown).await.map_err(|_| RuntimeError::Closed)
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RuntimeMessage) -> Result<T, RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await.map_err(|_| RuntimeError::Closed)?;
        reply_rx.await.map_err(|_| RuntimeError::Closed)
    }
}

struct ArmedTimer {
    id: TimerId,
    token: CancellationToken,
}

pub struct PipelineRuntime {
    machine: PipelineMachine,
    clock: SessionClock,
    rx: mpsc::Receiver<RuntimeMessage>,
    // Weak so that dropping every handle stops the loop.
    loopback: mpsc::WeakSender<RuntimeMessage>,
    executor: Arc<dyn ActionExecutor>,
    speech: Arc<dyn SpeechSink>,
    timer: Option<ArmedTimer>,
    shutdown: CancellationToken,
}

impl PipelineRuntime {
    /// Starts the actor on the current tokio runtime.
    pub fn spawn(
        config: PipelineConfig,
        executor: Arc<dyn ActionExecutor>,
        speech: Arc<dyn SpeechSink>,
    ) -> (PipelineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let runtime = PipelineRuntime {
            machine: PipelineMachine::new(config),
            clock: SessionClock::start(),
            rx,
            loopback: tx.downgrade(),
            executor,
            speech,
            timer: None,
            shutdown: CancellationToken::new(),
        };
        let task = tokio::spawn(runtime.run());
        (PipelineHandle { tx }, task)
    }

    async fn run(mut self) {
        info!("Pipeline started");

        while let Some(message) = self.rx.recv().await {
            match message {
                RuntimeMessage::Event(event) => {
                    let now = self.clock.now();
                    let effects = self.machine.apply(event, now);
                    for effect in effects {
                        self.perform(effect);
                    }
                }
                RuntimeMessage::State(reply) => {
                    let _ = reply.send(self.machine.state());
                }
                RuntimeMessage::Metrics(reply) => {
                    let _ = reply.send(self.machine.metrics());
                }
                RuntimeMessage::Log(reply) => {
                    let _ = reply.send(self.machine.log_entries());
                }
                RuntimeMessage::Shutdown => break,
            }
        }

        // Stops the armed timer and any sleeping task.
        self.shutdown.cancel();
        info!("Pipeline stopped");
    }

    fn perform(&mut self, effect: SideEffect) {
        match effect {
            SideEffect::Speak(text) => {
                let speech = self.speech.clone();
                tokio::spawn(async move {
                    if let Err(e) = speech.speak(&text).await {
                        warn!("Speech failed: {}", e);
                    }
                });
            }
            SideEffect::StopSpeaking => self.speech.stop(),
            SideEffect::Preview(guess) => self.speech.preview(&guess),
            SideEffect::Dispatch { ticket, command } => self.spawn_dispatch(ticket, command),
            SideEffect::ScheduleTimer { id, after } => self.arm_timer(id, after),
            SideEffect::CancelTimer(id) => {
                if self.timer.as_ref().is_some_and(|t| t.id == id) {
                    if let Some(armed) = self.timer.take() {
                        armed.token.cancel();
                    }
                }
            }
        }
    }

    fn spawn_dispatch(&self, ticket: DispatchTicket, command: ExecutorCommand) {
        let executor = self.executor.clone();
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            let result = dispatch::execute(executor.as_ref(), &command).await;
            // The machine may have timed out and moved on; it drops stale tickets.
            if let Some(tx) = loopback.upgrade() {
                let _ = tx
                    .send(RuntimeMessage::Event(PipelineEvent::DispatchCompleted { ticket, result }))
                    .await;
            }
        });
    }

    fn arm_timer(&mut self, id: TimerId, after: Duration) {
        if let Some(previous) = self.timer.take() {
            previous.token.cancel();
        }
        let token = self.shutdown.child_token();
        let cancelled = token.clone();
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    debug!("Timer fired: {:?}", id);
                    if let Some(tx) = loopback.upgrade() {
                        let _ = tx.send(RuntimeMessage::Event(PipelineEvent::TimerFired(id))).await;
                    }
                }
            }
        });
        self.timer = Some(ArmedTimer { id, token });
    }
}

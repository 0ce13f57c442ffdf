//! The pipeline state machine.
//!
//! **KERNEL LAW**: `apply` is pure with respect to I/O. It never awaits and
//! returns every external action as a `SideEffect`. Events are applied one at
//! a time, each to completion.
//!
//! Timing decisions use the `now` passed with each event. The one reading of
//! a monotonic clock is the parse budget in `resolve`: parsing runs inside
//! `apply`, so only its own duration can show it overran `timeouts.parsing`.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cancel::CancelWindowCoordinator;
use super::confirm::{ConfirmationCoordinator, Gate, Reply, CANCELLED, LOW_CONFIDENCE_PROMPT, REPEAT_PROMPT};
use super::context::{ContextTracker, HoverContext};
use super::dispatch::Dispatcher;
use super::event::{DispatchTicket, PipelineEvent, SideEffect, TimerId, Transcript};
use super::state::{PipelineState, TimerKind};
use super::telemetry::{EventLog, LogEntry, LogEventKind, Metrics, MetricsSnapshot};
use super::time::Timestamp;
use crate::config::PipelineConfig;
use crate::error::PipelineErrorKind;
use crate::intent::normalize::Utterance;
use crate::intent::parser::parse_with_trace;
use crate::intent::quick::quick_guess;
use crate::intent::types::{Intent, QuickGuess};
use crate::services::executor::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveTimer {
    id: TimerId,
    after: Duration,
}

pub struct PipelineMachine {
    config: PipelineConfig,
    state: PipelineState,

    // Single timer slot. Replacing it cancels the previous one.
    timer: Option<ActiveTimer>,
    timer_seq: u64,

    transcript: Option<Transcript>,
    current_intent: Option<Intent>,
    // Single pending-execution slot shared by the confirmation gate, the
    // cancel window and the in-flight dispatch.
    pending: Option<Intent>,
    ticket: Option<DispatchTicket>,
    ticket_seq: u64,
    utterance_at: Option<Timestamp>,
    last_preview: Option<QuickGuess>,

    context: ContextTracker,
    confirmation: ConfirmationCoordinator,
    cancel_window: CancelWindowCoordinator,
    dispatcher: Dispatcher,
    metrics: Metrics,
    log: EventLog,
}

impl PipelineMachine {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            confirmation: ConfirmationCoordinator::new(config.confirmation_threshold),
            cancel_window: CancelWindowCoordinator::new(config.enable_cancel_window, config.cancel_window()),
            dispatcher: Dispatcher::from_config(&config),
            config,
            state: PipelineState::Idle,
            timer: None,
            timer_seq: 0,
            transcript: None,
            current_intent: None,
            pending: None,
            ticket: None,
            ticket_seq: 0,
            utterance_at: None,
            last_preview: None,
            context: ContextTracker::new(),
            metrics: Metrics::new(),
            log: EventLog::new(),
        }
    }

    // --- Read-only accessors ---

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn current_intent(&self) -> Option<&Intent> {
        self.current_intent.as_ref()
    }

    pub fn current_transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub fn pending_execution(&self) -> Option<&Intent> {
        self.pending.as_ref()
    }

    pub fn cancel_window_active(&self) -> bool {
        matches!(self.timer, Some(t) if t.id.kind == TimerKind::CancelWindow)
    }

    pub fn active_timer(&self) -> Option<TimerId> {
        self.timer.map(|t| t.id)
    }

    pub fn context(&self) -> &HoverContext {
        self.context.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    // --- Event application ---

    /// Pure step: (state, event) -> (state', effects).
    pub fn apply(&mut self, event: PipelineEvent, now: Timestamp) -> Vec<SideEffect> {
        let timer_before = self.timer;
        let mut fx = Vec::new();

        match event {
            PipelineEvent::SpeechStart => self.on_speech_start(now, &mut fx),
            PipelineEvent::SpeechEnd => self.on_speech_end(now),
            PipelineEvent::InterimTranscript { text, confidence } => {
                self.on_interim(&text, confidence, now, &mut fx)
            }
            PipelineEvent::FinalTranscript { text, confidence } => {
                self.on_final(&text, confidence, now, &mut fx)
            }
            PipelineEvent::Typed(text) => self.on_typed(&text, now, &mut fx),
            PipelineEvent::Cancel => self.on_cancel("signal", now, &mut fx),
            PipelineEvent::ContextUpdated(update) => {
                self.record(now, LogEventKind::Context, json!({ "active": update.active_target_id }));
                self.context.update(update);
            }
            PipelineEvent::DispatchCompleted { ticket, result } => {
                self.on_dispatch_completed(ticket, result, now, &mut fx)
            }
            PipelineEvent::TimerFired(id) => self.on_timer(id, now, &mut fx),
        }

        // Reconcile the single timer slot into effects.
        if self.timer != timer_before {
            if let Some(old) = timer_before {
                fx.push(SideEffect::CancelTimer(old.id));
            }
            if let Some(new) = self.timer {
                fx.push(SideEffect::ScheduleTimer { id: new.id, after: new.after });
            }
        }

        fx
    }

    fn on_speech_start(&mut self, now: Timestamp, fx: &mut Vec<SideEffect>) {
        match self.state {
            PipelineState::Idle => self.enter(PipelineState::Listening, now),
            PipelineState::Speaking if self.config.enable_barge_in => {
                info!("Barge-in: interrupting feedback");
                fx.push(SideEffect::StopSpeaking);
                self.enter(PipelineState::Listening, now);
            }
            PipelineState::Parsing if self.cancel_window_active() => {
                // Renewed speech voids the pending intent.
                let discarded = self.pending.take();
                self.record(
                    now,
                    LogEventKind::Cancel,
                    json!({ "reason": "renewed_speech", "intent": discarded.as_ref().map(|i| i.action_name()) }),
                );
                self.enter(PipelineState::Listening, now);
            }
            _ => self.ignored("speech_start", now),
        }
    }

    fn on_speech_end(&mut self, now: Timestamp) {
        match self.state {
            PipelineState::Listening => self.enter(PipelineState::Transcribing, now),
            _ => self.ignored("speech_end", now),
        }
    }

    fn on_interim(&mut self, text: &str, confidence: f32, now: Timestamp, fx: &mut Vec<SideEffect>) {
        if !self.config.enable_two_pass_asr {
            return;
        }
        if !matches!(self.state, PipelineState::Listening | PipelineState::Transcribing) {
            return;
        }
        let Some(guess) = quick_guess(text) else {
            return;
        };
        if self.last_preview == Some(guess) {
            return;
        }
        self.last_preview = Some(guess);
        self.record(now, LogEventKind::Preview, json!({ "word": guess.word, "confidence": confidence }));
        fx.push(SideEffect::Preview(guess));
    }

    fn on_final(&mut self, text: &str, confidence: f32, now: Timestamp, fx: &mut Vec<SideEffect>) {
        match self.state {
            PipelineState::Idle | PipelineState::Listening | PipelineState::Transcribing => {
                self.on_utterance(text, confidence, now, fx)
            }
            PipelineState::Confirming => self.on_reply(text, confidence, now, fx),
            _ => self.ignored("final_transcript", now),
        }
    }

    fn on_typed(&mut self, text: &str, now: Timestamp, fx: &mut Vec<SideEffect>) {
        match self.state {
            PipelineState::Idle | PipelineState::Listening => {
                if self.state == PipelineState::Idle {
                    self.on_speech_start(now, fx);
                }
                self.on_speech_end(now);
                self.on_final(text, 1.0, now, fx);
            }
            PipelineState::Confirming => self.on_reply(text, 1.0, now, fx),
            _ => self.ignored("typed", now),
        }
    }

    /// A fresh utterance from Idle/Listening/Transcribing.
    fn on_utterance(&mut self, text: &str, confidence: f32, now: Timestamp, fx: &mut Vec<SideEffect>) {
        self.take_transcript(text, confidence, now);
        self.enter(PipelineState::Parsing, now);

        let mut utterance = Utterance::new(text);
        if self.config.wake_word_required {
            let stripped = self
                .config
                .wake_words
                .iter()
                .find_map(|w| utterance.strip_prefix(w));
            match stripped {
                Some(rest) => utterance = rest,
                None => {
                    debug!("Wake word missing in '{}'", utterance.text());
                    self.record(now, LogEventKind::Ignored, json!({ "reason": "wake_word_missing" }));
                    self.enter_idle(now);
                    return;
                }
            }
        }

        if CancelWindowCoordinator::is_cancel_utterance(&utterance) {
            self.on_cancel("utterance", now, fx);
            return;
        }

        if confidence < self.config.confidence_threshold {
            info!("ASR confidence {:.2} below reject threshold", confidence);
            self.reprompt(LOW_CONFIDENCE_PROMPT, now, fx);
            return;
        }

        self.resolve(&utterance, confidence, now, fx);
    }

    /// Reply while Confirming.
    fn on_reply(&mut self, text: &str, confidence: f32, now: Timestamp, fx: &mut Vec<SideEffect>) {
        let reply = Utterance::new(text);
        match self.confirmation.classify(&reply) {
            Reply::Affirmative => {
                self.record(now, LogEventKind::Gate, json!({ "reply": "affirmative" }));
                match self.pending.take() {
                    Some(intent) if !intent.needs_clarification() => self.begin_execution(intent, now, fx),
                    Some(intent) => {
                        // "Yes" does not name a track; ask again without resetting the deadline.
                        fx.push(SideEffect::Speak(ConfirmationCoordinator::prompt(&intent)));
                        self.pending = Some(intent);
                    }
                    None => fx.push(SideEffect::Speak(REPEAT_PROMPT.to_string())),
                }
            }
            Reply::Negative => {
                self.record(now, LogEventKind::Gate, json!({ "reply": "negative" }));
                self.enter_idle(now);
                fx.push(SideEffect::Speak(CANCELLED.to_string()));
            }
            Reply::Other => {
                // Re-spoken command: medium trust, never above what was heard.
                let confidence = confidence.min(self.config.respoken_confidence);
                let previous = self.pending.take();
                self.take_transcript(text, confidence, now);
                self.enter(PipelineState::Parsing, now);

                let merged = previous
                    .filter(|p| p.needs_clarification())
                    .map(|p| Utterance::new(&format!("{} {}", p.utterance(), reply.text())))
                    .filter(|m| {
                        parse_with_trace(m, confidence, self.context.snapshot())
                            .map(|o| !o.intent.needs_clarification())
                            .unwrap_or(false)
                    });

                let utterance = merged.unwrap_or(reply);
                self.resolve(&utterance, confidence, now, fx);
            }
        }
    }

    fn resolve(&mut self, utterance: &Utterance, confidence: f32, now: Timestamp, fx: &mut Vec<SideEffect>) {
        let started = std::time::Instant::now();
        let outcome = parse_with_trace(utterance, confidence, self.context.snapshot());
        if started.elapsed() > self.config.timeouts.parsing() {
            self.enter_error(PipelineErrorKind::ParseTimeout, now, fx);
            return;
        }

        let Some(outcome) = outcome else {
            self.current_intent = None;
            self.record(
                now,
                LogEventKind::Parse,
                json!({ "text": utterance.text(), "error": PipelineErrorKind::UnknownIntent }),
            );
            self.reprompt(REPEAT_PROMPT, now, fx);
            return;
        };

        let intent = outcome.intent;
        self.record(
            now,
            LogEventKind::Parse,
            json!({
                "intent_id": intent.id(),
                "text": utterance.text(),
                "category": outcome.category,
                "rule": outcome.rule,
                "action": intent.action_name(),
                "target": intent.target().map(|t| t.to_string()),
                "source": intent.target_source(),
                "confidence": intent.confidence(),
            }),
        );
        info!("Intent: {} ({:.2})", intent.summary(), intent.confidence());
        self.current_intent = Some(intent.clone());

        match self.confirmation.gate(&intent) {
            Gate::Confirm { prompt } => {
                self.record(
                    now,
                    LogEventKind::Gate,
                    json!({ "gate": "confirm", "prompt": prompt, "threshold": self.confirmation.threshold() }),
                );
                self.pending = Some(intent);
                self.enter(PipelineState::Confirming, now);
                fx.push(SideEffect::Speak(prompt));
            }
            Gate::Proceed => match self.cancel_window.window() {
                Some(window) => {
                    self.record(now, LogEventKind::Gate, json!({ "gate": "cancel_window", "ms": window.as_millis() as u64 }));
                    // A new window replaces any prior pending intent.
                    self.pending = Some(intent);
                    self.timer = Some(self.next_timer(TimerKind::CancelWindow, window));
                }
                None => self.begin_execution(intent, now, fx),
            },
        }
    }

    fn begin_execution(&mut self, intent: Intent, now: Timestamp, fx: &mut Vec<SideEffect>) {
        self.enter(PipelineState::Executing, now);
        self.metrics.record_command();

        match self.dispatcher.prepare(&intent) {
            Ok(command) => {
                self.ticket_seq += 1;
                let ticket = DispatchTicket(self.ticket_seq);
                info!("Dispatching {}", command);
                self.record(now, LogEventKind::Dispatch, json!({ "ticket": ticket.0, "command": command.to_string() }));
                self.ticket = Some(ticket);
                self.pending = Some(intent);
                fx.push(SideEffect::Dispatch { ticket, command });
            }
            Err(e) => {
                warn!("Dispatch rejected: {}", e);
                self.record(now, LogEventKind::Dispatch, json!({ "rejected": e.to_string() }));
                self.enter_error(e.kind(), now, fx);
            }
        }
    }

    fn on_dispatch_completed(
        &mut self,
        ticket: DispatchTicket,
        result: ExecutionResult,
        now: Timestamp,
        fx: &mut Vec<SideEffect>,
    ) {
        if self.state != PipelineState::Executing || self.ticket != Some(ticket) {
            debug!("Discarded stale dispatch result {:?}", ticket);
            self.record(now, LogEventKind::Ignored, json!({ "reason": "stale_dispatch", "ticket": ticket.0 }));
            return;
        }

        let latency = self.utterance_at.map(|t| now.since(t)).unwrap_or(0);
        self.ticket = None;
        self.record(
            now,
            LogEventKind::DispatchResult,
            json!({ "ticket": ticket.0, "success": result.success, "detail": result.detail, "latency_ms": latency }),
        );

        if result.success {
            self.metrics.record_success(latency);
            let phrase = self
                .pending
                .take()
                .map(|intent| self.dispatcher.confirmation(&intent))
                .unwrap_or_else(|| "Done.".to_string());
            self.enter(PipelineState::Speaking, now);
            fx.push(SideEffect::Speak(phrase));
        } else {
            self.metrics.record_failed_completion(latency);
            self.enter_error(PipelineErrorKind::ExecutionFailure, now, fx);
        }
    }

    fn on_cancel(&mut self, source: &str, now: Timestamp, fx: &mut Vec<SideEffect>) {
        if !self.state.is_cancellable() {
            self.ignored("cancel", now);
            return;
        }
        let had_pending = self.pending.is_some() || self.state == PipelineState::Confirming;
        self.record(
            now,
            LogEventKind::Cancel,
            json!({ "source": source, "intent": self.pending.as_ref().map(|i| i.action_name()) }),
        );
        self.enter_idle(now);
        if had_pending || source == "utterance" {
            fx.push(SideEffect::Speak(CANCELLED.to_string()));
        }
    }

    fn on_timer(&mut self, id: TimerId, now: Timestamp, fx: &mut Vec<SideEffect>) {
        if self.timer.map(|t| t.id) != Some(id) {
            debug!("Discarded stale timer {:?}", id);
            return;
        }
        self.timer = None;

        match id.kind {
            TimerKind::CancelWindow => match self.pending.take() {
                Some(intent) => self.begin_execution(intent, now, fx),
                None => self.enter_idle(now),
            },
            TimerKind::StateTimeout(state) if state == self.state => match state {
                PipelineState::Idle => {}
                PipelineState::Listening => self.enter_idle(now),
                PipelineState::Transcribing => self.enter_error(PipelineErrorKind::TranscriptionTimeout, now, fx),
                PipelineState::Parsing => self.enter_error(PipelineErrorKind::ParseTimeout, now, fx),
                PipelineState::Confirming => {
                    let kind = PipelineErrorKind::ConfirmationTimeout;
                    self.record(now, LogEventKind::Error, json!({ "kind": kind }));
                    self.enter_idle(now);
                    fx.push(SideEffect::Speak(kind.apology().to_string()));
                }
                PipelineState::Executing => {
                    let latency = self.utterance_at.map(|t| now.since(t)).unwrap_or(0);
                    self.metrics.record_failed_completion(latency);
                    self.enter_error(PipelineErrorKind::ExecutionTimeout, now, fx);
                }
                PipelineState::Speaking => self.enter(PipelineState::Listening, now),
                PipelineState::Error => self.enter_idle(now),
            },
            TimerKind::StateTimeout(_) => {}
        }
    }

    // --- Transitions ---

    /// Every transition replaces the timer slot with the new state's
    /// deadline, so the old state's timer is always cleared.
    fn enter(&mut self, to: PipelineState, now: Timestamp) {
        let from = self.state;
        self.state = to;
        self.timer = to
            .timeout(&self.config)
            .map(|after| self.next_timer(TimerKind::StateTimeout(to), after));

        if from != to {
            info!("State: {} -> {}", from, to);
        }
        self.record(now, LogEventKind::Transition, json!({ "from": from, "to": to }));

        if to == PipelineState::Listening {
            self.last_preview = None;
        }
    }

    fn enter_idle(&mut self, now: Timestamp) {
        self.pending = None;
        self.ticket = None;
        self.current_intent = None;
        self.transcript = None;
        self.utterance_at = None;
        self.last_preview = None;
        self.enter(PipelineState::Idle, now);
    }

    fn enter_error(&mut self, kind: PipelineErrorKind, now: Timestamp, fx: &mut Vec<SideEffect>) {
        warn!("Pipeline error: {}", kind);
        self.record(now, LogEventKind::Error, json!({ "kind": kind }));
        self.metrics.record_error();
        self.pending = None;
        self.ticket = None;
        self.enter(PipelineState::Error, now);
        fx.push(SideEffect::Speak(kind.apology().to_string()));
    }

    fn reprompt(&mut self, prompt: &str, now: Timestamp, fx: &mut Vec<SideEffect>) {
        self.pending = None;
        self.record(now, LogEventKind::Gate, json!({ "gate": "reprompt", "prompt": prompt }));
        self.enter(PipelineState::Confirming, now);
        fx.push(SideEffect::Speak(prompt.to_string()));
    }

    // --- Helpers ---

    fn take_transcript(&mut self, text: &str, confidence: f32, now: Timestamp) {
        let transcript = Transcript {
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            is_final: true,
            timestamp: now,
        };
        self.record(now, LogEventKind::Transcript, json!({ "text": text, "confidence": transcript.confidence }));
        self.transcript = Some(transcript);
        self.utterance_at = Some(now);
    }

    fn next_timer(&mut self, kind: TimerKind, after: Duration) -> ActiveTimer {
        self.timer_seq += 1;
        ActiveTimer { id: TimerId { seq: self.timer_seq, kind }, after }
    }

    fn ignored(&mut self, what: &str, now: Timestamp) {
        debug!("Ignored {} in {}", what, self.state);
        self.record(now, LogEventKind::Ignored, json!({ "event": what }));
    }

    fn record(&mut self, now: Timestamp, kind: LogEventKind, payload: serde_json::Value) {
        self.log.record(now, kind, self.state, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::new(ms)
    }

    #[test]
    fn timer_slot_holds_one_timer() {
        let mut m = PipelineMachine::new(PipelineConfig::default());
        let fx = m.apply(PipelineEvent::SpeechStart, t(0));
        assert!(matches!(fx.as_slice(), [SideEffect::ScheduleTimer { .. }]));

        let fx = m.apply(PipelineEvent::SpeechEnd, t(10));
        assert!(matches!(
            fx.as_slice(),
            [SideEffect::CancelTimer(_), SideEffect::ScheduleTimer { .. }]
        ));
        assert_eq!(m.active_timer().map(|id| id.kind), Some(TimerKind::StateTimeout(PipelineState::Transcribing)));
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut m = PipelineMachine::new(PipelineConfig::default());
        m.apply(PipelineEvent::SpeechStart, t(0));
        let listening_timer = m.active_timer().unwrap();
        m.apply(PipelineEvent::SpeechEnd, t(10));

        let fx = m.apply(PipelineEvent::TimerFired(listening_timer), t(30_000));
        assert!(fx.is_empty());
        assert_eq!(m.state(), PipelineState::Transcribing);
    }

    #[test]
    fn idle_has_no_timer() {
        let mut m = PipelineMachine::new(PipelineConfig::default());
        m.apply(PipelineEvent::SpeechStart, t(0));
        m.apply(PipelineEvent::Cancel, t(5));
        assert_eq!(m.state(), PipelineState::Idle);
        assert!(m.active_timer().is_none());
    }
}

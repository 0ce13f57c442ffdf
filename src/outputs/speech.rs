//! Spoken feedback. Fire-and-forget: the pipeline never waits on a sink.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::intent::types::QuickGuess;

#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;

    /// Interim guess while the user is still talking. Display only.
    fn preview(&self, guess: &QuickGuess) {
        debug!("[PREVIEW] {} ({:?})", guess.word, guess.kind);
    }

    /// Cuts off the utterance in progress, if any.
    fn stop(&self) {}
}

/// Writes feedback to the log instead of a speaker.
#[derive(Debug, Default)]
pub struct LoggingSpeech;

#[async_trait]
impl SpeechSink for LoggingSpeech {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        info!("[SPEAK] {}", text);
        Ok(())
    }

    fn preview(&self, guess: &QuickGuess) {
        info!("[PREVIEW] {}", guess.word);
    }
}

/// Runs an external TTS program (`say`, `espeak`) with the text as its
/// last argument. A new utterance stops the one still playing.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    playing: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSpeech {
    /// `command` is split on whitespace: program first, then fixed args.
    pub fn new(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect(), playing: Mutex::new(None) })
    }

    fn stop_current(&self) -> Option<oneshot::Receiver<()>> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let mut playing = self.playing.lock().ok()?;
        if let Some(previous) = playing.replace(stop_tx) {
            let _ = previous.send(());
        }
        Some(stop_rx)
    }
}

#[async_trait]
impl SpeechSink for CommandSpeech {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let Some(mut stop_rx) = self.stop_current() else {
            anyhow::bail!("speech lock poisoned");
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to spawn '{}': {}", self.program, e))?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    warn!("'{}' exited with {}", self.program, status);
                }
            }
            _ = &mut stop_rx => {
                debug!("Speech interrupted");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }

    fn stop(&self) {
        let previous = self.playing.lock().ok().and_then(|mut playing| playing.take());
        if let Some(previous) = previous {
            let _ = previous.send(());
        }
    }
}

/// Keeps everything spoken. For tests.
#[derive(Debug, Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    previews: Mutex<Vec<QuickGuess>>,
    stops: AtomicUsize,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn previews(&self) -> Vec<QuickGuess> {
        self.previews.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSink for RecordingSpeech {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(())
    }

    fn preview(&self, guess: &QuickGuess) {
        if let Ok(mut previews) = self.previews.lock() {
            previews.push(*guess);
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

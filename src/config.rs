use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Per-state deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub listening_ms: u64,
    pub transcribing_ms: u64,
    pub parsing_ms: u64,
    pub confirming_ms: u64,
    pub executing_ms: u64,
    pub speaking_ms: u64,
    pub error_recovery_ms: u64,
    /// Delay after a spoken confirmation before listening again.
    pub feedback_return_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            listening_ms: 30_000,
            transcribing_ms: 5_000,
            parsing_ms: 1_000,
            confirming_ms: 10_000,
            executing_ms: 3_000,
            speaking_ms: 10_000,
            error_recovery_ms: 2_000,
            feedback_return_ms: 1_500,
        }
    }
}

impl Timeouts {
    pub fn listening(&self) -> Duration {
        Duration::from_millis(self.listening_ms)
    }

    pub fn transcribing(&self) -> Duration {
        Duration::from_millis(self.transcribing_ms)
    }

    pub fn parsing(&self) -> Duration {
        Duration::from_millis(self.parsing_ms)
    }

    pub fn confirming(&self) -> Duration {
        Duration::from_millis(self.confirming_ms)
    }

    pub fn executing(&self) -> Duration {
        Duration::from_millis(self.executing_ms)
    }

    /// Speaking holds a single timer: the feedback return, capped by the
    /// speaking timeout.
    pub fn speaking(&self) -> Duration {
        Duration::from_millis(self.feedback_return_ms.min(self.speaking_ms))
    }

    pub fn error_recovery(&self) -> Duration {
        Duration::from_millis(self.error_recovery_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// ASR confidence below which a fresh utterance is re-prompted.
    pub confidence_threshold: f32,
    /// Intent confidence below which the user is asked to confirm.
    pub confirmation_threshold: f32,
    pub cancel_window_ms: u64,
    pub enable_cancel_window: bool,
    pub enable_barge_in: bool,
    pub enable_two_pass_asr: bool,
    pub wake_word_required: bool,
    pub wake_words: Vec<String>,
    /// Highest valid track/mixer target index (1-based).
    pub max_track: u32,
    pub max_bar: u32,
    /// Ceiling on ASR confidence for a command re-spoken while confirming.
    pub respoken_confidence: f32,
    /// External TTS program, e.g. "say" or "espeak -s 170". Logged when unset.
    pub speech_command: Option<String>,
    pub timeouts: Timeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            confirmation_threshold: 0.85,
            cancel_window_ms: 500,
            enable_cancel_window: true,
            enable_barge_in: true,
            enable_two_pass_asr: true,
            wake_word_required: false,
            wake_words: vec!["computer".to_string(), "hey daw".to_string()],
            max_track: 128,
            max_bar: 9_999,
            respoken_confidence: 0.7,
            speech_command: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl PipelineConfig {
    pub fn cancel_window(&self) -> Duration {
        Duration::from_millis(self.cancel_window_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid("confidence_threshold must be within [0, 1]".into()));
        }
        if !unit.contains(&self.confirmation_threshold) {
            return Err(ConfigError::Invalid("confirmation_threshold must be within [0, 1]".into()));
        }
        if !unit.contains(&self.respoken_confidence) {
            return Err(ConfigError::Invalid("respoken_confidence must be within [0, 1]".into()));
        }
        if self.confidence_threshold > self.confirmation_threshold {
            return Err(ConfigError::Invalid(
                "confidence_threshold must not exceed confirmation_threshold".into(),
            ));
        }
        if self.enable_cancel_window && self.cancel_window_ms == 0 {
            return Err(ConfigError::Invalid("cancel_window_ms must be positive".into()));
        }
        if self.max_track == 0 || self.max_bar == 0 {
            return Err(ConfigError::Invalid("max_track and max_bar must be positive".into()));
        }
        let t = &self.timeouts;
        let all = [
            t.listening_ms,
            t.transcribing_ms,
            t.parsing_ms,
            t.confirming_ms,
            t.executing_ms,
            t.speaking_ms,
            t.error_recovery_ms,
            t.feedback_return_ms,
        ];
        if all.iter().any(|ms| *ms == 0) {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if self.wake_word_required && self.wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(ConfigError::Invalid("wake_word_required needs at least one wake word".into()));
        }
        Ok(())
    }
}

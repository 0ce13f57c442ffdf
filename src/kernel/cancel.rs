use std::time::Duration;

use crate::intent::normalize::Utterance;

const CANCEL_PHRASES: [&str; 6] = ["cancel", "never mind", "nevermind", "abort", "forget it", "cancel that"];

/// Owns the policy of the silent grace period before dispatch.
/// The pending intent itself lives in the machine's single pending slot.
#[derive(Debug, Clone)]
pub struct CancelWindowCoordinator {
    enabled: bool,
    window: Duration,
}

impl CancelWindowCoordinator {
    pub fn new(enabled: bool, window: Duration) -> Self {
        Self { enabled, window }
    }

    /// Length of the window to open, or `None` to dispatch immediately.
    pub fn window(&self) -> Option<Duration> {
        (self.enabled && !self.window.is_zero()).then_some(self.window)
    }

    /// Pure function: does this utterance ask to cancel?
    pub fn is_cancel_utterance(utterance: &Utterance) -> bool {
        CANCEL_PHRASES.contains(&utterance.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_window_dispatches_immediately() {
        let c = CancelWindowCoordinator::new(false, Duration::from_millis(500));
        assert_eq!(c.window(), None);
        let c = CancelWindowCoordinator::new(true, Duration::from_millis(500));
        assert_eq!(c.window(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn recognises_cancel_phrases() {
        assert!(CancelWindowCoordinator::is_cancel_utterance(&Utterance::new("Never mind!")));
        assert!(!CancelWindowCoordinator::is_cancel_utterance(&Utterance::new("cancel loop")));
    }
}

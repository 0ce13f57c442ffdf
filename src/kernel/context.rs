use serde::{Deserialize, Serialize};

const MAX_RECENT_TARGETS: usize = 16;

/// Kind of control under the pointer in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Track,
    Volume,
    Pan,
    Mute,
    Solo,
    Arm,
    Other,
}

/// What the user is looking at or has selected.
///
/// `recent_targets` is ordered most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverContext {
    pub active_target_id: Option<u32>,
    pub active_control_kind: Option<ControlKind>,
    pub recent_targets: Vec<u32>,
    pub selected_target_id: Option<u32>,
}

impl HoverContext {
    pub fn with_active(target: u32) -> Self {
        Self { active_target_id: Some(target), ..Self::default() }
    }

    pub fn most_recent(&self) -> Option<u32> {
        self.recent_targets.first().copied()
    }
}

/// Holds the latest context snapshot. Last update wins, no expiry.
#[derive(Debug, Default)]
pub struct ContextTracker {
    current: HoverContext,
    updates: u64,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, mut update: HoverContext) {
        update.recent_targets.truncate(MAX_RECENT_TARGETS);
        self.current = update;
        self.updates += 1;
    }

    pub fn snapshot(&self) -> &HoverContext {
        &self.current
    }

    pub fn update_count(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_update_wins() {
        let mut tracker = ContextTracker::new();
        tracker.update(HoverContext::with_active(2));
        tracker.update(HoverContext {
            active_target_id: Some(7),
            recent_targets: vec![2, 1],
            ..HoverContext::default()
        });

        let snap = tracker.snapshot();
        assert_eq!(snap.active_target_id, Some(7));
        assert_eq!(snap.most_recent(), Some(2));
        assert_eq!(tracker.update_count(), 2);
    }

    #[test]
    fn recent_history_is_bounded() {
        let mut tracker = ContextTracker::new();
        tracker.update(HoverContext { recent_targets: (0..40).collect(), ..HoverContext::default() });
        assert_eq!(tracker.snapshot().recent_targets.len(), MAX_RECENT_TARGETS);
    }
}

use crate::intent::normalize::Utterance;
use crate::intent::types::Intent;

pub const REPEAT_PROMPT: &str = "Sorry, I didn't understand. Could you say that again?";
pub const LOW_CONFIDENCE_PROMPT: &str = "Sorry, I didn't catch that. Could you repeat?";
pub const CANCELLED: &str = "Cancelled.";

const AFFIRMATIVE: [&str; 12] = [
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "confirm", "correct", "affirmative", "do it",
    "go ahead",
];

// "stop" is a transport command, not a refusal.
const NEGATIVE: [&str; 9] = ["no", "nope", "nah", "cancel", "negative", "never mind", "nevermind", "don't", "dont"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Affirmative,
    Negative,
    /// Anything else: treated as a fresh command.
    Other,
}

/// Outcome of the confidence gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Confirm { prompt: String },
    Proceed,
}

/// Decides when to ask, what to ask, and how to read the answer.
#[derive(Debug, Clone)]
pub struct ConfirmationCoordinator {
    threshold: f32,
}

impl ConfirmationCoordinator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn gate(&self, intent: &Intent) -> Gate {
        if intent.needs_clarification() || intent.confidence() < self.threshold {
            Gate::Confirm { prompt: Self::prompt(intent) }
        } else {
            Gate::Proceed
        }
    }

    /// "Undo?" for a plain intent, the clarification question otherwise.
    pub fn prompt(intent: &Intent) -> String {
        match intent.clarification_prompt() {
            Some(question) => question.to_string(),
            None => format!("{}?", intent.summary()),
        }
    }

    /// Whole-utterance, case-insensitive match against a small grammar.
    pub fn classify(&self, reply: &Utterance) -> Reply {
        let text = reply.text();
        if AFFIRMATIVE.contains(&text) {
            Reply::Affirmative
        } else if NEGATIVE.contains(&text) {
            Reply::Negative
        } else {
            Reply::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::parser::parse;
    use crate::kernel::context::HoverContext;

    #[test]
    fn classifies_exact_replies_only() {
        let c = ConfirmationCoordinator::new(0.85);
        assert_eq!(c.classify(&Utterance::new("Yes.")), Reply::Affirmative);
        assert_eq!(c.classify(&Utterance::new("go ahead")), Reply::Affirmative);
        assert_eq!(c.classify(&Utterance::new("NO")), Reply::Negative);
        assert_eq!(c.classify(&Utterance::new("yes please mute track 2")), Reply::Other);
        assert_eq!(c.classify(&Utterance::new("Stop!")), Reply::Other);
    }

    #[test]
    fn low_confidence_intent_asks() {
        let c = ConfirmationCoordinator::new(0.85);
        let undo = parse(&Utterance::new("undo"), 0.5, &HoverContext::default()).unwrap();
        assert_eq!(c.gate(&undo), Gate::Confirm { prompt: "Undo?".to_string() });

        let play = parse(&Utterance::new("play"), 0.95, &HoverContext::default()).unwrap();
        assert_eq!(c.gate(&play), Gate::Proceed);
    }

    #[test]
    fn clarification_asks_even_when_confident() {
        let c = ConfirmationCoordinator::new(0.5);
        let mute = parse(&Utterance::new("mute"), 0.99, &HoverContext::default()).unwrap();
        assert_eq!(
            c.gate(&mute),
            Gate::Confirm { prompt: "Which track would you like to mute?".to_string() }
        );
    }
}

//! Utterance to intent: normalisation, the rule cascade, and the
//! single-word quick guess used for interim previews.

pub mod normalize;
pub mod parser;
pub mod quick;
pub mod types;

pub use normalize::Utterance;
pub use parser::{parse, parse_with_trace, ParseOutcome, RuleCategory};
pub use quick::quick_guess;
pub use types::{Action, Intent, IntentKind, QuickGuess, Target, TargetSource};

use super::normalize::Utterance;
use super::types::{IntentKind, QuickGuess};

/// Single-word commands recognised on interim text.
const QUICK_WORDS: [(&str, IntentKind); 7] = [
    ("play", IntentKind::Transport),
    ("stop", IntentKind::Transport),
    ("pause", IntentKind::Transport),
    ("record", IntentKind::Transport),
    ("undo", IntentKind::Edit),
    ("redo", IntentKind::Edit),
    ("save", IntentKind::Project),
];

/// Preview-only guess for a partial transcript. Only a lone command word
/// counts; anything longer waits for the final transcript.
pub fn quick_guess(partial: &str) -> Option<QuickGuess> {
    let utterance = Utterance::new(partial);
    match utterance.tokens() {
        [only] => QUICK_WORDS
            .iter()
            .find(|(word, _)| *word == only.as_str())
            .map(|(word, kind)| QuickGuess { word: *word, kind: *kind }),
        _ => None,
    }
}

/// Lower-cased, punctuation-stripped utterance split into word tokens.
/// Digits, '-' and '.' survive so "-6" and "2.5" stay numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    text: String,
    tokens: Vec<String>,
}

impl Utterance {
    pub fn new(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '.' || c == '\'' {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        let tokens: Vec<String> = cleaned
            .split_whitespace()
            .map(|t| t.trim_matches(|c| c == '.' || c == '\'').to_string())
            .filter(|t| !t.is_empty() && t != "-")
            .collect();

        Self { text: tokens.join(" "), tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.tokens.iter().any(|t| t == word)
    }

    pub fn has_any(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    /// Token index where `phrase` (space separated) begins, if present.
    pub fn find_phrase(&self, phrase: &str) -> Option<usize> {
        let parts: Vec<&str> = phrase.split_whitespace().collect();
        if parts.is_empty() || parts.len() > self.tokens.len() {
            return None;
        }
        (0..=self.tokens.len() - parts.len())
            .find(|&i| parts.iter().enumerate().all(|(j, p)| self.tokens[i + j] == *p))
    }

    pub fn has_phrase(&self, phrase: &str) -> bool {
        self.find_phrase(phrase).is_some()
    }

    /// First number directly following any occurrence of any of `words`.
    pub fn number_after(&self, words: &[&str]) -> Option<f32> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| words.contains(&t.as_str()))
            .find_map(|(i, _)| parse_number_at(&self.tokens, i + 1).map(|(n, _)| n))
    }

    /// Every number in order of appearance.
    pub fn numbers(&self) -> Vec<f32> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.tokens.len() {
            match parse_number_at(&self.tokens, i) {
                Some((n, used)) => {
                    out.push(n);
                    i += used;
                }
                None => i += 1,
            }
        }
        out
    }

    /// Strips a leading phrase, returning the remainder.
    pub fn strip_prefix(&self, phrase: &str) -> Option<Utterance> {
        let parts: Vec<&str> = phrase.split_whitespace().collect();
        if parts.is_empty() || parts.len() > self.tokens.len() {
            return None;
        }
        if parts.iter().zip(self.tokens.iter()).all(|(p, t)| t == p) {
            let rest = self.tokens[parts.len()..].to_vec();
            Some(Utterance { text: rest.join(" "), tokens: rest })
        } else {
            None
        }
    }
}

const UNITS: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 8] = ["twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety"];

fn tens_value(word: &str) -> Option<u32> {
    TENS.iter().position(|t| *t == word).map(|i| (i as u32 + 2) * 10)
}

/// Parses a number starting at `tokens[i]`: digits ("12", "-6", "2.5"),
/// unit words ("three"), tens and compounds ("twenty one", "twenty-one"),
/// and "minus"/"negative" prefixes. Returns the value and tokens consumed.
pub fn parse_number_at(tokens: &[String], i: usize) -> Option<(f32, usize)> {
    let token = tokens.get(i)?;

    if token == "minus" || token == "negative" {
        return parse_number_at(tokens, i + 1).map(|(n, used)| (-n, used + 1));
    }

    if let Ok(n) = token.parse::<f32>() {
        if n.is_finite() {
            return Some((n, 1));
        }
    }

    if let Some((head, tail)) = token.split_once('-') {
        if let (Some(t), Some(u)) = (tens_value(head), UNITS.iter().position(|w| *w == tail)) {
            if (1..10).contains(&u) {
                return Some(((t + u as u32) as f32, 1));
            }
        }
    }

    if let Some(t) = tens_value(token) {
        if let Some(next) = tokens.get(i + 1) {
            if let Some(u) = UNITS.iter().position(|w| *w == next.as_str()) {
                if (1..10).contains(&u) {
                    return Some(((t + u as u32) as f32, 2));
                }
            }
        }
        return Some((t as f32, 1));
    }

    if let Some(u) = UNITS.iter().position(|w| *w == token.as_str()) {
        return Some((u as f32, 1));
    }

    None
}

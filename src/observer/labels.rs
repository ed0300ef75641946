//! Parsing of arena page text into votes and model names

use crate::types::Outcome;

/// Vote button captions and the outcome each one means
const VOTE_LABELS: &[(&str, Outcome)] = &[
    ("👈  A is better", Outcome::AWins),
    ("👉  B is better", Outcome::BWins),
    ("🤝  Tie", Outcome::Draw),
    ("👎  Both are bad", Outcome::Draw),
    // beta layout
    ("Left is Better", Outcome::AWins),
    ("Right is Better", Outcome::BWins),
    ("It's a tie", Outcome::Draw),
    ("Both are bad", Outcome::Draw),
];

const HEADING_PREFIX_A: &str = "Model A:";
const HEADING_PREFIX_B: &str = "Model B:";

/// Which side of the comparison a heading names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// Map a vote button caption to an outcome. Captions must match exactly
/// after trimming surrounding whitespace.
pub fn parse_vote_label(text: &str) -> Option<Outcome> {
    let text = text.trim();
    VOTE_LABELS
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, outcome)| *outcome)
}

/// Extract a model name from a `"Model A: <name>"` style heading
pub fn parse_model_heading(text: &str) -> Option<(Side, String)> {
    let text = text.trim();
    let (side, rest) = if let Some(rest) = text.strip_prefix(HEADING_PREFIX_A) {
        (Side::A, rest)
    } else if let Some(rest) = text.strip_prefix(HEADING_PREFIX_B) {
        (Side::B, rest)
    } else {
        return None;
    };

    let name = rest.trim();
    if name.is_empty() {
        return None;
    }
    Some((side, name.to_string()))
}

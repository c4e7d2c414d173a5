use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s|+]+").expect("separator pattern is valid"));

/// Split raw text on runs of `,`, whitespace, `|` and `+`.
///
/// Pieces are trimmed and empty pieces dropped; order and case are kept.
pub fn tokenize(input: &str) -> Vec<String> {
    SEPARATORS
        .split(input)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

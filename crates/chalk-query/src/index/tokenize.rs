use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Tokens kept per text.
pub const MAX_TOKENS: usize = 500;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]{2,}").expect("static regex"));

/// Lower-cased alphanumeric/underscore runs of at least two characters,
/// capped at [`MAX_TOKENS`].
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .take(MAX_TOKENS)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Occurrences of each token.
pub fn term_counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

use super::stopwords::STOP_WORDS;

static WORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static pattern"));
static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

/// Lowercases, splits on `\W+`, drops empty tokens and stop-words, and
/// preserves duplicates and order (spec §4.5.1 steps 1-4).
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_SPLIT
        .split(&lower)
        .filter(|t| !t.is_empty())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Applies the Porter stemmer to a single token.
#[must_use]
pub fn stem(token: &str) -> String {
    STEMMER.stem(token).into_owned()
}

//! Event-name similarity.
//!
//! Names are normalized (lowercase, question prefix removed, punctuation stripped,
//! stop words removed, light plural stemming) and scored as
//! `0.7 × Dice(token sets) + 0.3 × edit ratio`. Names that both carry numbers
//! (years, lines) but disagree on them score zero.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Weight of token overlap in the blended score.
pub const TOKEN_WEIGHT: f64 = 0.7;
/// Weight of the edit-distance ratio in the blended score.
pub const EDIT_WEIGHT: f64 = 0.3;

static QUESTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:who will|what will|which|will)\s+").expect("valid regex")
});

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "do", "does", "for", "in", "is", "of", "on",
    "or", "than", "that", "the", "this", "to", "versus", "vs", "will", "with",
];

/// A name prepared for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedName {
    /// Content tokens in original order, joined by single spaces.
    pub text: String,
    /// Distinct content tokens.
    pub tokens: BTreeSet<String>,
    /// Distinct numeric tokens.
    pub numbers: BTreeSet<String>,
}

impl PreparedName {
    /// Normalize and tokenize an event name.
    pub fn new(name: &str) -> Self {
        let normalized = normalize_text(name);
        let ordered: Vec<String> = normalized
            .split_whitespace()
            .filter(|t| !STOP_WORDS.contains(t))
            .map(stem)
            .collect();

        let tokens: BTreeSet<String> = ordered.iter().cloned().collect();
        let numbers = tokens
            .iter()
            .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
            .cloned()
            .collect();

        Self {
            text: ordered.join(" "),
            tokens,
            numbers,
        }
    }
}

/// Lowercase, drop a leading question prefix, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let without_prefix = QUESTION_PREFIX.replace(&lower, "");
    let stripped = NON_ALNUM.replace_all(&without_prefix, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn stem(token: &str) -> String {
    let keep = token.len() <= 3
        || !token.ends_with('s')
        || token.ends_with("ss")
        || token.ends_with("us")
        || token.ends_with("is")
        || token.chars().all(|c| c.is_ascii_digit());
    if keep {
        token.to_string()
    } else {
        token[..token.len() - 1].to_string()
    }
}

/// Sørensen-Dice coefficient of two token sets.
pub fn dice(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    2.0 * shared as f64 / (a.len() + b.len()) as f64
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / longer length`, in `[0, 1]`.
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Blended similarity of two prepared names, in `[0, 1]`.
pub fn score_prepared(a: &PreparedName, b: &PreparedName) -> f64 {
    if a.tokens.is_empty() || b.tokens.is_empty() {
        return 0.0;
    }
    if !a.numbers.is_empty() && !b.numbers.is_empty() && a.numbers != b.numbers {
        return 0.0;
    }
    TOKEN_WEIGHT * dice(&a.tokens, &b.tokens) + EDIT_WEIGHT * edit_ratio(&a.text, &b.text)
}

/// Blended similarity of two raw event names.
pub fn similarity(a: &str, b: &str) -> f64 {
    score_prepared(&PreparedName::new(a), &PreparedName::new(b))
}

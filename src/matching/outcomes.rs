//! Outcome label canonicalization and compatibility.

use std::collections::BTreeMap;

/// Canonical label of the affirmative side of a binary market.
pub const YES: &str = "yes";
/// Canonical label of the negative side of a binary market.
pub const NO: &str = "no";

const BUILT_IN_ALIASES: &[(&str, &str)] = &[
    ("up", YES),
    ("down", NO),
    ("true", YES),
    ("false", NO),
];

/// Maps venue outcome labels onto canonical labels.
#[derive(Debug, Clone)]
pub struct OutcomeAliases {
    aliases: BTreeMap<String, String>,
}

impl Default for OutcomeAliases {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl OutcomeAliases {
    /// Built-in aliases plus `extra` (which wins on conflict).
    pub fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut aliases: BTreeMap<String, String> = BUILT_IN_ALIASES
            .iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect();
        for (alias, canonical) in extra {
            aliases.insert(fold(alias), fold(canonical));
        }
        Self { aliases }
    }

    /// Canonical form of a label: case-folded, whitespace-collapsed, aliased.
    pub fn canonical(&self, label: &str) -> String {
        let folded = fold(label);
        self.aliases.get(&folded).cloned().unwrap_or(folded)
    }
}

fn fold(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when every label is `yes` or `no`.
pub fn is_binary<S: AsRef<str>>(labels: &[S]) -> bool {
    !labels.is_empty() && labels.iter().all(|l| l.as_ref() == YES || l.as_ref() == NO)
}

/// Whether two canonical labels name the same outcome.
///
/// Exact equality, or one label appearing as a whole-word run inside the other
/// (`trump` / `donald trump`).
pub fn labels_align(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    contains_words(a, b) || contains_words(b, a)
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    let hay: Vec<&str> = haystack.split(' ').collect();
    let pin: Vec<&str> = needle.split(' ').collect();
    pin.len() < hay.len() && hay.windows(pin.len()).any(|w| w == pin.as_slice())
}

/// Structural compatibility of two canonical outcome sets.
///
/// Binary sets only pair with binary sets. Two multi-outcome sets pair when they
/// share at least one aligned label.
pub fn outcomes_compatible<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    match (is_binary(a), is_binary(b)) {
        (true, true) => true,
        (false, false) => a
            .iter()
            .any(|x| b.iter().any(|y| labels_align(x.as_ref(), y.as_ref()))),
        _ => false,
    }
}

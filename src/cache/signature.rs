//! Text normalization, fingerprints and word-set similarity

use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

/// Maximum number of signature words kept per prompt
pub const SIGNATURE_SIZE: usize = 20;

/// Tokens this short or shorter carry no signal
const MIN_TOKEN_CHARS: usize = 3;

/// Stable SHA-256 hex digest over length-prefixed parts
///
/// Length prefixes keep `("ab", "c")` and `("a", "bc")` distinct.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Lowercase, replace punctuation with spaces and collapse whitespace
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Significant tokens of a text: normalized, longer than two characters
pub fn significant_tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Whether normalized text contains `keyword`
///
/// ASCII keywords must match a whole word; other keywords (CJK) match as
/// substrings since those scripts are not whitespace-delimited.
pub fn contains_keyword(normalized: &str, keyword: &str) -> bool {
    if keyword.is_ascii() {
        normalized.split_whitespace().any(|w| w == keyword)
    } else {
        normalized.contains(keyword)
    }
}

/// Set of significant tokens
pub fn token_set(text: &str) -> BTreeSet<String> {
    significant_tokens(text).into_iter().collect()
}

/// Set of all normalized words, short ones included
pub fn word_set(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Top-N tokens ranked by frequency, ties broken lexicographically
pub fn signature_words(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in significant_tokens(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(a_word, a_count), (b_word, b_count)| {
        b_count.cmp(a_count).then_with(|| a_word.cmp(b_word))
    });
    ranked
        .into_iter()
        .take(SIGNATURE_SIZE)
        .map(|(word, _)| word)
        .collect()
}

/// Intersection over union; two empty sets count as identical
pub fn jaccard<'a, A, B>(a: A, b: B) -> f64
where
    A: IntoIterator<Item = &'a String>,
    B: IntoIterator<Item = &'a String>,
{
    let a: BTreeSet<&String> = a.into_iter().collect();
    let b: BTreeSet<&String> = b.into_iter().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

/// Shared-tag ratio `|a ∩ b| / max(|a|, |b|)`
pub fn tag_overlap(a: &[String], b: &[String]) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 1.0;
    }
    let b: BTreeSet<&String> = b.iter().collect();
    let shared = a.iter().collect::<BTreeSet<_>>().intersection(&b).count();
    shared as f64 / larger as f64
}

/// First `max_chars` characters of a text
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

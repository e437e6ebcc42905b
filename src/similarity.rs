//! # Name Normalization and Similarity Scoring
//!
//! This module provides the text-comparison primitives used by the ingredient
//! matching engine: canonicalization of free-text item names and a blended
//! similarity score in [0, 1] combining character-level sequence similarity
//! with token-set overlap.
//!
//! ## Scoring model
//!
//! Pure character similarity under-rewards short but semantically identical
//! tokens (e.g. "tomato" vs "fresh tomato, 1kg") once qualifiers are stripped.
//! The blended score therefore applies floors when the two names share tokens:
//! any exact shared token guarantees at least 0.6, a substring-level token
//! overlap guarantees at least 0.4.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Size/quality qualifiers stripped before comparison. Food-descriptive words
/// are intentionally kept; only words that dilute similarity are dropped.
const STOP_WORDS: [&str; 12] = [
    "fresh", "organic", "premium", "quality", "grade", "a", "an", "the", "kg", "g", "ml", "l",
];

lazy_static! {
    static ref STOP_WORD_SET: HashSet<&'static str> = STOP_WORDS.iter().copied().collect();
    static ref NON_WORD_RE: Regex =
        Regex::new(r"[^\w\s]").expect("Non-word pattern should be valid");
}

/// Canonicalize a raw item or ingredient name for comparison.
///
/// Lowercases and trims, drops stop-word tokens, strips punctuation and
/// collapses repeated whitespace. Always returns a string (possibly empty);
/// never panics.
///
/// # Examples
///
/// ```rust
/// use receipt_match::similarity::normalize_name;
///
/// assert_eq!(normalize_name("Fresh Tomatoes, 1 KG"), "tomatoes 1");
/// assert_eq!(normalize_name("  "), "");
/// ```
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }

    let kept: Vec<&str> = lowered
        .split_whitespace()
        .filter(|token| !STOP_WORD_SET.contains(token))
        .collect();

    let rejoined = kept.join(" ");
    let stripped = NON_WORD_RE.replace_all(&rejoined, "");

    stripped.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Find the longest block of characters common to `a[alo..ahi]` and
/// `b[blo..bhi]`, preferring the earliest occurrence in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0usize;

    // j2len[j] = length of the common run ending at a[i], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        for j in blo..bhi {
            if b[j] == a[i] {
                let run = if j > blo {
                    j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                new_j2len.insert(j, run);
                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            }
        }
        j2len = new_j2len;
    }

    (best_i, best_j, best_size)
}

/// Total length of matching blocks between the two char slices, found by
/// recursively splitting around the longest common block.
fn matching_block_size(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> usize {
    let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
    if size == 0 {
        return 0;
    }

    size + matching_block_size(a, b, alo, i, blo, j)
        + matching_block_size(a, b, i + size, ahi, j + size, bhi)
}

/// Character-level sequence similarity: `2*M / (len(a) + len(b))` where `M`
/// is the total length of matching blocks.
fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 1.0;
    }

    let matched = matching_block_size(&a_chars, &b_chars, 0, a_chars.len(), 0, b_chars.len());
    2.0 * matched as f64 / total as f64
}

/// Compute the blended similarity score between two normalized names.
///
/// Returns 0.0 when either input is empty. The score blends the sequence
/// ratio with token-set overlap:
///
/// - exact token overlap (Jaccard) present → `max(0.6, 0.4*base + 0.6*overlap)`
/// - only substring-level token overlap → `max(0.4, 0.5*base + 0.5*overlap)`
/// - no token overlap → the plain sequence ratio
///
/// All component operations are symmetric, so
/// `similarity_score(a, b) == similarity_score(b, a)`.
pub fn similarity_score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let base = sequence_ratio(a, b);

    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let final_score = if !words_a.is_empty() && !words_b.is_empty() {
        let union = words_a.union(&words_b).count() as f64;
        let exact_overlap = words_a.intersection(&words_b).count() as f64 / union;

        // A token pairs off at most once; equality counts as a substring too.
        let partial_matches = words_a
            .iter()
            .filter(|wa| {
                words_b
                    .iter()
                    .any(|wb| wa.contains(wb) || wb.contains(*wa))
            })
            .count();
        let partial_overlap = partial_matches as f64 / union;

        let word_overlap = exact_overlap.max(partial_overlap);

        if word_overlap > 0.0 {
            if exact_overlap > 0.0 {
                (0.4 * base + 0.6 * word_overlap).max(0.6)
            } else {
                (0.5 * base + 0.5 * word_overlap).max(0.4)
            }
        } else {
            base
        }
    } else {
        base
    };

    final_score.min(1.0)
}

//! Deterministic term extraction from questions.
//!
//! Produces the keyword set used for lexical scoring: numeric tokens,
//! temporal and interrogative words present verbatim, topic-expansion
//! terms triggered by substrings of the question, and every alphabetic
//! token longer than three characters. The result is deduplicated,
//! stop-word filtered, and capped at [`MAX_TERMS`].
//!
//! Entirely source-agnostic: no model call, no catalog access.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Keyword-set size cap.
pub const MAX_TERMS: usize = 15;

/// Minimum length (exclusive) for raw tokens used by the fallback stages.
pub const MIN_RAW_TOKEN_LEN: usize = 2;

/// Digits with an optional decimal part and an optional trailing `%`.
static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%?").expect("numeric pattern"));

/// Alphabetic tokens of three or more characters.
static ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("alpha pattern"));

/// Alphanumeric tokens (plus `%`), used for the raw-token fallbacks.
static RAW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z0-9%]+").expect("raw pattern"));

const TIME_WORDS: [&str; 6] = ["days", "months", "years", "period", "waiting", "grace"];

const QUESTION_WORDS: [&str; 7] = ["what", "when", "where", "how", "why", "who", "which"];

/// Topic expansions: when the trigger substring occurs in the
/// lower-cased question, the expansion terms join the keyword set.
const EXPANSIONS: &[(&[&str], &[&str])] = &[
    (&["period"], &["period", "time", "duration", "waiting"]),
    (
        &["coverage", "cover"],
        &["coverage", "cover", "included", "excluded", "benefits"],
    ),
    (&["limit", "maximum"], &["limit", "maximum", "cap", "ceiling"]),
    (
        &["condition", "requirement"],
        &["condition", "requirement", "criteria", "eligible"],
    ),
    (
        &["define", "definition"],
        &["define", "definition", "means", "refers"],
    ),
];

const STOP_WORDS: [&str; 37] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can", "this", "that", "these", "those",
];

/// Extract the keyword set for lexical scoring from a question.
pub fn question_terms(question: &str) -> Vec<String> {
    let lower = question.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    for m in NUMERIC.find_iter(&lower) {
        terms.push(m.as_str().to_string());
    }
    for word in TIME_WORDS {
        if lower.contains(word) {
            terms.push(word.to_string());
        }
    }
    for word in QUESTION_WORDS {
        if lower.contains(word) {
            terms.push(word.to_string());
        }
    }
    for (triggers, expansion) in EXPANSIONS {
        if triggers.iter().any(|t| lower.contains(t)) {
            terms.extend(expansion.iter().map(|t| t.to_string()));
        }
    }
    for m in ALPHA.find_iter(&lower) {
        if m.as_str().len() > 3 {
            terms.push(m.as_str().to_string());
        }
    }

    let mut seen = HashSet::new();
    terms.retain(|t| !STOP_WORDS.contains(&t.as_str()) && seen.insert(t.clone()));
    terms.truncate(MAX_TERMS);
    terms
}

/// Raw alphanumeric tokens (length > 2) from a question, in order.
///
/// Used by the per-term vector probe and the exact substring fallback.
pub fn raw_tokens(question: &str) -> Vec<String> {
    let lower = question.to_lowercase();
    RAW.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() > MIN_RAW_TOKEN_LEN)
        .collect()
}

//! Lightweight passage statistics feeding the rule-based scorer.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Discourse markers signalling logical development.
pub const DISCOURSE_MARKERS: &[&str] = &[
    "however",
    "nevertheless",
    "nonetheless",
    "instead",
    "rather",
    "therefore",
    "thus",
    "consequently",
    "hence",
    "moreover",
    "furthermore",
];

/// Deictic words signalling reference chains.
pub const DEICTICS: &[&str] = &[
    "this", "that", "these", "those", "it", "they", "which", "whose", "where", "when",
];

static RE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+(?:['-][A-Za-z]+)?|\d+%?").unwrap());
static RE_SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(\s|$)").unwrap());
static RE_NUMBERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2,4}(?:%|[.,]?\d+)?\b").unwrap());
static RE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:km|kg|cm|mm|°c|°f|mph|percent|percentages?)\b").unwrap()
});
static RE_PROPER_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b").unwrap());

/// Surface statistics for one passage.
#[derive(Debug, Clone, Default)]
pub struct PassageMetrics {
    /// Word-like token count
    pub tokens: usize,

    /// Sentence count (at least 1)
    pub sentences: usize,

    /// Paragraph count (blank-line separated, at least 1)
    pub paragraphs: usize,

    /// Type-token ratio over lowercased alphabetic tokens
    pub ttr: f64,

    /// Average sentence length in tokens
    pub avg_sentence_len: f64,

    /// Discourse-marker occurrences
    pub discourse_markers: usize,

    /// Deictic-word occurrences
    pub deictics: usize,

    /// Multi-digit numbers plus measurement units
    pub numerics: usize,

    /// Capitalized proper-noun-like spans
    pub proper_like: usize,
}

impl PassageMetrics {
    /// Compute metrics for a passage.
    pub fn analyze(text: &str) -> Self {
        let t = text.trim();
        let words: Vec<&str> = RE_WORD.find_iter(t).map(|m| m.as_str()).collect();
        let tokens = words.len();
        let sentences = RE_SENTENCE_END.find_iter(t).count().max(1);
        let paragraphs = t.split("\n\n").filter(|p| !p.trim().is_empty()).count().max(1);

        let lower: Vec<String> = words
            .iter()
            .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
            .map(|w| w.to_ascii_lowercase())
            .collect();
        let unique: HashSet<&str> = lower.iter().map(String::as_str).collect();
        let ttr = if lower.is_empty() {
            0.0
        } else {
            unique.len() as f64 / lower.len() as f64
        };

        let discourse_markers = lower
            .iter()
            .filter(|w| DISCOURSE_MARKERS.contains(&w.as_str()))
            .count();
        let deictics = lower
            .iter()
            .filter(|w| DEICTICS.contains(&w.as_str()))
            .count();

        let numerics = RE_NUMBERY.find_iter(t).count() + RE_UNIT.find_iter(t).count();
        let proper_like = RE_PROPER_LIKE.find_iter(t).count();

        Self {
            tokens,
            sentences,
            paragraphs,
            ttr,
            avg_sentence_len: tokens as f64 / sentences as f64,
            discourse_markers,
            deictics,
            numerics,
            proper_like,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_counts() {
        let m = PassageMetrics::analyze("One two three. Four five! Six?");
        assert_eq!(m.tokens, 6);
        assert_eq!(m.sentences, 3);
        assert_eq!(m.paragraphs, 1);
        assert!((m.avg_sentence_len - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_discourse_and_deictics() {
        let m = PassageMetrics::analyze(
            "However, this matters. Therefore, those ideas persist. Thus it grows.",
        );
        assert_eq!(m.discourse_markers, 3);
        assert!(m.deictics >= 3);
    }

    #[test]
    fn test_numerics_and_units() {
        let m = PassageMetrics::analyze("In 2019, rates rose 45% over 12 km of track.");
        assert!(m.numerics >= 4);
    }

    #[test]
    fn test_empty_passage() {
        let m = PassageMetrics::analyze("");
        assert_eq!(m.tokens, 0);
        assert_eq!(m.sentences, 1);
        assert_eq!(m.ttr, 0.0);
    }

    #[test]
    fn test_paragraph_count() {
        let m = PassageMetrics::analyze("First paragraph here.\n\nSecond one here.");
        assert_eq!(m.paragraphs, 2);
    }
}

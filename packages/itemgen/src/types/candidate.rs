//! Classifier output types.

use serde::{Deserialize, Serialize};

/// One candidate item type proposed for a passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateType {
    /// Item-type code (e.g., "RC25")
    #[serde(rename = "type")]
    pub type_code: String,

    /// Confidence that the passage supports this type, in [0, 1]
    pub fit: f64,

    /// Concise rationale (clipped to 200 chars)
    pub reason: String,

    /// Brief solving-preparation hint, or "-" if none
    pub prep_hint: String,
}

impl CandidateType {
    /// Create a candidate, clamping fit and clipping the text fields.
    pub fn new(
        type_code: impl Into<String>,
        fit: f64,
        reason: impl Into<String>,
        prep_hint: impl Into<String>,
    ) -> Self {
        let reason: String = reason.into();
        let hint: String = prep_hint.into();
        let hint = hint.trim();
        Self {
            type_code: type_code.into(),
            fit: fit.clamp(0.0, 1.0),
            reason: clip(&reason, 200),
            prep_hint: if hint.is_empty() {
                "-".to_string()
            } else {
                clip(hint, 200)
            },
        }
    }
}

/// Clip a string to at most `max` characters.
pub(crate) fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Candidate counts per scorer source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub llm: usize,
    pub rule: usize,
}

/// Metadata describing how a classification was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMeta {
    /// Length band the passage fell into
    pub band: String,

    /// Whether the length gate filtered the final ranking
    pub gate_applied: bool,

    /// Whitespace token count of the (sanitized) passage
    pub tokens: usize,

    /// Candidate counts per source
    pub sources: SourceCounts,
}

/// Result of classifying a passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Full merged ranking, fit-descending
    pub candidates: Vec<CandidateType>,

    /// Top type codes (1..=5), fit-descending
    pub top: Vec<String>,

    /// How the ranking was produced
    pub meta: ClassificationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_clamps_and_clips() {
        let long_reason = "x".repeat(500);
        let c = CandidateType::new("RC25", 1.7, long_reason, "  ");
        assert_eq!(c.fit, 1.0);
        assert_eq!(c.reason.chars().count(), 200);
        assert_eq!(c.prep_hint, "-");

        let c = CandidateType::new("RC25", -0.2, "r", "hint");
        assert_eq!(c.fit, 0.0);
        assert_eq!(c.prep_hint, "hint");
    }
}

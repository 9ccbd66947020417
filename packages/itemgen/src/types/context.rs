//! Per-attempt generation context.

use serde::{Deserialize, Serialize};

/// Target difficulty for a generated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Parse a difficulty label; anything unrecognized falls back to medium.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// Inputs to one generation attempt.
///
/// Constructed fresh for each attempt and never mutated; retries build a
/// new context rather than editing this one.
#[derive(Debug, Clone)]
pub struct GenContext {
    /// Resolved item-type code (e.g., "RC31", "RC41_42", "LC03")
    pub item_id: String,

    /// Target difficulty
    pub difficulty: Difficulty,

    /// Topic code, or "random" to let the model pick
    pub topic: String,

    /// Source passage; empty means the model invents content
    pub passage: String,

    /// Vocabulary profile label, when the prompt template declares one
    pub vocab_profile: Option<String>,
}

impl GenContext {
    /// Create a context for the given item code with defaults.
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            difficulty: Difficulty::default(),
            topic: "random".to_string(),
            passage: String::new(),
            vocab_profile: None,
        }
    }

    /// Set the passage.
    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = passage.into();
        self
    }

    /// Set the difficulty.
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the topic code.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Whether a caller-supplied passage is present.
    pub fn has_passage(&self) -> bool {
        !self.passage.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("easy"), Difficulty::Easy);
        assert_eq!(Difficulty::parse("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::parse("whatever"), Difficulty::Medium);
        assert_eq!(Difficulty::parse(""), Difficulty::Medium);
    }

    #[test]
    fn test_context_builder() {
        let ctx = GenContext::new("RC22")
            .with_passage("Some text.")
            .with_difficulty(Difficulty::Hard)
            .with_topic("science");

        assert_eq!(ctx.item_id, "RC22");
        assert!(ctx.has_passage());
        assert_eq!(ctx.difficulty.as_str(), "hard");
        assert_eq!(ctx.topic, "science");
    }
}

//! Typed errors for the item generation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur during item generation operations.
#[derive(Debug, Error)]
pub enum ItemGenError {
    /// No structured data could be recovered from model output.
    ///
    /// Carries the cleaned text for diagnostics.
    #[error("no JSON object found in model response")]
    Recovery { cleaned: String },

    /// Chat-completion backend unavailable or failed
    #[error("LLM backend error: {0}")]
    Llm(String),

    /// LLM call exceeded its deadline
    #[error("LLM call timed out after {timeout_s}s")]
    Timeout { timeout_s: f64 },

    /// Model output does not satisfy an item schema
    #[error("validation failed: {0}")]
    Validation(String),

    /// Prompt could not be constructed
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for item generation operations.
pub type Result<T> = std::result::Result<T, ItemGenError>;

//! Error types for the chat-completion client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, LlmClientError>;

/// Chat-completion client errors.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error: {0}")]
    Api(String),

    /// Parse error (unexpected response shape)
    #[error("Parse error: {0}")]
    Parse(String),
}

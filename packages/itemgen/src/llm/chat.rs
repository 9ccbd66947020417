//! Chat-completion abstraction the pipeline depends on.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::config::CallBudget;

/// Parameters for one chat-completion round trip.
#[derive(Debug, Clone, Copy)]
pub struct LlmParams {
    /// Sampling temperature (callers may pass up to 1.0)
    pub temperature: f32,

    /// Completion token cap
    pub max_tokens: u32,

    /// Deadline for the whole round trip
    pub timeout_s: f64,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 4000,
            timeout_s: 30.0,
        }
    }
}

impl From<CallBudget> for LlmParams {
    fn from(budget: CallBudget) -> Self {
        Self {
            temperature: budget.temperature,
            max_tokens: budget.max_tokens,
            timeout_s: budget.timeout_s,
        }
    }
}

impl LlmParams {
    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the deadline.
    pub fn with_timeout_s(mut self, timeout_s: f64) -> Self {
        self.timeout_s = timeout_s;
        self
    }
}

/// Chat-completion collaborator.
///
/// Implementations wrap a specific LLM vendor and return the model's text
/// verbatim — they must not pre-validate the JSON-ness of their own
/// output. The pipeline treats the backend as a stateless external
/// service; resilience (retry, JSON recovery) lives in the call wrapper.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One system+user round trip returning the raw completion text.
    async fn complete(&self, system: &str, user: &str, params: &LlmParams) -> Result<String>;
}

//! `ChatModel` implementation backed by the `llm-client` crate.

use std::time::Duration;

use async_trait::async_trait;
use llm_client::{ChatRequest, LlmClient, Message};

use crate::error::{ItemGenError, Result};
use crate::llm::chat::{ChatModel, LlmParams};

/// Chat-completion backend using an OpenAI-compatible REST endpoint.
#[derive(Clone)]
pub struct OpenAiChat {
    client: LlmClient,
    model: String,
}

impl OpenAiChat {
    /// Create a backend with the given client and model name.
    pub fn new(client: LlmClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Create from environment (`LLM_API_KEY`), defaulting to gpt-4o-mini.
    pub fn from_env() -> Result<Self> {
        let client = LlmClient::from_env().map_err(|e| ItemGenError::Config(e.to_string()))?;
        Ok(Self::new(client, "gpt-4o-mini"))
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str, params: &LlmParams) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .message(Message::system(system))
            .message(Message::user(user))
            .temperature(params.temperature)
            .max_tokens(params.max_tokens);

        let response = self
            .client
            .chat_completion_with_timeout(
                request,
                Some(Duration::from_secs_f64(params.timeout_s)),
            )
            .await
            .map_err(|e| ItemGenError::Llm(e.to_string()))?;

        Ok(response.content)
    }
}

//! Testing utilities including a scriptable mock chat backend.
//!
//! Useful for exercising the pipeline without real LLM calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ItemGenError, Result};
use crate::llm::chat::{ChatModel, LlmParams};

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// A mock chat backend for testing.
///
/// Replies are resolved in order: queued sequence first, then the first
/// prompt-substring rule that matches, then the default reply. Substring
/// rules match against the user prompt.
#[derive(Default)]
pub struct MockModel {
    /// One-shot replies consumed in order
    sequence: Arc<Mutex<VecDeque<String>>>,

    /// (substring, reply) rules, first match wins
    rules: Arc<Mutex<Vec<(String, String)>>>,

    /// Substrings that trigger a transport error
    fail_on: Arc<Mutex<Vec<String>>>,

    /// Fallback reply
    default_reply: Arc<Mutex<String>>,

    /// Call tracking for assertions
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockModel {
    /// Create a mock with an empty-object default reply.
    pub fn new() -> Self {
        Self {
            default_reply: Arc::new(Mutex::new("{}".to_string())),
            ..Default::default()
        }
    }

    /// Set the fallback reply.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        *self.default_reply.lock().unwrap() = reply.into();
        self
    }

    /// Queue one-shot replies consumed before any rules apply.
    pub fn with_reply_sequence(self, replies: Vec<String>) -> Self {
        self.sequence.lock().unwrap().extend(replies);
        self
    }

    /// Reply with `reply` whenever the user prompt contains `substring`.
    pub fn with_reply(self, substring: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((substring.into(), reply.into()));
        self
    }

    /// Fail with a transport error whenever the user prompt contains `substring`.
    pub fn with_failure(self, substring: impl Into<String>) -> Self {
        self.fail_on.lock().unwrap().push(substring.into());
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn complete(&self, system: &str, user: &str, params: &LlmParams) -> Result<String> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            user: user.to_string(),
            temperature: params.temperature,
        });

        if self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|s| user.contains(s.as_str()))
        {
            return Err(ItemGenError::Llm("mock transport failure".into()));
        }

        if let Some(reply) = self.sequence.lock().unwrap().pop_front() {
            return Ok(reply);
        }

        if let Some((_, reply)) = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(substring, _)| user.contains(substring.as_str()))
        {
            return Ok(reply.clone());
        }

        Ok(self.default_reply.lock().unwrap().clone())
    }
}

//! Chat-completion trait seam and resilient JSON call wrapper.

pub mod chat;
pub mod wrapper;

#[cfg(feature = "openai")]
pub mod openai;

pub use chat::{ChatModel, LlmParams};
pub use wrapper::call_llm_json;

#[cfg(feature = "openai")]
pub use openai::OpenAiChat;

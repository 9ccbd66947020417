//! Exam Item Generation Pipeline
//!
//! Generates structured multiple-choice exam items by orchestrating a
//! chat-completion backend, validating and repairing the model's JSON
//! output against strict per-item-type schemas, and recommending which
//! item types a free-text passage supports.
//!
//! # Design
//!
//! - Resilience lives at the seams: the recovery parser tolerates the
//!   model's imperfect JSON, the call wrapper retries with backoff and
//!   degrades to a sentinel, and the orchestrator isolates per-item
//!   failures so a batch partially succeeds.
//! - Behavior is polymorphic, data is not: one `ItemSpec` implementation
//!   per item family behind a registry; unknown codes resolve to a
//!   usable fallback instead of failing.
//! - No shared mutable state: the registry, prompt library, and
//!   configuration are built once and shared read-only.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use itemgen::{Classifier, Generator, GenerationConfig, PromptLibrary, SpecRegistry};
//! use itemgen::llm::OpenAiChat;
//!
//! let model = Arc::new(OpenAiChat::from_env()?);
//! let config = Arc::new(GenerationConfig::default());
//! let registry = Arc::new(SpecRegistry::standard(Arc::new(PromptLibrary::builtin())));
//!
//! let classifier = Classifier::new(model.clone(), config.clone());
//! let suggestion = classifier.suggest_types(&passage, 5).await;
//!
//! let generator = Generator::new(model, registry, config);
//! let items = generator.generate_items(&passage, &suggestion.top, 1, None, None).await;
//! ```
//!
//! # Modules
//!
//! - [`recovery`] - JSON recovery parser for imperfect model output
//! - [`llm`] - Chat-completion trait seam and resilient call wrapper
//! - [`sanitize`] - Passage markup sanitizer and semantic repair
//! - [`classify`] - Rule/LLM classifier ensemble with length gating
//! - [`spec`] - Per-type specification contract and registry
//! - [`prompts`] - Prompt library and assembly
//! - [`pipeline`] - Batch orchestrator and its adapters
//! - [`testing`] - Mock chat backend for tests

pub mod classify;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod recovery;
pub mod sanitize;
pub mod spec;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use classify::Classifier;
pub use error::{ItemGenError, Result};
pub use llm::{ChatModel, LlmParams};
pub use pipeline::Generator;
pub use prompts::{PromptLibrary, PromptTemplate};
pub use recovery::recover_json;
pub use spec::{ItemSpec, SpecRegistry};
pub use types::{
    CandidateType, ClassificationMeta, ClassificationResult, Difficulty, EnvelopeMeta,
    GenContext, GenerationConfig, GenerationMode, ItemEnvelope,
};

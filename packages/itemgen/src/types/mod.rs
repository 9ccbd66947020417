//! Domain types for classification and generation.

pub mod candidate;
pub mod config;
pub mod context;
pub mod envelope;

pub use candidate::{CandidateType, ClassificationMeta, ClassificationResult, SourceCounts};
pub use config::GenerationConfig;
pub use context::{Difficulty, GenContext};
pub use envelope::{EnvelopeMeta, FailureDetail, GenerationMode, ItemEnvelope};

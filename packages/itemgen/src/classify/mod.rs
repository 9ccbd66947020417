//! Type-classification ensemble.
//!
//! Scores candidate item types for a passage by combining a deterministic
//! rule-based scorer with an LLM-based scorer, merged by weighted sum and
//! filtered through a length-derived eligibility gate.

pub mod gate;
pub mod metrics;
pub mod router;
pub mod rules;
pub mod signals;

pub use gate::Band;
pub use metrics::PassageMetrics;
pub use router::Classifier;
pub use rules::rule_based_candidates;

//! Item specification contract and registry.
//!
//! One `ItemSpec` implementation per item-type family; a registry maps
//! string codes to long-lived instances shared read-only across
//! concurrent calls. Unknown codes resolve to a generic fallback rather
//! than failing resolution.

pub mod blank;
pub mod chart;
pub mod listening;
pub mod mcq;
pub mod registry;
pub mod set;
pub mod underline;
pub mod util;

pub use mcq::{McqFamily, McqModel, StandardMcqSpec};
pub use registry::SpecRegistry;

use serde_json::Value;

use crate::error::{ItemGenError, Result};
use crate::types::GenContext;

/// Bounded repair/retry budget a specification grants one attempt.
#[derive(Debug, Clone, Copy)]
pub struct RepairBudget {
    /// Repair-and-revalidate rounds after a failed validation
    pub fixer: u32,

    /// Strict regeneration rounds after repair is exhausted
    pub regen: u32,

    /// Per-call deadline in seconds
    pub timeout_s: f64,
}

impl Default for RepairBudget {
    fn default() -> Self {
        Self {
            fixer: 1,
            regen: 1,
            timeout_s: 15.0,
        }
    }
}

/// Per-item-type specification.
///
/// Stateless configuration object: owns behavior, never data. The
/// registry and orchestrator depend only on this trait.
pub trait ItemSpec: Send + Sync {
    /// Item-type code this specification serves.
    fn id(&self) -> &str;

    /// System prompt for the generic generation path.
    fn system_prompt(&self) -> String;

    /// Build the user prompt for a generation context.
    fn build_prompt(&self, ctx: &GenContext) -> Result<String>;

    /// Coerce loosely-structured model output toward the schema.
    fn normalize(&self, data: Value) -> Result<Value>;

    /// Check the normalized data against the item schema.
    fn validate(&self, data: &Value) -> Result<()>;

    /// Best-effort deterministic repair between validation attempts.
    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        data
    }

    /// Non-schema advisory checks; any returned issue fails the attempt
    /// at the orchestrator boundary.
    fn self_checks(&self, _data: &Value, _ctx: &GenContext) -> Vec<String> {
        Vec::new()
    }

    /// JSON Schema embedded in fixer/regeneration prompts.
    fn json_schema(&self) -> Value;

    /// Repair budget for one generation attempt.
    fn repair_budget(&self) -> RepairBudget {
        RepairBudget::default()
    }

    // ---- quote sub-protocol -------------------------------------------

    /// Whether this specification supports quote-mode generation.
    fn has_quote_support(&self) -> bool {
        false
    }

    /// Build the quote-mode prompt over a verbatim passage.
    fn quote_build_prompt(&self, _passage: &str) -> Result<String> {
        Err(ItemGenError::Prompt(format!(
            "{} does not support quote mode",
            self.id()
        )))
    }

    /// Turn the model's quote-mode reply into a finished item.
    fn quote_postprocess(&self, _passage: &str, _reply: &Value) -> Result<Value> {
        Err(ItemGenError::Prompt(format!(
            "{} does not support quote mode",
            self.id()
        )))
    }

    /// Validate a finished quote-mode item.
    fn quote_validate(&self, _item: &Value) -> Result<()> {
        Ok(())
    }
}

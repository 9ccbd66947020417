//! Per-item result envelope for batch generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed user-facing message attached to every failed item.
pub const FAILURE_MESSAGE: &str = "Generation failed. Please try again.";

/// Maximum length of the technical failure detail.
pub const MAX_DETAIL_CHARS: usize = 300;

/// How an item was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Passage reproduced essentially verbatim; only markup inserted
    Quote,
    /// Generic spec-driven path (model may invent content)
    Generated,
}

/// Bounded technical detail carried by a failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub detail: String,
}

/// Envelope metadata for one (type x repetition) attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Requested type code as the caller supplied it
    #[serde(rename = "type")]
    pub type_code: String,

    /// Resolved item code the registry mapped the request to
    pub item_id: String,

    /// Batch seed, when the caller supplied one
    pub seed: Option<u64>,

    /// Generation mode (absent for failures before a mode was chosen)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<GenerationMode>,
}

/// Result of one generation attempt.
///
/// Append-only: once pushed to a batch result list an envelope is never
/// mutated. A batch never errors as a whole; callers branch on `ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEnvelope {
    pub ok: bool,

    /// The validated item payload (present iff `ok`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,

    /// Fixed user-facing message (present iff not `ok`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Bounded technical detail (present iff not `ok`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,

    pub meta: EnvelopeMeta,
}

impl ItemEnvelope {
    /// Build a success envelope.
    pub fn success(item: Value, meta: EnvelopeMeta) -> Self {
        Self {
            ok: true,
            item: Some(item),
            message: None,
            error: None,
            meta,
        }
    }

    /// Build a failure envelope with the detail clipped to 300 chars.
    pub fn failure(meta: EnvelopeMeta, detail: impl Into<String>) -> Self {
        let detail: String = detail.into();
        Self {
            ok: false,
            item: None,
            message: Some(FAILURE_MESSAGE.to_string()),
            error: Some(FailureDetail {
                detail: detail.chars().take(MAX_DETAIL_CHARS).collect(),
            }),
            meta,
        }
    }
}

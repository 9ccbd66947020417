//! Passage markup sanitizer.
//!
//! Strips item-authoring markup (circled-numeral position markers,
//! underline spans, runs of blank-indicator underscores) from a
//! user-supplied passage, collecting enough structural metadata for a
//! follow-up LLM call to restore exactly one intentionally-altered token
//! and fill every blank coherently.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::llm::{call_llm_json, ChatModel, LlmParams};
use crate::types::GenerationConfig;

static RE_UNDERLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(u|ins)\b[^>]*>").unwrap());
static RE_SPAN_UNDERLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<span\b[^>]*style=['"][^'"]*text-decoration\s*:\s*underline[^'"]*['"][^>]*>"#)
        .unwrap()
});
static RE_SPAN_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</span\s*>").unwrap());
static RE_CIRCLED_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*[①②③④⑤]\s*\)").unwrap());
static RE_CIRCLED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[①②③④⑤]").unwrap());
static RE_INLINE_MARKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([①②③④⑤])\s*([^\s)»”"',.;:()]+(?:\s+[^\s)»”"',.;:()]+){0,6})?"#).unwrap()
});
static RE_BLANK_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{3,}").unwrap());
static RE_BLANK_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<<BLANK_\d+>>").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// A phrase that carried a circled-numeral marker in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedCandidate {
    pub mark: char,
    pub phrase: String,
}

/// Structural metadata collected while sanitizing.
#[derive(Debug, Clone, Default)]
pub struct SanitizeMeta {
    /// Marker-adjacent phrases, in order of appearance
    pub candidates: Vec<MarkedCandidate>,

    /// Number of blank placeholders inserted
    pub blank_count: usize,
}

/// Strip authoring markup from a passage, collecting repair metadata.
///
/// Underline tags are removed with their text preserved; `( ① )`
/// insertion markers are dropped; circled numerals are removed while the
/// adjacent phrase survives (and is recorded as a repair candidate); runs
/// of three or more underscores become `<<BLANK_n>>` tokens.
pub fn sanitize_markup(text: &str) -> (String, SanitizeMeta) {
    let mut meta = SanitizeMeta::default();

    let s = RE_UNDERLINE_TAG.replace_all(text, "");
    let s = RE_SPAN_UNDERLINE.replace_all(&s, "");
    let s = RE_SPAN_CLOSE.replace_all(&s, "");
    let s = RE_CIRCLED_PAREN.replace_all(&s, "");

    // Drop each marker but keep the phrase it annotated.
    let s = RE_INLINE_MARKED
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let mark = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let phrase = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            if !phrase.is_empty() {
                meta.candidates.push(MarkedCandidate {
                    mark: mark.chars().next().unwrap_or('①'),
                    phrase: phrase.to_string(),
                });
            }
            phrase.to_string()
        })
        .to_string();

    // Residual bare markers (safety net)
    let s = RE_CIRCLED.replace_all(&s, "");

    let mut blank_idx = 0usize;
    let s = RE_BLANK_UNDERSCORE
        .replace_all(&s, |_: &regex::Captures<'_>| {
            blank_idx += 1;
            format!("<<BLANK_{blank_idx}>>")
        })
        .to_string();
    meta.blank_count = blank_idx;

    let s = RE_MULTI_SPACE.replace_all(&s, " ").trim().to_string();
    (s, meta)
}

/// Sanitize without semantic repair; feeds the classifier.
pub fn sanitize_passage(text: &str) -> String {
    sanitize_markup(text).0
}

const REPAIR_SYSTEM: &str = "You are a careful English editor for exam passages.\n\
TASK:\n\
1) Exactly ONE of the previously marked candidate phrases was wrong. Replace ONLY that one with a contextually and grammatically correct alternative.\n\
2) Fill every placeholder token <<BLANK_n>> with a suitable word/phrase/sentence that fits the context and grammar.\n\
3) Do NOT add or remove other content. Keep length and meaning as close as possible to the original, aside from the required fixes.\n\
4) Output JSON ONLY, no code fences: {\"passage\": \"...\"}\n\
5) Do NOT re-introduce any markers or placeholder tokens.";

/// One LLM call restoring a sanitized passage to coherent prose.
///
/// If the model returns nothing usable, the fallback strips the
/// placeholder tokens and returns the partially-clean text rather than
/// failing the whole pipeline.
pub async fn repair_semantics(
    model: &dyn ChatModel,
    config: &GenerationConfig,
    clean_text: &str,
    meta: &SanitizeMeta,
) -> String {
    let candidate_preview = if meta.candidates.is_empty() {
        "-".to_string()
    } else {
        meta.candidates
            .iter()
            .map(|c| format!("{}:{}", c.mark, c.phrase))
            .collect::<Vec<_>>()
            .join("; ")
    };

    let user = format!(
        "PASSAGE (markers removed, placeholders present):\n{clean_text}\n\n\
         Candidates previously marked (for your reference): {candidate_preview}\n\
         Number of placeholders to fill: {}\n\
         Return JSON only: {{\"passage\": \"<final fixed passage>\"}}",
        meta.blank_count
    );

    let params = LlmParams::from(config.repair_budget);
    let reply = call_llm_json(
        model,
        REPAIR_SYSTEM,
        &user,
        &params,
        config.llm_retries,
        config.llm_backoff_s,
    )
    .await;

    match reply.get("passage").and_then(Value::as_str) {
        Some(fixed) if !fixed.trim().is_empty() => fixed.trim().to_string(),
        _ => {
            debug!("semantic repair returned nothing usable, stripping placeholders");
            RE_BLANK_TOKEN.replace_all(clean_text, "").trim().to_string()
        }
    }
}

/// Sanitize a passage and repair its semantics for reuse in quote mode.
pub async fn retarget_passage(
    model: &dyn ChatModel,
    config: &GenerationConfig,
    passage: &str,
) -> String {
    let (clean, meta) = sanitize_markup(passage);
    if meta.candidates.is_empty() && meta.blank_count == 0 {
        return clean;
    }
    repair_semantics(model, config, &clean, &meta).await
}

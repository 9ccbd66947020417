//! Listening-comprehension specification.
//!
//! Items carry a dialogue/monologue transcript instead of a passage.
//! Transcripts arrive in assorted shapes (one string, a line array, or
//! speaker objects) and are coerced to speaker-tagged lines.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::spec::util::{answer_to_index, coerce_mcq_like};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

/// Schema for listening items.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListeningModel {
    pub question: String,
    pub transcript: String,
    pub options: Vec<String>,
    /// 1-based option number
    pub correct_answer: u8,
    pub explanation: String,
}

const TRANSCRIPT_ALIASES: &[&str] = &["transcript", "dialogue", "script", "audio_script"];

static RE_SPEAKER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+((?:M|W|Man|Woman|A|B)\s*:)").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Coerce assorted transcript shapes into one speaker-tagged string.
pub fn coerce_transcript(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Object(o) => {
                        let speaker = o.get("speaker").and_then(Value::as_str).unwrap_or("").trim();
                        let text = o.get("text").and_then(Value::as_str).unwrap_or("").trim();
                        if text.is_empty() {
                            None
                        } else if speaker.is_empty() {
                            Some(text.to_string())
                        } else {
                            Some(format!("{speaker}: {text}"))
                        }
                    }
                    _ => None,
                })
                .filter(|l| !l.is_empty())
                .collect();
            lines.join("\n")
        }
        Value::Object(o) => {
            for key in ["dialogue", "lines", "utterances"] {
                if let Some(inner) = o.get(key) {
                    if inner.is_array() {
                        return coerce_transcript(inner);
                    }
                }
            }
            ["speaker", "text", "context", "content"]
                .iter()
                .filter_map(|k| o.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => String::new(),
    }
}

/// Restore line breaks before speaker tags in a flattened transcript.
pub fn ensure_dialogue_newlines(text: &str) -> String {
    let s = text.trim();
    if s.contains('\n') {
        return s.to_string();
    }
    let s = RE_MULTI_SPACE.replace_all(s, " ");
    RE_SPEAKER_TAG.replace_all(&s, "\n$1").to_string()
}

/// Listening-item specification shared by the LC codes.
pub struct ListeningSpec {
    id: &'static str,
    prompts: Arc<PromptLibrary>,
}

impl ListeningSpec {
    pub fn new(id: &'static str, prompts: Arc<PromptLibrary>) -> Self {
        Self { id, prompts }
    }
}

impl ItemSpec for ListeningSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English listening item {}. Return ONLY JSON matching the schema. \
             The transcript uses speaker tags (M:/W:), one line per turn. \
             'correct_answer' is the option number (1-5).",
            self.id
        )
    }

    fn build_prompt(&self, ctx: &GenContext) -> Result<String> {
        build_item_prompt(&self.prompts, ctx)
    }

    fn normalize(&self, data: Value) -> Result<Value> {
        let transcript_raw = if let Value::Object(map) = &data {
            TRANSCRIPT_ALIASES.iter().find_map(|k| map.get(*k)).cloned()
        } else {
            None
        };

        let coerced = coerce_mcq_like(data);
        let Value::Object(mut map) = coerced else {
            return Ok(coerced);
        };

        let transcript = transcript_raw
            .as_ref()
            .map(coerce_transcript)
            .unwrap_or_default();
        map.insert(
            "transcript".into(),
            Value::String(ensure_dialogue_newlines(&transcript)),
        );

        let options: Vec<String> = map
            .get("options")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(answer) = map.get("correct_answer").and_then(Value::as_str) {
            if let Some(index) = answer_to_index(answer, &options) {
                map.insert("correct_answer".into(), Value::Number(index.into()));
            }
        }
        Ok(Value::Object(map))
    }

    fn validate(&self, data: &Value) -> Result<()> {
        let model: ListeningModel = serde_json::from_value(data.clone())
            .map_err(|e| ItemGenError::Validation(format!("not a valid listening item: {e}")))?;

        if model.question.trim().is_empty() {
            return Err(ItemGenError::Validation("question is empty".into()));
        }
        if model.transcript.trim().is_empty() {
            return Err(ItemGenError::Validation("transcript is empty".into()));
        }
        if model.options.len() != 5 {
            return Err(ItemGenError::Validation(format!(
                "exactly 5 options required, got {}",
                model.options.len()
            )));
        }
        if !(1..=5).contains(&model.correct_answer) {
            return Err(ItemGenError::Validation(format!(
                "correct_answer must be 1-5, got {}",
                model.correct_answer
            )));
        }
        Ok(())
    }

    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        self.normalize(data).unwrap_or(Value::Null)
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(ListeningModel)).unwrap_or_else(|_| Value::Null)
    }

    fn repair_budget(&self) -> RepairBudget {
        RepairBudget::default()
    }
}

//! Standard five-option MCQ specification family.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::spec::util::{answer_to_index, coerce_mcq_like};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

/// Shared schema for single-question five-option items.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McqModel {
    pub question: String,
    pub passage: String,
    pub options: Vec<String>,
    /// 1-based option number
    pub correct_answer: u8,
    pub explanation: String,
}

/// Validate the base MCQ shape, returning the typed model.
pub fn validate_mcq(data: &Value) -> Result<McqModel> {
    let model: McqModel = serde_json::from_value(data.clone())
        .map_err(|e| ItemGenError::Validation(format!("not a valid MCQ item: {e}")))?;

    if model.question.trim().is_empty() {
        return Err(ItemGenError::Validation("question is empty".into()));
    }
    if model.passage.trim().is_empty() {
        return Err(ItemGenError::Validation("passage is empty".into()));
    }
    if model.options.len() != 5 {
        return Err(ItemGenError::Validation(format!(
            "exactly 5 options required, got {}",
            model.options.len()
        )));
    }
    if model.options.iter().any(|o| o.trim().is_empty()) {
        return Err(ItemGenError::Validation("options must be non-empty".into()));
    }
    if !(1..=5).contains(&model.correct_answer) {
        return Err(ItemGenError::Validation(format!(
            "correct_answer must be 1-5, got {}",
            model.correct_answer
        )));
    }
    Ok(model)
}

/// Shared normalization: alias coercion plus answer-index resolution.
pub fn normalize_mcq(data: Value) -> Value {
    let coerced = coerce_mcq_like(data);
    let Value::Object(mut map) = coerced else {
        return coerced;
    };

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
    Value::Object(map)
}

/// Families served by the standard MCQ specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McqFamily {
    Purpose,
    Emotion,
    Argument,
    ImplicitMeaning,
    MainPoint,
    Topic,
    Title,
    Biography,
    NoticeTrueFalse,
    NoticeMatch,
    Irrelevant,
    Ordering,
    Insertion,
    Summary,
    Generic,
}

impl McqFamily {
    fn label(&self) -> &'static str {
        match self {
            Self::Purpose => "purpose identification",
            Self::Emotion => "emotion change",
            Self::Argument => "claim identification",
            Self::ImplicitMeaning => "implicit meaning",
            Self::MainPoint => "main point",
            Self::Topic => "topic",
            Self::Title => "title",
            Self::Biography => "biographical detail",
            Self::NoticeTrueFalse => "notice detail",
            Self::NoticeMatch => "notice match",
            Self::Irrelevant => "irrelevant sentence",
            Self::Ordering => "paragraph ordering",
            Self::Insertion => "sentence insertion",
            Self::Summary => "two-slot summary",
            Self::Generic => "multiple choice",
        }
    }
}

/// Specification for the standard single-question MCQ families.
pub struct StandardMcqSpec {
    id: &'static str,
    family: McqFamily,
    prompts: Arc<PromptLibrary>,
}

impl StandardMcqSpec {
    pub fn new(id: &'static str, family: McqFamily, prompts: Arc<PromptLibrary>) -> Self {
        Self { id, family, prompts }
    }

    /// Family-specific structural requirements beyond the base schema.
    fn extra_checks(&self, model: &McqModel) -> Result<()> {
        match self.family {
            McqFamily::Irrelevant | McqFamily::Insertion => {
                let has_markers = ['①', '②', '③', '④', '⑤']
                    .iter()
                    .all(|m| model.passage.contains(*m));
                if !has_markers {
                    return Err(ItemGenError::Validation(format!(
                        "{} passage must number positions with ①-⑤",
                        self.id
                    )));
                }
            }
            McqFamily::Ordering => {
                for label in ["(A)", "(B)", "(C)"] {
                    if !model.passage.contains(label) {
                        return Err(ItemGenError::Validation(format!(
                            "{} passage must label paragraphs (A)(B)(C)",
                            self.id
                        )));
                    }
                }
            }
            McqFamily::Summary => {
                let text = format!("{} {}", model.passage, model.question);
                if !(text.contains("(A)") && text.contains("(B)")) {
                    return Err(ItemGenError::Validation(format!(
                        "{} summary must carry (A) and (B) slots",
                        self.id
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl ItemSpec for StandardMcqSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English exam item {} ({}). Return ONLY JSON matching the schema. \
             The field 'correct_answer' MUST be the option number (1-5). \
             If you provide option text it will be converted to the matching number.",
            self.id,
            self.family.label()
        )
    }

    fn build_prompt(&self, ctx: &GenContext) -> Result<String> {
        build_item_prompt(&self.prompts, ctx)
    }

    fn normalize(&self, data: Value) -> Result<Value> {
        Ok(normalize_mcq(data))
    }

    fn validate(&self, data: &Value) -> Result<()> {
        let model = validate_mcq(data)?;
        self.extra_checks(&model)
    }

    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        normalize_mcq(data)
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(McqModel)).unwrap_or_else(|_| Value::Null)
    }

    fn repair_budget(&self) -> RepairBudget {
        RepairBudget {
            fixer: 1,
            regen: 1,
            timeout_s: 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(family: McqFamily) -> StandardMcqSpec {
        StandardMcqSpec::new("RC22", family, Arc::new(PromptLibrary::builtin()))
    }

    fn valid_item() -> Value {
        json!({
            "question": "What is the main point?",
            "passage": "A passage about tides and time.",
            "options": ["one", "two", "three", "four", "five"],
            "correct_answer": 3,
            "explanation": "because",
        })
    }

    #[test]
    fn test_validate_accepts_good_item() {
        assert!(spec(McqFamily::MainPoint).validate(&valid_item()).is_ok());
    }

    #[test]
    fn test_normalize_resolves_answer_text() {
        let data = json!({
            "stem": "Q?",
            "passage": "P.",
            "choices": ["one", "two", "three", "four", "five"],
            "answer": "three",
            "rationale": "why",
        });
        let normalized = spec(McqFamily::MainPoint).normalize(data).unwrap();
        assert_eq!(normalized["correct_answer"], 3);
        assert_eq!(normalized["question"], "Q?");
    }

    #[test]
    fn test_normalize_maps_circled_glyph() {
        let mut item = valid_item();
        item["correct_answer"] = json!("④");
        let normalized = spec(McqFamily::MainPoint).normalize(item).unwrap();
        assert_eq!(normalized["correct_answer"], 4);
    }

    #[test]
    fn test_validate_rejects_wrong_option_count() {
        let mut item = valid_item();
        item["options"] = json!(["a", "b", "c"]);
        let err = spec(McqFamily::MainPoint).validate(&item).unwrap_err();
        assert!(err.to_string().contains("5 options"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_answer() {
        let mut item = valid_item();
        item["correct_answer"] = json!(9);
        assert!(spec(McqFamily::MainPoint).validate(&item).is_err());
    }

    #[test]
    fn test_insertion_family_requires_markers() {
        let mut item = valid_item();
        assert!(spec(McqFamily::Insertion).validate(&item).is_err());

        item["passage"] = json!("Lead. ( ① ) a ( ② ) b ( ③ ) c ( ④ ) d ( ⑤ ) end.");
        assert!(spec(McqFamily::Insertion).validate(&item).is_ok());
    }

    #[test]
    fn test_ordering_family_requires_labels() {
        let mut item = valid_item();
        item["passage"] = json!("Lead sentence. (A) first (B) second (C) third");
        assert!(spec(McqFamily::Ordering).validate(&item).is_ok());

        item["passage"] = json!("Lead sentence without labels.");
        assert!(spec(McqFamily::Ordering).validate(&item).is_err());
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = spec(McqFamily::MainPoint).json_schema();
        let required = schema["required"].as_array().unwrap();
        let names: Vec<&str> = required.iter().filter_map(Value::as_str).collect();
        assert!(names.contains(&"question"));
        assert!(names.contains(&"correct_answer"));
    }
}

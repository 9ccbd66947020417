//! Multi-question set specification (long passage, two or three items).
//!
//! Sets are costlier to retry than single questions, so normalization is
//! lenient: missing members are filled with skeleton questions rather
//! than failing the whole payload, and the budget leans on regeneration.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::spec::util::{standardize_answer, tidy_options};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

/// One member question of a set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetQuestion {
    pub question_number: u8,
    pub question: String,
    pub options: Vec<String>,
    /// 1-based option number
    pub correct_answer: u8,
    pub explanation: String,
}

/// Set payload: shared instruction and passage plus member questions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetModel {
    pub set_instruction: String,
    pub passage: String,
    pub questions: Vec<SetQuestion>,
}

/// Set specification over a contiguous block of question numbers.
pub struct SetSpec {
    id: &'static str,
    members: &'static [u8],
    prompts: Arc<PromptLibrary>,
}

impl SetSpec {
    pub fn new(id: &'static str, members: &'static [u8], prompts: Arc<PromptLibrary>) -> Self {
        Self { id, members, prompts }
    }

    fn default_instruction(&self) -> String {
        let first = self.members.first().copied().unwrap_or(1);
        let last = self.members.last().copied().unwrap_or(first);
        format!("[{first}~{last}] Read the passage and answer the questions.")
    }

    fn skeleton_question(&self, number: u8) -> SetQuestion {
        let is_first = self.members.first() == Some(&number);
        let question = if is_first {
            "Which is the best title for the passage?".to_string()
        } else {
            "Which statement agrees with the passage?".to_string()
        };
        SetQuestion {
            question_number: number,
            question,
            options: (1..=5).map(|i| format!("Option {i}")).collect(),
            correct_answer: 1,
            explanation: String::new(),
        }
    }

    fn normalize_question(&self, index: usize, raw: &Value) -> Option<SetQuestion> {
        let obj = raw.as_object()?;
        let number = obj
            .get("question_number")
            .and_then(Value::as_u64)
            .map(|n| n as u8)
            .or_else(|| self.members.get(index).copied())?;

        let mut options: Vec<String> = obj
            .get("options")
            .map(tidy_options)
            .unwrap_or_default()
            .into_iter()
            .take(5)
            .collect();
        while options.len() < 5 {
            options.push(format!("Option {}", options.len() + 1));
        }

        let answer = obj
            .get("correct_answer")
            .map(standardize_answer)
            .unwrap_or_default();
        let correct_answer = answer
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=5).contains(n))
            .unwrap_or(1);

        Some(SetQuestion {
            question_number: number,
            question: obj
                .get("question")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            options,
            correct_answer,
            explanation: obj
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
    }
}

impl ItemSpec for SetSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English exam reading SET {}. Return ONLY JSON; no markdown. \
             Use ONLY the provided passage for content. Do NOT invent a new passage. \
             Produce one question object per member number. If markers are missing, \
             still produce consistent questions; do not rewrite the passage.",
            self.id
        )
    }

    fn build_prompt(&self, ctx: &GenContext) -> Result<String> {
        // Member codes (RC41 alone) still prompt with the set template.
        let mut ctx = ctx.clone();
        ctx.item_id = self.id.to_string();
        build_item_prompt(&self.prompts, &ctx)
    }

    fn normalize(&self, data: Value) -> Result<Value> {
        let Value::Object(map) = data else {
            return Err(ItemGenError::Validation("output must be a JSON object".into()));
        };

        let questions_raw = map
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| ItemGenError::Validation("questions must be a list".into()))?;

        let mut questions: Vec<SetQuestion> = questions_raw
            .iter()
            .take(self.members.len())
            .enumerate()
            .filter_map(|(i, q)| self.normalize_question(i, q))
            .filter(|q| self.members.contains(&q.question_number))
            .collect();

        // Fill any missing member with a skeleton rather than failing.
        for member in self.members {
            if !questions.iter().any(|q| q.question_number == *member) {
                questions.push(self.skeleton_question(*member));
            }
        }
        questions.sort_by_key(|q| q.question_number);

        let mut out = Map::new();
        out.insert(
            "set_instruction".into(),
            Value::String(
                map.get("set_instruction")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_instruction()),
            ),
        );
        out.insert(
            "passage".into(),
            Value::String(
                map.get("passage")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            ),
        );
        out.insert("questions".into(), serde_json::to_value(questions)?);
        Ok(Value::Object(out))
    }

    fn validate(&self, data: &Value) -> Result<()> {
        let model: SetModel = serde_json::from_value(data.clone())
            .map_err(|e| ItemGenError::Validation(format!("not a valid set payload: {e}")))?;

        if model.passage.trim().is_empty() {
            return Err(ItemGenError::Validation("passage is required".into()));
        }
        for member in self.members {
            let q = model
                .questions
                .iter()
                .find(|q| q.question_number == *member)
                .ok_or_else(|| {
                    ItemGenError::Validation(format!("question {member} missing from set"))
                })?;
            if q.options.len() != 5 {
                return Err(ItemGenError::Validation(format!(
                    "question {member} must carry 5 options"
                )));
            }
            if !(1..=5).contains(&q.correct_answer) {
                return Err(ItemGenError::Validation(format!(
                    "question {member} correct_answer must be 1-5"
                )));
            }
        }
        Ok(())
    }

    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        self.normalize(data).unwrap_or(Value::Null)
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(SetModel)).unwrap_or_else(|_| Value::Null)
    }

    fn repair_budget(&self) -> RepairBudget {
        // Sets regenerate rather than patch; give the rounds more room.
        RepairBudget {
            fixer: 1,
            regen: 2,
            timeout_s: 25.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> SetSpec {
        SetSpec::new("RC41_42", &[41, 42], Arc::new(PromptLibrary::builtin()))
    }

    #[test]
    fn test_normalize_fills_missing_member() {
        let data = json!({
            "passage": "A long passage.",
            "questions": [
                {
                    "question_number": 41,
                    "question": "Best title?",
                    "options": ["a", "b", "c", "d", "e"],
                    "correct_answer": "2",
                    "explanation": "x",
                }
            ]
        });
        let out = spec().normalize(data).unwrap();
        let questions = out["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1]["question_number"], 42);
        assert!(spec().validate(&out).is_ok());
    }

    #[test]
    fn test_normalize_pads_short_options() {
        let data = json!({
            "passage": "P.",
            "questions": [
                {"question_number": 41, "question": "Q41", "options": ["only", "two"],
                 "correct_answer": 1, "explanation": ""},
                {"question_number": 42, "question": "Q42", "options": ["a","b","c","d","e"],
                 "correct_answer": "⑤", "explanation": ""}
            ]
        });
        let out = spec().normalize(data).unwrap();
        let q41 = &out["questions"][0];
        assert_eq!(q41["options"].as_array().unwrap().len(), 5);
        assert_eq!(out["questions"][1]["correct_answer"], 5);
    }

    #[test]
    fn test_normalize_defaults_bad_answer_to_one() {
        let data = json!({
            "passage": "P.",
            "questions": [
                {"question_number": 41, "question": "Q", "options": ["a","b","c","d","e"],
                 "correct_answer": "(e)", "explanation": ""},
            ]
        });
        let out = spec().normalize(data).unwrap();
        assert_eq!(out["questions"][0]["correct_answer"], 1);
    }

    #[test]
    fn test_validate_requires_passage() {
        let data = json!({
            "set_instruction": "x",
            "passage": "",
            "questions": [
                {"question_number": 41, "question": "Q", "options": ["a","b","c","d","e"],
                 "correct_answer": 1, "explanation": ""},
                {"question_number": 42, "question": "Q", "options": ["a","b","c","d","e"],
                 "correct_answer": 1, "explanation": ""}
            ]
        });
        assert!(spec().validate(&data).is_err());
    }

    #[test]
    fn test_normalize_rejects_missing_questions_list() {
        let data = json!({"passage": "P."});
        assert!(spec().normalize(data).is_err());
    }

    #[test]
    fn test_three_member_set() {
        let spec = SetSpec::new("RC43_45", &[43, 44, 45], Arc::new(PromptLibrary::builtin()));
        let data = json!({"passage": "P.", "questions": []});
        let out = spec.normalize(data).unwrap();
        assert_eq!(out["questions"].as_array().unwrap().len(), 3);
        assert_eq!(out["set_instruction"], "[43~45] Read the passage and answer the questions.");
    }
}

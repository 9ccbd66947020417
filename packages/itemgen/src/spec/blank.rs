//! Blank-inference specification family (word, phrase, clause, global).

use std::sync::LazyLock;
use std::sync::Arc;

use regex::Regex;
use serde_json::{json, Value};

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::spec::mcq::{normalize_mcq, validate_mcq, McqModel};
use crate::spec::util::{condense_option, replace_once};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

/// Visible blank marker used across the family.
pub const BLANK: &str = "_____";

const BLANK_QUESTION: &str = "Which of the following best completes the blank?";

static RE_LONG_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{6,}").unwrap());
static RE_UNDERLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(u|ins)\b").unwrap());

/// How much text the blank removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankWidth {
    Word,
    Phrase,
    Clause,
    Global,
}

impl BlankWidth {
    fn option_guidance(&self) -> &'static str {
        match self {
            Self::Word => "single words or short noun phrases (at most 2-3 words)",
            Self::Phrase => "short phrases",
            Self::Clause | Self::Global => "full clauses",
        }
    }
}

/// Blank-inference specification.
pub struct BlankSpec {
    id: &'static str,
    width: BlankWidth,
    prompts: Arc<PromptLibrary>,
}

impl BlankSpec {
    pub fn new(id: &'static str, width: BlankWidth, prompts: Arc<PromptLibrary>) -> Self {
        Self { id, width, prompts }
    }

    fn has_blank(s: &str) -> bool {
        s.contains(BLANK) || s.contains("<blank>")
    }

    /// Condense word-level options; wider blanks keep their text.
    fn shorten_options(&self, options: Vec<String>) -> Vec<String> {
        if self.width != BlankWidth::Word {
            return options;
        }
        let condensed: Vec<String> = options.iter().map(|o| condense_option(o, 2)).collect();
        let any_long = options.iter().any(|o| o.split_whitespace().count() > 2);
        let all_distinct =
            condensed.iter().collect::<std::collections::HashSet<_>>().len() == condensed.len();
        if any_long || all_distinct {
            condensed
        } else {
            options
        }
    }

    fn check_option_widths(&self, model: &McqModel) -> Result<()> {
        if self.width != BlankWidth::Word {
            return Ok(());
        }
        let short = model
            .options
            .iter()
            .filter(|o| o.split_whitespace().count() <= 2)
            .count();
        if short < 3 {
            return Err(ItemGenError::Validation(format!(
                "{} options should be mostly single words or short phrases",
                self.id
            )));
        }
        Ok(())
    }
}

impl ItemSpec for BlankSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English exam item {} (blank inference). Return ONLY JSON matching the schema. \
             Insert exactly ONE visible blank marker as '{}'. Do not invent multiple blanks. \
             Options should be {}.",
            self.id,
            BLANK,
            self.width.option_guidance()
        )
    }

    fn build_prompt(&self, ctx: &GenContext) -> Result<String> {
        build_item_prompt(&self.prompts, ctx)
    }

    fn normalize(&self, data: Value) -> Result<Value> {
        let normalized = normalize_mcq(data);
        let Value::Object(mut map) = normalized else {
            return Ok(normalized);
        };

        if let Some(options) = map.get("options").and_then(Value::as_array) {
            let options: Vec<String> = options
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            let shortened = self.shorten_options(options);
            map.insert(
                "options".into(),
                Value::Array(shortened.into_iter().map(Value::String).collect()),
            );
        }

        // Exactly one canonical blank marker, injected into the question
        // when the model forgot it entirely.
        let passage = map.get("passage").and_then(Value::as_str).unwrap_or("");
        let question = map.get("question").and_then(Value::as_str).unwrap_or("");
        let passage_has = Self::has_blank(passage);
        let mut question = question.replace("<blank>", BLANK);
        question = RE_LONG_UNDERSCORE.replace_all(&question, BLANK).to_string();
        if !passage_has && !Self::has_blank(&question) {
            question = if question.trim().is_empty() {
                BLANK_QUESTION.to_string()
            } else {
                format!("{} ({})", question.trim_end(), BLANK)
            };
        }
        if question.matches(BLANK).count() > 1 {
            if let Some(pos) = question.find(BLANK) {
                let (head, tail) = question.split_at(pos + BLANK.len());
                question = format!("{}{}", head, tail.replace(BLANK, ""));
            }
        }
        map.insert("question".into(), Value::String(question));
        Ok(Value::Object(map))
    }

    fn validate(&self, data: &Value) -> Result<()> {
        let model = validate_mcq(data)?;
        if !Self::has_blank(&model.passage) && !Self::has_blank(&model.question) {
            return Err(ItemGenError::Validation(format!(
                "{} requires a visible blank marker in passage or question",
                self.id
            )));
        }
        self.check_option_widths(&model)
    }

    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        self.normalize(data).unwrap_or_else(|_| Value::Null)
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(McqModel)).unwrap_or_else(|_| Value::Null)
    }

    fn repair_budget(&self) -> RepairBudget {
        RepairBudget {
            fixer: 2,
            regen: 2,
            timeout_s: 18.0,
        }
    }

    // ---- quote sub-protocol -------------------------------------------

    fn has_quote_support(&self) -> bool {
        true
    }

    fn quote_build_prompt(&self, passage: &str) -> Result<String> {
        Ok(format!(
            "You are generating a blank-inference item ({}) from the given PASSAGE.\n\
             RULES:\n\
             - DO NOT modify the passage text. DO NOT insert any blank markers yourself.\n\
             - Choose exactly ONE contiguous substring from the PASSAGE to blank out (call it blank_token).\n\
             - blank_token MUST be a real substring (case-insensitive ok) present in the PASSAGE.\n\
             - Produce 5 options ({}). EXACTLY ONE option must correctly fill the blank.\n\
             - Provide correct_answer as \"1\"..\"5\" (string). The correct option MUST equal blank_token (case-insensitive).\n\
             - The explanation states why the correct option fits best.\n\
             Return JSON only with keys: {{\"question\",\"options\",\"blank_token\",\"correct_answer\",\"explanation\"}}.\n\
             - Do not include any HTML or underline tags in any field.\n\
             PASSAGE:\n{}",
            self.id,
            self.width.option_guidance(),
            passage
        ))
    }

    fn quote_postprocess(&self, passage: &str, reply: &Value) -> Result<Value> {
        let options: Vec<String> = reply
            .get("options")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .take(5)
                    .collect()
            })
            .unwrap_or_default();
        if options.len() != 5 {
            return Err(ItemGenError::Validation(format!(
                "{} quote: options must have exactly 5 items",
                self.id
            )));
        }

        let blank_token = reply
            .get("blank_token")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if blank_token.is_empty() {
            return Err(ItemGenError::Validation(format!(
                "{} quote: blank_token is required",
                self.id
            )));
        }

        let answer = reply
            .get("correct_answer")
            .map(crate::spec::util::standardize_answer)
            .unwrap_or_default();
        let index: usize = answer
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=5).contains(n))
            .ok_or_else(|| {
                ItemGenError::Validation(format!(
                    "{} quote: correct_answer must be '1'..'5'",
                    self.id
                ))
            })?;

        if !options[index - 1].trim().eq_ignore_ascii_case(&blank_token) {
            return Err(ItemGenError::Validation(format!(
                "{} quote: correct option must equal blank_token",
                self.id
            )));
        }

        let marked = replace_once(passage, &blank_token, BLANK);
        if marked == passage {
            return Err(ItemGenError::Validation(format!(
                "{} quote: blank_token not found in passage",
                self.id
            )));
        }

        let options = self.shorten_options(options);
        let explanation = reply
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();

        Ok(json!({
            "passage": marked,
            "question": BLANK_QUESTION,
            "options": options,
            "correct_answer": index,
            "explanation": explanation,
        }))
    }

    fn quote_validate(&self, item: &Value) -> Result<()> {
        let model = validate_mcq(item)?;
        if model.passage.matches(BLANK).count() != 1 {
            return Err(ItemGenError::Validation(format!(
                "{} quote: passage must contain exactly one blank",
                self.id
            )));
        }
        if RE_UNDERLINE_TAG.is_match(&model.passage) || RE_UNDERLINE_TAG.is_match(&model.question) {
            return Err(ItemGenError::Validation(format!(
                "{} quote: HTML underline tags are not allowed",
                self.id
            )));
        }
        self.check_option_widths(&model)
    }
}

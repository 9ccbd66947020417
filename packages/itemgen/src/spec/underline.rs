//! Grammar/lexical judgment specification family.
//!
//! Items carry five short underlined spans marked ①-⑤, exactly one of
//! which is wrong (ungrammatical or contextually inappropriate). Quote
//! mode marks spans in the verbatim passage deterministically.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::recovery::CIRCLED;
use crate::spec::mcq::{normalize_mcq, validate_mcq, McqModel};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

static RE_UNDERLINE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<u>.*?</u>").unwrap());

/// What the wrong span violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgmentKind {
    Grammar,
    Lexical,
}

impl JudgmentKind {
    fn question(&self) -> &'static str {
        match self {
            Self::Grammar => "Which underlined part is grammatically wrong?",
            Self::Lexical => "Which underlined word is inappropriate in context?",
        }
    }

    fn wrong_span_rule(&self) -> &'static str {
        match self {
            Self::Grammar => {
                "exactly ONE span must be replaced with an ungrammatical form \
                 (agreement, tense, relative, modal + base, passive, or participle error)"
            }
            Self::Lexical => {
                "exactly ONE span must be replaced with a word that is grammatical \
                 but contextually inappropriate"
            }
        }
    }
}

/// Underline-judgment specification (grammar or lexis).
pub struct UnderlineSpec {
    id: &'static str,
    kind: JudgmentKind,
    prompts: Arc<PromptLibrary>,
}

impl UnderlineSpec {
    pub fn new(id: &'static str, kind: JudgmentKind, prompts: Arc<PromptLibrary>) -> Self {
        Self { id, kind, prompts }
    }

    fn check_markup(&self, model: &McqModel) -> Result<()> {
        for mark in CIRCLED {
            if !model.passage.contains(mark) {
                return Err(ItemGenError::Validation(format!(
                    "{} passage must mark five spans with ①-⑤",
                    self.id
                )));
            }
        }
        if RE_UNDERLINE_SPAN.find_iter(&model.passage).count() < 5 {
            return Err(ItemGenError::Validation(format!(
                "{} passage must underline five spans",
                self.id
            )));
        }
        Ok(())
    }
}

/// Mark the five spans in order, swapping the wrong one for its altered form.
fn mark_spans(
    passage: &str,
    spans: &[String],
    wrong_index: usize,
    wrong_form: &str,
) -> Result<String> {
    let mut out = String::with_capacity(passage.len() + 64);
    let mut rest = passage;

    for (i, span) in spans.iter().enumerate() {
        let span = span.trim();
        if span.is_empty() {
            return Err(ItemGenError::Validation("empty span".into()));
        }
        let re = Regex::new(&format!("(?i){}", regex::escape(span)))
            .map_err(|e| ItemGenError::Validation(format!("bad span pattern: {e}")))?;
        let m = re.find(rest).ok_or_else(|| {
            ItemGenError::Validation(format!("span '{span}' not found in passage order"))
        })?;

        out.push_str(&rest[..m.start()]);
        let shown = if i == wrong_index - 1 { wrong_form } else { m.as_str() };
        out.push(CIRCLED[i]);
        out.push_str("<u>");
        out.push_str(shown);
        out.push_str("</u>");
        rest = &rest[m.end()..];
    }
    out.push_str(rest);
    Ok(out)
}

impl ItemSpec for UnderlineSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English exam item {} ({}). Return ONLY JSON matching the schema. \
             The passage must contain five short spans marked ①<u>..</u> through ⑤<u>..</u>, \
             exactly one of them wrong. 'correct_answer' is the wrong span's number.",
            self.id,
            match self.kind {
                JudgmentKind::Grammar => "grammar judgment",
                JudgmentKind::Lexical => "lexical appropriateness",
            }
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
        self.check_markup(&model)
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
            timeout_s: 18.0,
        }
    }

    // ---- quote sub-protocol -------------------------------------------

    fn has_quote_support(&self) -> bool {
        true
    }

    fn quote_build_prompt(&self, passage: &str) -> Result<String> {
        Ok(format!(
            "You are generating a judgment item ({}) from the given PASSAGE.\n\
             RULES:\n\
             - DO NOT rewrite, add, delete, or reorder any part of the passage.\n\
             - Select exactly FIVE short spans (1-3 tokens each) that appear verbatim in the PASSAGE, \
             in their order of appearance, no two overlapping.\n\
             - Decide which ONE span to alter: {}. The other four stay correct in context.\n\
             - Return JSON only: {{\"spans\": [five strings], \"wrong_index\": 1-5, \
             \"wrong_form\": \"the altered text for that span\", \"explanation\": \"why it is wrong\"}}.\n\
             - Do not include markers or HTML in the spans.\n\
             PASSAGE:\n{}",
            self.id,
            self.kind.wrong_span_rule(),
            passage
        ))
    }

    fn quote_postprocess(&self, passage: &str, reply: &Value) -> Result<Value> {
        let spans: Vec<String> = reply
            .get("spans")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .take(5)
                    .collect()
            })
            .unwrap_or_default();
        if spans.len() != 5 {
            return Err(ItemGenError::Validation(format!(
                "{} quote: exactly five spans required",
                self.id
            )));
        }

        let wrong_index = reply
            .get("wrong_index")
            .and_then(Value::as_u64)
            .filter(|n| (1..=5).contains(n))
            .ok_or_else(|| {
                ItemGenError::Validation(format!("{} quote: wrong_index must be 1-5", self.id))
            })? as usize;

        let wrong_form = reply
            .get("wrong_form")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if wrong_form.is_empty() {
            return Err(ItemGenError::Validation(format!(
                "{} quote: wrong_form is required",
                self.id
            )));
        }

        let marked = mark_spans(passage, &spans, wrong_index, wrong_form)?;
        let explanation = reply
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();

        Ok(json!({
            "passage": marked,
            "question": self.kind.question(),
            "options": ["①", "②", "③", "④", "⑤"],
            "correct_answer": wrong_index,
            "explanation": explanation,
        }))
    }

    fn quote_validate(&self, item: &Value) -> Result<()> {
        let model = validate_mcq(item)?;
        for mark in CIRCLED {
            if model.passage.matches(mark).count() != 1 {
                return Err(ItemGenError::Validation(format!(
                    "{} quote: each marker must appear exactly once",
                    self.id
                )));
            }
        }
        if RE_UNDERLINE_SPAN.find_iter(&model.passage).count() != 5 {
            return Err(ItemGenError::Validation(format!(
                "{} quote: exactly five underlined spans required",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> UnderlineSpec {
        UnderlineSpec::new("RC29", JudgmentKind::Grammar, Arc::new(PromptLibrary::builtin()))
    }

    const PASSAGE: &str = "The committee that reviews proposals has met weekly since March, \
                           and its members have agreed that funding which arrives late \
                           should be returned to the council.";

    fn reply() -> Value {
        json!({
            "spans": ["that reviews", "has met", "have agreed", "which arrives", "be returned"],
            "wrong_index": 2,
            "wrong_form": "have met",
            "explanation": "subject-verb agreement",
        })
    }

    use serde_json::json;

    #[test]
    fn test_quote_postprocess_marks_in_order() {
        let item = spec().quote_postprocess(PASSAGE, &reply()).unwrap();
        let marked = item["passage"].as_str().unwrap();
        assert!(marked.contains("①<u>that reviews</u>"));
        assert!(marked.contains("②<u>have met</u>"), "wrong form substituted");
        assert!(marked.contains("⑤<u>be returned</u>"));
        assert_eq!(item["correct_answer"], 2);
        assert!(spec().quote_validate(&item).is_ok());
    }

    #[test]
    fn test_quote_postprocess_rejects_out_of_order_span() {
        let mut r = reply();
        r["spans"] = json!(["be returned", "has met", "have agreed", "which arrives", "that reviews"]);
        assert!(spec().quote_postprocess(PASSAGE, &r).is_err());
    }

    #[test]
    fn test_quote_postprocess_rejects_missing_span() {
        let mut r = reply();
        r["spans"] = json!(["that reviews", "has met", "have agreed", "which arrives", "not present"]);
        assert!(spec().quote_postprocess(PASSAGE, &r).is_err());
    }

    #[test]
    fn test_validate_requires_marks_and_underlines() {
        let item = json!({
            "question": "Which underlined part is grammatically wrong?",
            "passage": "Plain passage without markup.",
            "options": ["①", "②", "③", "④", "⑤"],
            "correct_answer": 1,
            "explanation": "x",
        });
        assert!(spec().validate(&item).is_err());
    }

    #[test]
    fn test_quote_validate_rejects_duplicate_marker() {
        let item = spec().quote_postprocess(PASSAGE, &reply()).unwrap();
        let doubled = format!("{} ①", item["passage"].as_str().unwrap());
        let mut bad = item.clone();
        bad["passage"] = json!(doubled);
        assert!(spec().quote_validate(&bad).is_err());
    }
}

//! Chart/statistics mismatch specification.
//!
//! The passage describes one chart or table in five factual sentences and
//! exactly one option must contradict the data. Reformatting cannot fix a
//! content error, so the repair budget disables the fixer and leans on
//! regeneration.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ItemGenError, Result};
use crate::prompts::{build_item_prompt, PromptLibrary};
use crate::spec::mcq::{normalize_mcq, validate_mcq, McqModel};
use crate::spec::{ItemSpec, RepairBudget};
use crate::types::GenContext;

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?%?").unwrap());

/// Chart-description mismatch specification.
pub struct ChartSpec {
    id: &'static str,
    prompts: Arc<PromptLibrary>,
}

impl ChartSpec {
    pub fn new(id: &'static str, prompts: Arc<PromptLibrary>) -> Self {
        Self { id, prompts }
    }
}

impl ItemSpec for ChartSpec {
    fn id(&self) -> &str {
        self.id
    }

    fn system_prompt(&self) -> String {
        format!(
            "English exam item {} (chart mismatch). Return ONLY JSON matching the schema. \
             The passage describes one chart or table in factual sentences; exactly one \
             option contradicts the data. 'correct_answer' is that option's number.",
            self.id
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
        if RE_NUMBER.find_iter(&model.passage).count() < 2 {
            return Err(ItemGenError::Validation(format!(
                "{} passage must cite at least two figures",
                self.id
            )));
        }
        Ok(())
    }

    fn repair(&self, data: Value, _ctx: &GenContext) -> Value {
        normalize_mcq(data)
    }

    /// Numeric-consistency advisories: a figure cited by an option but
    /// absent from the passage means the option drifted from the data.
    fn self_checks(&self, data: &Value, _ctx: &GenContext) -> Vec<String> {
        let Ok(model) = serde_json::from_value::<McqModel>(data.clone()) else {
            return vec!["item no longer matches the MCQ shape".to_string()];
        };

        let passage_numbers: Vec<String> = RE_NUMBER
            .find_iter(&model.passage)
            .map(|m| m.as_str().to_string())
            .collect();

        let mut issues = Vec::new();
        for (i, option) in model.options.iter().enumerate() {
            for number in RE_NUMBER.find_iter(option) {
                if !passage_numbers.iter().any(|n| n.as_str() == number.as_str()) {
                    issues.push(format!(
                        "option {} cites {} which the passage never states",
                        i + 1,
                        number.as_str()
                    ));
                }
            }
        }
        issues
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(McqModel)).unwrap_or_else(|_| Value::Null)
    }

    fn repair_budget(&self) -> RepairBudget {
        // Reformatting cannot fix a figure that contradicts the chart.
        RepairBudget {
            fixer: 0,
            regen: 2,
            timeout_s: 20.0,
        }
    }
}

//! End-to-end pipeline tests over the mock chat backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use itemgen::spec::RepairBudget;
use itemgen::testing::MockModel;
use itemgen::types::GenContext;
use itemgen::{
    Classifier, Generator, GenerationConfig, ItemGenError, ItemSpec, PromptLibrary, SpecRegistry,
};

fn config() -> Arc<GenerationConfig> {
    Arc::new(GenerationConfig::default().with_backoff_s(0.0))
}

fn registry() -> Arc<SpecRegistry> {
    Arc::new(SpecRegistry::standard(Arc::new(PromptLibrary::builtin())))
}

fn mcq_reply() -> String {
    json!({
        "question": "What is the main point of the passage?",
        "passage": "A generated passage about the slow growth of cities.",
        "options": ["one", "two", "three", "four", "five"],
        "correct_answer": 2,
        "explanation": "stated in the final sentence",
    })
    .to_string()
}

#[tokio::test]
async fn batch_returns_partial_success() {
    // Five requested types: one gets unparseable output, one gets a chart
    // item whose option cites a figure the passage never states.
    let drifted_chart = json!({
        "question": "Which sentence does not match the chart?",
        "passage": "Exports reached 45% in 2020. Imports stayed at 30%. \
                    The gap widened to 15%. Growth continued in 2021. \
                    The trend held through 2022.",
        "options": ["Exports reached 45%.", "Imports stayed at 77%.", "The gap was 15%.",
                    "Growth continued in 2021.", "The trend held through 2022."],
        "correct_answer": 2,
        "explanation": "x",
    })
    .to_string();

    let model = MockModel::new()
        .with_reply("ITEM TYPE RC19", "completely unusable output")
        .with_reply("ITEM TYPE RC25", &drifted_chart)
        .with_default_reply(mcq_reply());
    let generator = Generator::new(Arc::new(model), registry(), config());

    let types: Vec<String> = ["RC22", "RC19", "RC24", "RC25", "RC23"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = generator.generate_items("", &types, 1, None, Some(11)).await;

    assert_eq!(results.len(), 5);
    let ok: Vec<bool> = results.iter().map(|r| r.ok).collect();
    assert_eq!(ok, vec![true, false, true, false, true]);

    // Failures carry the fixed message and a bounded detail.
    for failure in results.iter().filter(|r| !r.ok) {
        assert!(failure.message.is_some());
        let detail = &failure.error.as_ref().unwrap().detail;
        assert!(detail.chars().count() <= 300);
    }
}

/// A specification whose validation always fails, counting attempts.
struct AlwaysFailingSpec {
    validations: Arc<AtomicUsize>,
}

impl ItemSpec for AlwaysFailingSpec {
    fn id(&self) -> &str {
        "RC_FAIL"
    }

    fn system_prompt(&self) -> String {
        "test spec".to_string()
    }

    fn build_prompt(&self, _ctx: &GenContext) -> itemgen::Result<String> {
        Ok("generate something".to_string())
    }

    fn normalize(&self, data: Value) -> itemgen::Result<Value> {
        Ok(data)
    }

    fn validate(&self, _data: &Value) -> itemgen::Result<()> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        Err(ItemGenError::Validation("always invalid".into()))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn repair_budget(&self) -> RepairBudget {
        RepairBudget {
            fixer: 2,
            regen: 0,
            timeout_s: 5.0,
        }
    }
}

#[tokio::test]
async fn repair_budget_bounds_validation_attempts() {
    let validations = Arc::new(AtomicUsize::new(0));
    let spec = Arc::new(AlwaysFailingSpec {
        validations: validations.clone(),
    });
    let registry = Arc::new(
        SpecRegistry::standard(Arc::new(PromptLibrary::builtin())).with_spec("RC_FAIL", spec),
    );
    let model = MockModel::new().with_default_reply("{}");
    let generator = Generator::new(Arc::new(model), registry, config());

    let results = generator
        .generate_items("", &["RC_FAIL".to_string()], 1, None, None)
        .await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].ok);
    // At most 1 + fixer validations in the repair loop, then stop.
    assert_eq!(validations.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn chart_passage_suggests_chart_type() {
    let passage = "The chart shows internet usage by age group in 2019 and 2021. \
                   Usage among teens reached 95% in 2021, higher than the 88% of 2019. \
                   Adults over sixty recorded 52%, compared to 40% two years earlier. \
                   The gap between the youngest and oldest groups narrowed to 43%. \
                   Rural respondents still trailed urban ones by 12%.";

    let router_reply = json!({
        "candidates": [
            {"type": "RC25", "fit": 0.92, "reason": "chart figures dominate", "prep_hint": "-"},
            {"type": "RC22", "fit": 0.5, "reason": "gist possible", "prep_hint": "-"}
        ]
    })
    .to_string();
    let model = Arc::new(MockModel::new().with_default_reply(router_reply));
    let classifier = Classifier::new(model, config());

    let result = classifier.suggest_types(passage, 5).await;
    assert!(
        result.top.contains(&"RC25".to_string()),
        "top was {:?}",
        result.top
    );
    for c in &result.candidates {
        assert!((0.0..=1.0).contains(&c.fit));
    }
}

#[tokio::test]
async fn letter_passage_suggests_purpose_with_high_fit() {
    let passage = "Dear Sir, I am writing to inquire about the summer reading program \
                   announced on your website. I would like to know whether students \
                   from neighboring districts may register, and I ask you to send the \
                   registration form. Sincerely, Daniel Reyes";

    let router_reply = json!({
        "candidates": [
            {"type": "RC18", "fit": 0.95, "reason": "letter with explicit request", "prep_hint": "-"}
        ]
    })
    .to_string();
    let model = Arc::new(MockModel::new().with_default_reply(router_reply));
    let classifier = Classifier::new(model, config());

    let result = classifier.suggest_types(passage, 5).await;
    let rc18 = result
        .candidates
        .iter()
        .find(|c| c.type_code == "RC18")
        .expect("RC18 proposed");
    assert!(result.top.contains(&"RC18".to_string()));
    assert!(rc18.fit >= 0.8, "fit was {}", rc18.fit);
}

#[tokio::test]
async fn top_ranking_respects_length_gate() {
    let passage = "However, short passages support only the shorter item families. \
                   Therefore the gate must filter the ranking. This sentence adds \
                   length. That one too.";
    let model = Arc::new(MockModel::new().with_default_reply("no json here"));
    let classifier = Classifier::new(model, config());

    let result = classifier.suggest_types(passage, 5).await;
    assert_eq!(result.meta.band, "short");
    assert!(result.meta.gate_applied);
    assert!(!result.top.is_empty());
    // Nothing above the short band may appear.
    for code in &result.top {
        assert!(
            !matches!(code.as_str(), "RC34" | "RC35" | "RC38" | "RC40" | "RC41_42"),
            "{code} leaked into a short passage ranking"
        );
    }
}

#[tokio::test]
async fn quote_mode_marks_grammar_spans_in_verbatim_passage() {
    let passage = "The committee that reviews proposals has met weekly since March, \
                   and its members have agreed that funding which arrives late \
                   should be returned to the council.";
    let quote_reply = json!({
        "spans": ["that reviews", "has met", "have agreed", "which arrives", "be returned"],
        "wrong_index": 4,
        "wrong_form": "which arrive",
        "explanation": "the relative clause verb must agree with 'funding'",
    })
    .to_string();

    let model = MockModel::new().with_reply("wrong_index", &quote_reply);
    let generator = Generator::new(Arc::new(model), registry(), config());

    let results = generator
        .generate_items(passage, &["RC29".to_string()], 1, None, None)
        .await;

    assert!(results[0].ok, "failure: {:?}", results[0].error);
    let item = results[0].item.as_ref().unwrap();
    let marked = item["passage"].as_str().unwrap();
    assert!(marked.contains("④<u>which arrive</u>"));
    assert!(marked.contains("①<u>that reviews</u>"));
    assert_eq!(item["correct_answer"], 4);
}

#[tokio::test]
async fn set_type_generates_both_members() {
    let set_reply = json!({
        "set_instruction": "[41~42] Read the passage and answer the questions.",
        "passage": "A long multi-paragraph passage about coastal erosion.",
        "questions": [
            {"question_number": 41, "question": "Best title?",
             "options": ["a", "b", "c", "d", "e"], "correct_answer": "3", "explanation": "x"},
            {"question_number": 42, "question": "Which word is misused?",
             "options": ["(a)", "(b)", "(c)", "(d)", "(e)"], "correct_answer": "1", "explanation": "y"}
        ]
    })
    .to_string();
    let model = MockModel::new().with_default_reply(set_reply);
    let generator = Generator::new(Arc::new(model), registry(), config());

    let results = generator
        .generate_items("", &["RC41_42".to_string()], 1, None, None)
        .await;

    assert!(results[0].ok, "failure: {:?}", results[0].error);
    let item = results[0].item.as_ref().unwrap();
    let questions = item["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["question_number"], 41);
    assert_eq!(questions[1]["question_number"], 42);
}

#[tokio::test]
async fn unknown_type_resolves_to_generic_fallback() {
    let model = MockModel::new().with_default_reply(mcq_reply());
    let generator = Generator::new(Arc::new(model), registry(), config());

    let results = generator
        .generate_items("", &["TOTALLY_NEW".to_string()], 1, None, None)
        .await;

    assert!(results[0].ok, "failure: {:?}", results[0].error);
    assert_eq!(results[0].meta.item_id, "RC_GENERIC");
    assert_eq!(results[0].meta.type_code, "TOTALLY_NEW");
}

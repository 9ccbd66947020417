//! Generation orchestrator.
//!
//! Drives one (type x repetition) attempt end-to-end and isolates its
//! failure from sibling attempts in the same batch: every per-attempt
//! error becomes a structured failure entry, and the batch call itself
//! never errors for a single bad item.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{call_llm_json, wrapper, ChatModel, LlmParams};
use crate::pipeline::coerce::coerce_common_keys;
use crate::pipeline::postprocess::sanitize_html;
use crate::pipeline::retry::retry_params;
use crate::prompts::{fixer_prompt, has_passage_block, regen_prompt, with_passage_block, PASSAGE_GUARD};
use crate::sanitize::retarget_passage;
use crate::spec::{ItemSpec, SpecRegistry};
use crate::types::{
    Difficulty, EnvelopeMeta, GenContext, GenerationConfig, GenerationMode, ItemEnvelope,
};

/// Batch generation orchestrator.
///
/// Owns no per-request state: the registry and configuration are
/// immutable and shared, and every attempt builds its own context.
pub struct Generator {
    model: Arc<dyn ChatModel>,
    registry: Arc<SpecRegistry>,
    config: Arc<GenerationConfig>,
}

impl Generator {
    /// Create a generator over the given backend, registry, and config.
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<SpecRegistry>,
        config: Arc<GenerationConfig>,
    ) -> Self {
        Self {
            model,
            registry,
            config,
        }
    }

    /// Generate a batch of items from a passage.
    ///
    /// Types are processed in caller order; each (type x repetition)
    /// yields exactly one envelope. A failing item never aborts its
    /// siblings.
    pub async fn generate_items(
        &self,
        passage: &str,
        types: &[String],
        n_per_type: usize,
        difficulty: Option<&str>,
        seed: Option<u64>,
    ) -> Vec<ItemEnvelope> {
        let difficulty = difficulty.map(Difficulty::parse).unwrap_or_default();
        let mut results = Vec::new();

        for type_code in types {
            if type_code.trim().is_empty() {
                results.push(ItemEnvelope::failure(
                    EnvelopeMeta {
                        type_code: type_code.clone(),
                        item_id: "UNKNOWN".into(),
                        seed,
                        mode: None,
                    },
                    "empty type code",
                ));
                continue;
            }

            let (item_id, spec) = self.registry.resolve(type_code);

            // Quote-mode reuse needs the passage cleaned of authoring
            // markup and semantically repaired, once per requested type.
            let prepped = if passage.trim().is_empty() {
                String::new()
            } else {
                retarget_passage(self.model.as_ref(), &self.config, passage).await
            };

            for _ in 0..n_per_type.max(1) {
                let envelope = self
                    .generate_one(type_code, &item_id, spec.as_ref(), &prepped, difficulty, seed)
                    .await;
                results.push(envelope);
            }
        }
        results
    }

    /// One generation attempt.
    async fn generate_one(
        &self,
        type_code: &str,
        item_id: &str,
        spec: &dyn ItemSpec,
        passage: &str,
        difficulty: Difficulty,
        seed: Option<u64>,
    ) -> ItemEnvelope {
        let meta = |mode: Option<GenerationMode>| EnvelopeMeta {
            type_code: type_code.to_string(),
            item_id: item_id.to_string(),
            seed,
            mode,
        };

        let ctx = GenContext::new(item_id)
            .with_passage(passage)
            .with_difficulty(difficulty);

        if spec.has_quote_support() && ctx.has_passage() {
            return self.generate_quote(spec, &ctx, meta(Some(GenerationMode::Quote))).await;
        }
        self.generate_generic(spec, &ctx, meta(Some(GenerationMode::Generated)))
            .await
    }

    /// Quote branch: the passage is reproduced verbatim; the model only
    /// supplies item metadata which the spec stitches in.
    async fn generate_quote(
        &self,
        spec: &dyn ItemSpec,
        ctx: &GenContext,
        meta: EnvelopeMeta,
    ) -> ItemEnvelope {
        let prompt = match spec.quote_build_prompt(&ctx.passage) {
            Ok(p) => p,
            Err(e) => return ItemEnvelope::failure(meta, format!("quote prompt error: {e}")),
        };

        let params = LlmParams::from(self.config.quote_budget);
        // No inner retries: fail fast per item and let the caller re-request.
        let raw = call_llm_json(
            self.model.as_ref(),
            "You are a careful JSON-only generator. Return JSON only.",
            &prompt,
            &params,
            0,
            self.config.llm_backoff_s,
        )
        .await;

        if wrapper::is_failure(&raw) || !raw.is_object() {
            return ItemEnvelope::failure(meta, "llm returned no valid JSON (quote)");
        }
        let raw = coerce_common_keys(raw, Some(&ctx.passage));

        let item = match spec.quote_postprocess(&ctx.passage, &raw) {
            Ok(item) => item,
            Err(e) => return ItemEnvelope::failure(meta, format!("quote postprocess error: {e}")),
        };
        if let Err(e) = spec.quote_validate(&item) {
            return ItemEnvelope::failure(meta, format!("quote validate error: {e}"));
        }

        info!(item_id = %meta.item_id, "quote generation succeeded");
        ItemEnvelope::success(sanitize_html(item), meta)
    }

    /// Generic branch: prompt, parse, normalize, then the bounded
    /// validate/repair loop and regeneration rounds.
    async fn generate_generic(
        &self,
        spec: &dyn ItemSpec,
        ctx: &GenContext,
        meta: EnvelopeMeta,
    ) -> ItemEnvelope {
        let mut prompt = match spec.build_prompt(ctx) {
            Ok(p) => p,
            Err(e) => return ItemEnvelope::failure(meta, format!("prompt error: {e}")),
        };
        if ctx.has_passage() && !has_passage_block(&prompt) {
            prompt = with_passage_block(&prompt, &ctx.passage);
        }

        let budget = spec.repair_budget();
        let is_set = matches!(spec.id(), "RC41_42" | "RC43_45");
        let mut params: LlmParams = if is_set {
            self.config.set_budget.into()
        } else {
            self.config.single_budget.into()
        };
        params.timeout_s = budget.timeout_s;

        let mut system = spec.system_prompt();
        if ctx.has_passage() && !system.contains(PASSAGE_GUARD) {
            system = format!("{} {}", system.trim_end(), PASSAGE_GUARD);
        }

        let raw = call_llm_json(
            self.model.as_ref(),
            &system,
            &prompt,
            &params,
            0,
            self.config.llm_backoff_s,
        )
        .await;

        // No repair for a response that never parsed.
        if wrapper::is_failure(&raw) || !raw.is_object() {
            return ItemEnvelope::failure(meta, "llm returned no valid JSON");
        }
        let coerced = coerce_common_keys(raw, ctx.has_passage().then_some(ctx.passage.as_str()));

        let mut data = spec.normalize(coerced.clone()).unwrap_or(coerced);

        // Validate/repair loop: at most 1 + fixer validate attempts. The
        // first repair round is the spec's deterministic repair; later
        // rounds ask the model to reshape the data under the schema.
        let mut last_err = validation_error(spec, &data);
        let mut round = 0;
        while last_err.is_some() && round < budget.fixer {
            round += 1;
            data = if round == 1 {
                spec.repair(data, ctx)
            } else {
                self.fix_with_schema(spec, data, &params).await
            };
            last_err = validation_error(spec, &data);
        }

        // Strict regeneration rounds with jittered parameters.
        if last_err.is_some() {
            for attempt in 1..=budget.regen {
                warn!(
                    item_id = %meta.item_id,
                    attempt,
                    error = last_err.as_deref().unwrap_or(""),
                    "regenerating after failed validation"
                );
                let regen_params = retry_params(attempt, &params, meta.seed);
                let (regen_system, regen_user) = regen_prompt(&spec.json_schema(), &prompt);
                let raw = call_llm_json(
                    self.model.as_ref(),
                    &regen_system,
                    &regen_user,
                    &regen_params,
                    0,
                    self.config.llm_backoff_s,
                )
                .await;
                if wrapper::is_failure(&raw) || !raw.is_object() {
                    last_err = Some("regeneration returned no valid JSON".into());
                    continue;
                }
                let coerced =
                    coerce_common_keys(raw, ctx.has_passage().then_some(ctx.passage.as_str()));
                data = spec.normalize(coerced.clone()).unwrap_or(coerced);
                last_err = validation_error(spec, &data);
                if last_err.is_none() {
                    break;
                }
            }
        }

        if let Some(err) = last_err {
            return ItemEnvelope::failure(meta, format!("validation: {err}"));
        }

        // Advisory checks become fatal here, and only here.
        let issues = spec.self_checks(&data, ctx);
        if !issues.is_empty() {
            return ItemEnvelope::failure(meta, format!("self checks: {}", issues.join("; ")));
        }

        info!(item_id = %meta.item_id, "generation succeeded");
        ItemEnvelope::success(sanitize_html(data), meta)
    }

    /// Ask the model to reshape off-schema data into schema-valid JSON.
    async fn fix_with_schema(
        &self,
        spec: &dyn ItemSpec,
        data: Value,
        params: &LlmParams,
    ) -> Value {
        let raw_text = serde_json::to_string(&data).unwrap_or_default();
        let (system, user) = fixer_prompt(&spec.json_schema(), &raw_text);
        let fixed = call_llm_json(
            self.model.as_ref(),
            &system,
            &user,
            params,
            0,
            self.config.llm_backoff_s,
        )
        .await;

        if wrapper::is_failure(&fixed) || !fixed.is_object() {
            return data;
        }
        let coerced = coerce_common_keys(fixed, None);
        spec.normalize(coerced.clone()).unwrap_or(coerced)
    }
}

fn validation_error(spec: &dyn ItemSpec, data: &Value) -> Option<String> {
    spec.validate(data).err().map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptLibrary;
    use crate::testing::MockModel;
    use serde_json::json;

    fn generator(model: MockModel) -> Generator {
        let prompts = Arc::new(PromptLibrary::builtin());
        Generator::new(
            Arc::new(model),
            Arc::new(SpecRegistry::standard(prompts)),
            Arc::new(GenerationConfig::default().with_backoff_s(0.0)),
        )
    }

    fn mcq_reply() -> String {
        json!({
            "question": "What is the main point?",
            "passage": "A generated passage about tides.",
            "options": ["one", "two", "three", "four", "five"],
            "correct_answer": 2,
            "explanation": "stated directly",
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_generic_generation_succeeds() {
        let gen = generator(MockModel::new().with_default_reply(mcq_reply()));
        let results = gen
            .generate_items("", &["RC22".to_string()], 1, Some("medium"), Some(7))
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].ok, "failure: {:?}", results[0].error);
        assert_eq!(results[0].meta.item_id, "RC22");
        assert_eq!(results[0].meta.mode, Some(GenerationMode::Generated));
        assert_eq!(results[0].meta.seed, Some(7));
    }

    #[tokio::test]
    async fn test_alias_keys_coerced_before_validation() {
        let reply = json!({
            "question_stem": "What is the main point?",
            "stimulus": "A generated passage about tides.",
            "choices": ["one", "two", "three", "four", "five"],
            "answer": "④",
            "rationale": "stated",
        })
        .to_string();
        let gen = generator(MockModel::new().with_default_reply(reply));
        let results = gen
            .generate_items("", &["RC22".to_string()], 1, None, None)
            .await;

        assert!(results[0].ok, "failure: {:?}", results[0].error);
        let item = results[0].item.as_ref().unwrap();
        assert_eq!(item["correct_answer"], 4);
        assert_eq!(item["question"], "What is the main point?");
    }

    #[tokio::test]
    async fn test_unparseable_output_fails_without_repair() {
        let model = MockModel::new().with_default_reply("never json");
        let gen = generator(model);
        let results = gen
            .generate_items("", &["RC22".to_string()], 1, None, None)
            .await;

        assert!(!results[0].ok);
        let detail = &results[0].error.as_ref().unwrap().detail;
        assert!(detail.contains("no valid JSON"));
    }

    #[tokio::test]
    async fn test_regeneration_recovers_bad_first_output() {
        // First reply misses two options; the regeneration round fixes it.
        let bad = json!({
            "question": "Q?",
            "passage": "P is long enough.",
            "options": ["one", "two", "three"],
            "correct_answer": 1,
            "explanation": "x",
        })
        .to_string();
        let model = MockModel::new()
            .with_reply_sequence(vec![bad, mcq_reply()])
            .with_default_reply(mcq_reply());
        let gen = generator(model);
        let results = gen
            .generate_items("", &["RC22".to_string()], 1, None, Some(1))
            .await;

        assert!(results[0].ok, "failure: {:?}", results[0].error);
    }

    #[tokio::test]
    async fn test_batch_isolation() {
        // RC25 self-checks fail (option cites an absent figure) while the
        // other items validate; exactly the drifted item fails.
        let chart = json!({
            "question": "Which sentence mismatches the chart?",
            "passage": "Exports hit 40% in 2020. Imports hit 30% in 2020. \
                        The gap was 10%. Growth followed in 2021. It held in 2022.",
            "options": ["Exports hit 40%.", "Imports hit 99%.", "The gap was 10%.",
                        "Growth followed in 2021.", "It held in 2022."],
            "correct_answer": 2,
            "explanation": "x",
        })
        .to_string();
        let model = MockModel::new()
            .with_reply("chart mismatch", &chart)
            .with_reply("RC25", &chart)
            .with_default_reply(mcq_reply());
        let gen = generator(model);

        let types: Vec<String> = ["RC22", "RC25", "RC23"].iter().map(|s| s.to_string()).collect();
        let results = gen.generate_items("", &types, 1, None, None).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].ok);
        assert!(!results[1].ok, "drifted chart item must fail");
        assert!(results[2].ok);
        assert!(results[1].error.as_ref().unwrap().detail.contains("99%"));
    }

    #[tokio::test]
    async fn test_quote_mode_for_blank_spec() {
        let passage = "Habits form slowly because repetition builds pathways in the brain.";
        let quote_reply = json!({
            "question": "ignored",
            "options": ["growth", "repetition", "decay", "novelty", "chance"],
            "blank_token": "repetition",
            "correct_answer": "2",
            "explanation": "the argument turns on repeated action",
        })
        .to_string();
        let model = MockModel::new().with_reply("blank_token", &quote_reply);
        let gen = generator(model);

        let results = gen
            .generate_items(passage, &["RC31".to_string()], 1, None, None)
            .await;

        assert!(results[0].ok, "failure: {:?}", results[0].error);
        assert_eq!(results[0].meta.mode, Some(GenerationMode::Quote));
        let item = results[0].item.as_ref().unwrap();
        assert_eq!(item["passage"].as_str().unwrap().matches("_____").count(), 1);
    }

    #[tokio::test]
    async fn test_n_per_type_repetitions() {
        let gen = generator(MockModel::new().with_default_reply(mcq_reply()));
        let results = gen
            .generate_items("", &["RC22".to_string()], 3, None, None)
            .await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn test_empty_type_code_records_failure() {
        let gen = generator(MockModel::new().with_default_reply(mcq_reply()));
        let results = gen
            .generate_items("", &["".to_string(), "RC22".to_string()], 1, None, None)
            .await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[1].ok);
    }
}

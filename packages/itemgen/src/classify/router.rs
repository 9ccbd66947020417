//! Classifier ensemble: rule-based and LLM scorers merged by weighted sum,
//! then filtered through the length gate.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::classify::gate::Band;
use crate::classify::rules::rule_based_candidates;
use crate::llm::{call_llm_json, wrapper, ChatModel, LlmParams};
use crate::sanitize::sanitize_passage;
use crate::types::{
    CandidateType, ClassificationMeta, ClassificationResult, GenerationConfig, SourceCounts,
};

const ROUTER_SYSTEM: &str = "You are a routing assistant for reading-comprehension item types. \
Your ONLY job is to analyze the given passage and propose suitable item types with confidence scores. \
Use ONLY the provided passage. Do NOT invent, alter, or substitute any passage content. \
OUTPUT RULES (must follow all): \
- Return JSON ONLY. No markdown, no code fences, no commentary. \
- JSON shape: { \"candidates\": [ {\"type\": \"<RC_CODE>\", \"fit\": <float 0..1>, \"reason\": \"<=120 chars\", \"prep_hint\": \"<string or '-'>\" }, ... ] } \
- \"type\" must be an RC-prefixed code between RC18 and RC45. \
- Produce 5-10 unique candidates, sorted by \"fit\" descending. \
- \"fit\" is confidence in [0,1]; use at most 2 decimals. Lower fit (0.3-0.6) is allowed if only content suggests possibility. \
- No extra keys, no trailing commas, no NaN/Infinity. \
SCORING GUIDANCE (for reasoning only, not output): \
Expository passages -> RC22/RC23/RC24/RC31/RC32/RC33/RC40. \
Tables/figures/stats -> RC25. Biographical timelines -> RC26. \
Notices and forms -> RC27/RC28. Letter format -> RC18. \
Attitude/emotion narrative -> RC19. Claims and obligation -> RC20. \
Labeled chunks (A)(B)(C) -> RC36/RC37. Insertion markers -> RC38/RC39. \
Numbered bullets with underlines -> RC29/RC30. Long multi-part passages -> RC41/RC42. \
If uncertain, still return best-effort candidates with lower fit.";

/// Hybrid rule/LLM item-type classifier.
///
/// Pure over its inputs: no state beyond the shared model handle and the
/// immutable configuration.
pub struct Classifier {
    model: Arc<dyn ChatModel>,
    config: Arc<GenerationConfig>,
}

impl Classifier {
    /// Create a classifier over the given backend and configuration.
    pub fn new(model: Arc<dyn ChatModel>, config: Arc<GenerationConfig>) -> Self {
        Self { model, config }
    }

    /// Score item types for a passage and return a stable top-K ranking.
    pub async fn suggest_types(&self, passage: &str, top_k: usize) -> ClassificationResult {
        let rule_cands = rule_based_candidates(passage, &self.config);
        let llm_cands = self.llm_candidates(passage).await;
        let sources = SourceCounts {
            llm: llm_cands.len(),
            rule: rule_cands.len(),
        };

        let merged = merge_candidates(&llm_cands, &rule_cands, &self.config);

        let tokens = sanitize_passage(passage).split_whitespace().count();
        let band = Band::for_tokens(tokens);
        let (gate_applied, final_cands) = apply_gate(band, merged);

        let k = top_k.clamp(1, 5);
        let top: Vec<String> = final_cands
            .iter()
            .take(k)
            .map(|c| c.type_code.clone())
            .collect();

        ClassificationResult {
            candidates: final_cands,
            top,
            meta: ClassificationMeta {
                band: band.as_str().to_string(),
                gate_applied,
                tokens,
                sources,
            },
        }
    }

    /// LLM rubric scorer. Failures degrade to an empty candidate list.
    async fn llm_candidates(&self, passage: &str) -> Vec<CandidateType> {
        let user = format!("Passage:\n```passage\n{passage}\n```");
        let params = LlmParams::from(self.config.router_budget);
        let raw = call_llm_json(
            self.model.as_ref(),
            ROUTER_SYSTEM,
            &user,
            &params,
            self.config.llm_retries,
            self.config.llm_backoff_s,
        )
        .await;
        normalize_llm_candidates(&raw)
    }
}

/// Accept only well-formed LLM candidates; drop everything else silently.
pub fn normalize_llm_candidates(raw: &Value) -> Vec<CandidateType> {
    if wrapper::is_failure(raw) {
        return Vec::new();
    }
    let Some(items) = raw.get("candidates").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for item in items {
        let Some(code) = item.get("type").and_then(Value::as_str) else {
            continue;
        };
        let code = code.trim();
        if !code.starts_with("RC") {
            continue;
        }
        let Some(fit) = item.get("fit").and_then(Value::as_f64) else {
            continue;
        };
        if !(0.0..=1.0).contains(&fit) {
            continue;
        }
        let reason = item.get("reason").and_then(Value::as_str).unwrap_or("");
        let hint = item.get("prep_hint").and_then(Value::as_str).unwrap_or("-");
        out.push(CandidateType::new(code, fit, reason, hint));
    }
    debug!(accepted = out.len(), "normalized LLM router candidates");
    out
}

struct MergeSlot {
    cand: CandidateType,
    votes: usize,
}

/// Weighted-sum merge of the two candidate sources.
///
/// Per type, fits accumulate as `llm * 0.55 + rule * 0.45`; two or more
/// agreeing sources add a small consensus bonus capped so the final score
/// never exceeds 1.0. The shorter non-empty reason wins; missing prep
/// hints are backfilled. Rule candidates are inserted first so ties keep
/// the rule-based source order.
pub fn merge_candidates(
    llm: &[CandidateType],
    rule: &[CandidateType],
    config: &GenerationConfig,
) -> Vec<CandidateType> {
    let mut merged: IndexMap<String, MergeSlot> = IndexMap::new();

    let mut absorb = |src: &[CandidateType], weight: f64| {
        for c in src {
            match merged.entry(c.type_code.clone()) {
                indexmap::map::Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut();
                    slot.cand.fit += c.fit * weight;
                    slot.votes += 1;
                    if !c.reason.is_empty()
                        && (slot.cand.reason.is_empty() || c.reason.len() < slot.cand.reason.len())
                    {
                        slot.cand.reason = c.reason.clone();
                    }
                    if slot.cand.prep_hint == "-" && c.prep_hint != "-" {
                        slot.cand.prep_hint = c.prep_hint.clone();
                    }
                }
                indexmap::map::Entry::Vacant(entry) => {
                    let mut cand = c.clone();
                    cand.fit = c.fit * weight;
                    entry.insert(MergeSlot { cand, votes: 1 });
                }
            }
        }
    };
    absorb(rule, config.rule_weight);
    absorb(llm, config.llm_weight);

    let mut out: Vec<CandidateType> = merged
        .into_values()
        .map(|slot| {
            let mut cand = slot.cand;
            if slot.votes >= 2 {
                cand.fit = (cand.fit + config.consensus_bonus).min(1.0);
            }
            // Emotion-shift items are the dedicated narrative type.
            if cand.type_code == "RC19" {
                cand.fit = (cand.fit + 0.03).min(1.0);
            }
            cand.fit = round4(cand.fit.clamp(0.0, 1.0));
            cand
        })
        .collect();

    // Notice pair correction: keep the match item within reach of the
    // true/false item when both are proposed.
    let rc27 = out.iter().find(|c| c.type_code == "RC27").map(|c| c.fit);
    if let Some(rc27_fit) = rc27 {
        if let Some(rc28) = out.iter_mut().find(|c| c.type_code == "RC28") {
            if rc28.fit < rc27_fit - 0.08 {
                rc28.fit = round4((rc27_fit - 0.08).min(1.0));
            }
        }
    }

    out.sort_by(|a, b| b.fit.partial_cmp(&a.fit).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Filter the ranking to the band's allowed subset.
///
/// If gating would eliminate every candidate, the gate is bypassed and
/// the ungated ranking returned instead: availability over strictness.
pub fn apply_gate(band: Band, merged: Vec<CandidateType>) -> (bool, Vec<CandidateType>) {
    let gated: Vec<CandidateType> = merged
        .iter()
        .filter(|c| band.allows(&c.type_code))
        .cloned()
        .collect();
    if gated.is_empty() && !merged.is_empty() {
        debug!(band = band.as_str(), "length gate emptied ranking, bypassing");
        (false, merged)
    } else {
        (true, gated)
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use serde_json::json;

    fn cand(code: &str, fit: f64) -> CandidateType {
        CandidateType::new(code, fit, "r", "-")
    }

    #[test]
    fn test_normalize_drops_malformed() {
        let raw = json!({
            "ok": true,
            "candidates": [
                {"type": "RC22", "fit": 0.8, "reason": "good", "prep_hint": "-"},
                {"type": "XX22", "fit": 0.8},
                {"type": "RC23", "fit": 1.4},
                {"type": "RC24"},
                {"fit": 0.5},
            ]
        });
        let cands = normalize_llm_candidates(&raw);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].type_code, "RC22");
    }

    #[test]
    fn test_normalize_failure_sentinel_is_empty() {
        let raw = json!({"ok": false, "candidates": [{"type": "RC22", "fit": 0.9}]});
        assert!(normalize_llm_candidates(&raw).is_empty());
    }

    #[test]
    fn test_merge_weighted_sum_and_consensus() {
        let config = GenerationConfig::default();
        let llm = vec![cand("RC22", 0.8)];
        let rule = vec![cand("RC22", 0.6)];
        let merged = merge_candidates(&llm, &rule, &config);
        assert_eq!(merged.len(), 1);
        // 0.8*0.55 + 0.6*0.45 + 0.08 consensus
        assert!((merged[0].fit - 0.79).abs() < 1e-9);
    }

    #[test]
    fn test_merge_single_source_no_bonus() {
        let config = GenerationConfig::default();
        let merged = merge_candidates(&[cand("RC24", 1.0)], &[], &config);
        assert!((merged[0].fit - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_merge_bound_holds_for_extremes() {
        let config = GenerationConfig::default();
        let llm = vec![cand("RC19", 1.0), cand("RC22", 1.0)];
        let rule = vec![cand("RC19", 1.0), cand("RC22", 1.0)];
        for c in merge_candidates(&llm, &rule, &config) {
            assert!((0.0..=1.0).contains(&c.fit), "{} out of range", c.fit);
        }
    }

    #[test]
    fn test_merge_tie_keeps_rule_insertion_order() {
        let config = GenerationConfig::default();
        let rule = vec![cand("RC23", 0.5), cand("RC24", 0.5)];
        let merged = merge_candidates(&[], &rule, &config);
        assert_eq!(merged[0].type_code, "RC23");
        assert_eq!(merged[1].type_code, "RC24");
    }

    #[test]
    fn test_notice_pair_correction() {
        let config = GenerationConfig::default();
        let rule = vec![cand("RC27", 1.0), cand("RC28", 0.2)];
        let merged = merge_candidates(&[], &rule, &config);
        let rc27 = merged.iter().find(|c| c.type_code == "RC27").unwrap().fit;
        let rc28 = merged.iter().find(|c| c.type_code == "RC28").unwrap().fit;
        assert!(rc27 - rc28 <= 0.08 + 1e-9);
    }

    #[test]
    fn test_gate_filters_to_band() {
        let merged = vec![cand("RC22", 0.9), cand("RC41", 0.8)];
        let (applied, gated) = apply_gate(Band::Short, merged);
        assert!(applied);
        assert_eq!(gated.len(), 1);
        assert_eq!(gated[0].type_code, "RC22");
    }

    #[test]
    fn test_gate_bypassed_when_everything_eliminated() {
        let merged = vec![cand("RC41", 0.8), cand("RC42", 0.7)];
        let (applied, gated) = apply_gate(Band::Short, merged.clone());
        assert!(!applied);
        assert_eq!(gated.len(), merged.len());
    }

    #[tokio::test]
    async fn test_suggest_types_includes_llm_votes() {
        let reply = json!({
            "candidates": [
                {"type": "RC22", "fit": 0.9, "reason": "gist works", "prep_hint": "-"}
            ]
        })
        .to_string();
        let model = Arc::new(MockModel::new().with_default_reply(reply));
        let config = Arc::new(GenerationConfig::default().with_backoff_s(0.0));
        let classifier = Classifier::new(model, config);

        let passage = "However, cities grow in layers over centuries. Therefore each \
                       layer preserves the habits of its makers. These traces guide \
                       historians. Thus the city itself becomes an archive. Moreover, \
                       its streets remember what its people forget. Each generation \
                       adds another stratum of meaning to the plan. ";
        let passage = passage.repeat(3);
        let result = classifier.suggest_types(&passage, 5).await;

        assert!(!result.top.is_empty());
        assert!(result.top.len() <= 5);
        assert_eq!(result.meta.sources.llm, 1);
        assert!(result.meta.sources.rule > 0);
        assert!(result.candidates.iter().any(|c| c.type_code == "RC22"));
        // Everything in top must pass the band gate (it was applied).
        assert!(result.meta.gate_applied);
    }

    #[tokio::test]
    async fn test_suggest_types_survives_llm_garbage() {
        let model = Arc::new(MockModel::new().with_default_reply("utter garbage"));
        let config = Arc::new(GenerationConfig::default().with_backoff_s(0.0));
        let classifier = Classifier::new(model, config);

        let result = classifier
            .suggest_types("A short plain passage about tides and time.", 3)
            .await;
        assert_eq!(result.meta.sources.llm, 0);
        assert!(!result.top.is_empty(), "rule candidates must keep top non-empty");
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }
}

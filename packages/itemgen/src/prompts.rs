//! Prompt library and prompt assembly.
//!
//! The per-type instructional template bodies are opaque configuration:
//! the library ships compact built-in defaults so the pipeline is
//! runnable, and deployments may replace them wholesale. Assembly order
//! (base rules, type template, difficulty/topic/vocabulary lines, fenced
//! passage block, output rules) is the architecture; the template prose
//! is not.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ItemGenError, Result};
use crate::types::GenContext;

/// Guard line appended whenever a caller-supplied passage is embedded.
pub const PASSAGE_GUARD: &str =
    "Use ONLY the provided passage. Do NOT invent or substitute a new passage.";

const BASE_RULES: &str = "You are an expert writer of English reading and listening exam items. \
Produce one complete item exactly as instructed below.";

const OUTPUT_RULES: &str = "OUTPUT RULES: Return JSON ONLY — no markdown, no code fences, no \
commentary. Do not add extra keys. 'correct_answer' is the option number (1-5).";

const DEFAULT_VOCAB_PROFILE: &str = "upper-intermediate";

/// One instructional template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Instructional body for the item type
    pub content: String,

    /// Vocabulary difficulty the template targets
    pub vocab_profile: String,
}

/// Immutable map of item code to instructional template.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, PromptTemplate>,
}

/// Built-in template bodies, one per item family.
const BUILTIN: &[(&str, &str)] = &[
    ("RC18", "Write a purpose-identification item: a short letter or announcement passage and the question 'What is the main purpose of the passage?' with five options."),
    ("RC19", "Write an emotion-change item over a short narrative: ask how the narrator's feeling changes, options as 'X -> Y' emotion pairs."),
    ("RC20", "Write a claim-identification item: an argumentative passage and the question asking for the writer's main claim."),
    ("RC21", "Write an implicit-meaning item: a passage containing one figurative or idiomatic expression, asking what the underlined expression means in context."),
    ("RC22", "Write a main-point item: an expository passage and the question asking for the writer's main point."),
    ("RC23", "Write a topic item: an expository passage and the question asking for the topic, options as short noun phrases."),
    ("RC24", "Write a title item: an expository passage and the question asking for the best title, options as concise title phrases."),
    ("RC25", "Write a chart-description mismatch item: a passage of exactly five numbered sentences describing one chart or table, where exactly one sentence contradicts the data; the options cite the five sentences."),
    ("RC26", "Write a biographical detail item: a life-history passage and the question asking which statement about the person agrees (or disagrees) with the passage."),
    ("RC27", "Write a notice detail item: a notice-style passage with labeled sections and the question asking which statement does NOT agree with the notice."),
    ("RC28", "Write a notice match item: a notice-style passage and the question asking which statement agrees with the notice."),
    ("RC29", "Write a grammar-judgment item: a passage with five short underlined spans marked ①-⑤, exactly one ungrammatical; ask which one is wrong."),
    ("RC30", "Write a lexical-appropriateness item: a passage with five underlined words marked ①-⑤, exactly one inappropriate in context; ask which one is wrong."),
    ("RC31", "Write a word-level blank item: an expository passage with exactly one '_____' blank replacing a key word; five short options, one correct."),
    ("RC32", "Write a phrase-level blank item: an expository passage with exactly one '_____' blank replacing a phrase; five phrase options."),
    ("RC33", "Write a clause-level blank item: an abstract expository passage with exactly one '_____' blank replacing a clause; five clause options."),
    ("RC34", "Write a hard global blank item: a long expository passage with exactly one '_____' blank on the clause carrying the causal pivot; five clause options."),
    ("RC35", "Write an irrelevant-sentence item: a single-topic passage whose middle sentences are numbered ①-⑤, exactly one off-topic; ask which one to remove."),
    ("RC36", "Write a paragraph-ordering item: a lead sentence plus three paragraphs labeled (A)(B)(C); options give orderings; exactly one is coherent."),
    ("RC37", "Write a hard paragraph-ordering item over research-report prose: lead plus (A)(B)(C) paragraphs; options give orderings."),
    ("RC38", "Write a sentence-insertion item: a given sentence plus a passage with slots ( ① )-( ⑤ ); ask where the sentence belongs."),
    ("RC39", "Write a hard sentence-insertion item over argumentative prose: a given sentence plus a passage with slots ( ① )-( ⑤ )."),
    ("RC40", "Write a two-slot summary item: an expository passage, a one-sentence summary with blanks (A) and (B), and five option pairs."),
    ("RC41_42", "Write a two-question set: one long passage and questions 41 (best title) and 42 (the one word among (a)-(e) used inappropriately)."),
    ("RC43_45", "Write a three-question set: one long narrative in parts (A)-(D) and questions 43 (paragraph order), 44 (same referent) and 45 (detail match)."),
    ("LC", "Write a listening item: a short dialogue or monologue transcript with speaker tags, a question about it, and five options."),
    ("RC_GENERIC", "Write a five-option multiple-choice reading item appropriate to the passage content."),
];

impl PromptLibrary {
    /// Library of built-in templates.
    pub fn builtin() -> Self {
        let templates = BUILTIN
            .iter()
            .map(|(code, content)| {
                (
                    code.to_string(),
                    PromptTemplate {
                        content: content.to_string(),
                        vocab_profile: DEFAULT_VOCAB_PROFILE.to_string(),
                    },
                )
            })
            .collect();
        Self { templates }
    }

    /// Replace or add a template.
    pub fn with_template(mut self, code: impl Into<String>, template: PromptTemplate) -> Self {
        self.templates.insert(code.into(), template);
        self
    }

    /// Look up a template: exact code, then the LC family, then generic.
    pub fn template(&self, item_id: &str) -> Option<&PromptTemplate> {
        if let Some(t) = self.templates.get(item_id) {
            return Some(t);
        }
        if item_id.starts_with("LC") {
            return self.templates.get("LC");
        }
        self.templates.get("RC_GENERIC")
    }

    /// Vocabulary profile declared by a template.
    pub fn vocab_profile(&self, item_id: &str) -> &str {
        self.template(item_id)
            .map(|t| t.vocab_profile.as_str())
            .unwrap_or(DEFAULT_VOCAB_PROFILE)
    }
}

/// Whether a prompt already embeds a passage block.
pub fn has_passage_block(prompt: &str) -> bool {
    prompt.contains("```passage") || prompt.contains("<PASSAGE>")
}

/// Append a fenced passage block with the use-only guard.
pub fn with_passage_block(prompt: &str, passage: &str) -> String {
    format!(
        "{}\n\n{}\n```passage\n{}\n```",
        prompt.trim_end(),
        PASSAGE_GUARD,
        passage.trim()
    )
}

/// Assemble the full generation prompt for a context.
pub fn build_item_prompt(library: &PromptLibrary, ctx: &GenContext) -> Result<String> {
    let template = library.template(&ctx.item_id).ok_or_else(|| {
        ItemGenError::Prompt(format!("no template resolves for {}", ctx.item_id))
    })?;

    let vocab = ctx
        .vocab_profile
        .as_deref()
        .unwrap_or(&template.vocab_profile);

    let mut prompt = format!(
        "{BASE_RULES}\n\nITEM TYPE {}: {}\n\nDifficulty: {}\nTopic: {}\nVocabulary difficulty: {}",
        ctx.item_id,
        template.content,
        ctx.difficulty.as_str(),
        ctx.topic,
        vocab,
    );

    if ctx.has_passage() {
        prompt = with_passage_block(&prompt, &ctx.passage);
    }

    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_RULES);
    Ok(prompt)
}

const FIXER_SYSTEM: &str = "You convert the user's text into VALID JSON strictly matching the \
provided JSON Schema. Output ONLY the JSON. No code fences, no prose.";

/// Prompt pair for the fixer call: reshape raw text to schema-valid JSON.
pub fn fixer_prompt(schema: &Value, raw: &str) -> (String, String) {
    let schema_text = serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string());
    (
        FIXER_SYSTEM.to_string(),
        format!("JSON Schema:\n{schema_text}\n\nInput:\n{raw}"),
    )
}

const REGEN_SYSTEM: &str = "English exam item generator. Return ONLY JSON strictly matching the \
provided JSON Schema. No code fences. No explanations.";

/// Prompt pair for strict regeneration: retry from scratch under a schema.
pub fn regen_prompt(schema: &Value, original_prompt: &str) -> (String, String) {
    let schema_text = serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string());
    (
        REGEN_SYSTEM.to_string(),
        format!("JSON Schema:\n{schema_text}\n\nNow generate according to this instruction:\n{original_prompt}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;

    #[test]
    fn test_template_resolution_order() {
        let lib = PromptLibrary::builtin();
        assert!(lib.template("RC25").unwrap().content.contains("chart"));
        assert!(lib.template("LC07").unwrap().content.contains("listening"));
        assert!(lib.template("RC99").unwrap().content.contains("multiple-choice"));
    }

    #[test]
    fn test_build_prompt_embeds_passage_with_guard() {
        let lib = PromptLibrary::builtin();
        let ctx = GenContext::new("RC22")
            .with_passage("Tides shape coastal life.")
            .with_difficulty(Difficulty::Hard);
        let prompt = build_item_prompt(&lib, &ctx).unwrap();

        assert!(prompt.contains("```passage"));
        assert!(prompt.contains("Tides shape coastal life."));
        assert!(prompt.contains(PASSAGE_GUARD));
        assert!(prompt.contains("Difficulty: hard"));
        assert!(prompt.contains("OUTPUT RULES"));
    }

    #[test]
    fn test_build_prompt_without_passage_has_no_block() {
        let lib = PromptLibrary::builtin();
        let ctx = GenContext::new("RC22");
        let prompt = build_item_prompt(&lib, &ctx).unwrap();
        assert!(!has_passage_block(&prompt));
    }

    #[test]
    fn test_with_passage_block_detected() {
        let prompt = with_passage_block("Generate an item.", "Some passage.");
        assert!(has_passage_block(&prompt));
    }

    #[test]
    fn test_fixer_prompt_carries_schema_and_raw() {
        let schema = serde_json::json!({"type": "object"});
        let (system, user) = fixer_prompt(&schema, "broken output");
        assert!(system.contains("VALID JSON"));
        assert!(user.contains("broken output"));
        assert!(user.contains("\"object\""));
    }
}

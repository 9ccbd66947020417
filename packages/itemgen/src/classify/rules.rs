//! Rule-based candidate scorer.
//!
//! Applies the signal library to a passage and produces scored candidate
//! types. Heuristics are additive boosts over a base candidate set plus an
//! always-present evergreen set, so a passage with no strong surface
//! signal still yields plausible medium-confidence candidates.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::classify::gate::Band;
use crate::classify::metrics::PassageMetrics;
use crate::classify::signals::{self, FormatSignals};
use crate::sanitize::sanitize_passage;
use crate::types::{CandidateType, GenerationConfig};

/// Types viable for almost any expository passage, with base fits.
const EVERGREEN: &[(&str, f64)] = &[
    ("RC22", 0.46),
    ("RC23", 0.46),
    ("RC24", 0.44),
    ("RC40", 0.42),
    ("RC30", 0.47),
    ("RC41", 0.41),
    ("RC42", 0.41),
];

/// Evergreen types withheld from biography-shaped passages.
const BIO_BLOCKED_EVERGREEN: &[&str] =
    &["RC22", "RC23", "RC24", "RC31", "RC32", "RC33", "RC40"];

/// Evergreen types withheld from notice-shaped passages.
const NOTICE_BLOCKED_EVERGREEN: &[&str] =
    &["RC22", "RC23", "RC24", "RC31", "RC32", "RC33", "RC40"];

static RE_PRONOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(he|she|his|her)\b").unwrap());
static RE_GROUP_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ethnic group|people|tribe|nation|society|community|culture)\b").unwrap()
});

/// Score candidate types for a passage using deterministic heuristics.
///
/// Returns up to `config.max_rule_candidates` candidates sorted by fit
/// descending, ties kept in first-seen order.
pub fn rule_based_candidates(passage: &str, config: &GenerationConfig) -> Vec<CandidateType> {
    let fmt = FormatSignals::detect(passage);
    let txt = sanitize_passage(passage);
    let m = PassageMetrics::analyze(&txt);
    let tokens = txt.split_whitespace().count();
    let band = Band::for_tokens(tokens);

    let strong_shift = signals::emotion_shift(&txt);
    let notice = signals::is_notice_like(&txt, &m, &fmt);
    let is_bio = signals::RE_BIO.is_match(&txt);

    let mut cands: Vec<CandidateType> = Vec::new();
    let mut add = |code: &str, fit: f64, reason: &str, hint: &str| {
        if band.allows(code) {
            cands.push(CandidateType::new(code, fit, reason, hint));
        }
    };

    // Notices: factual true/false items first, match items second.
    if notice {
        add(
            "RC27",
            0.90,
            "Notice-style passage listing facts, conditions, dates, and fees",
            "Move stated facts directly into options and test each against the text",
        );
        add(
            "RC28",
            0.80,
            "Notice-style passage supports picking the one consistent statement",
            "Build options where only one matches the announcement",
        );
    } else if fmt.notice_keys {
        add(
            "RC27",
            0.85,
            "Notice section keys detected",
            "Keep the sections; mark fact-check points",
        );
        add(
            "RC28",
            0.80,
            "Notice section keys detected",
            "Construct options with exactly one consistent fact",
        );
    }

    // Explicit insertion slots.
    if fmt.insert_parens {
        add(
            "RC38",
            0.90,
            "( ① )-( ⑤ ) insertion slot pattern present",
            "Check connective and referential cohesion around each slot",
        );
        add(
            "RC39",
            0.85,
            "Insertion slot pattern on denser prose",
            "Trace the argument before and after each slot",
        );
    }

    let struct_grammar = signals::score_grammar_structure(&txt, &m);

    // Circled bullets with underlines: grammar/lexis judgment items.
    if fmt.bullets && fmt.underline {
        let fit = if struct_grammar >= 0.35 { 0.88 } else { 0.50 };
        add(
            "RC29",
            fit,
            "Numbered markers with underlined spans",
            "Find the one ungrammatical span among five",
        );
        add(
            "RC30",
            0.80,
            "Numbered markers with underlined spans",
            "Find the one contextually inappropriate word among five",
        );
    } else if fmt.bullets {
        let fit = if struct_grammar >= 0.35 { 0.70 } else { 0.45 };
        add(
            "RC29",
            fit,
            "Numbered markers without underlines",
            "Check agreement, tense, relatives, and verbals",
        );
    }

    // Implicit-meaning items: pass-through plus idiom scoring.
    if !fmt.bullets && !fmt.insert_parens {
        add(
            "RC21",
            0.55,
            "Pass-through candidate with weak format signals",
            "Practice inferring what an expression means in context",
        );
    }
    let idiom = signals::score_idiom(&txt, &fmt);
    let has_marks = fmt.bullets || fmt.underline || fmt.insert_parens;
    if idiom >= 0.60 {
        add(
            "RC21",
            if has_marks { 0.70 } else { 0.78 },
            "Strong idiomatic or figurative expression signals",
            "Explain what the key figurative expression means here",
        );
    } else if idiom >= 0.45 {
        add(
            "RC21",
            if has_marks { 0.60 } else { 0.68 },
            "Figurative expression signals detected",
            "Work out the role the expression plays in the sentence",
        );
    }

    // Lexical candidates marked inline.
    if fmt.bullets && fmt.inline_lex {
        add(
            "RC30",
            0.65,
            "Short lexical candidates follow the numbered markers",
            "Look for the collocation that clashes with context",
        );
    }

    let sem_lexical = signals::score_lexical_semantic(&txt);
    if sem_lexical >= 0.35 {
        add(
            "RC30",
            sem_lexical,
            "Lexical nuance and collocation cues without markers",
            "Check word appropriateness against the context",
        );
    }

    let sem_grammar = signals::score_grammar_semantic(&txt);
    if sem_grammar >= 0.30 {
        add(
            "RC29",
            sem_grammar,
            "Grammar meta vocabulary without markers",
            "Check tense, agreement, prepositions, and articles",
        );
    }

    // Structure-only grammar candidate on clean prose.
    if struct_grammar >= 0.35 && !notice && !is_bio && !strong_shift {
        let fit = if (80..=220).contains(&tokens) && struct_grammar >= 0.50 {
            struct_grammar.max(0.62)
        } else {
            struct_grammar
        };
        add(
            "RC29",
            fit,
            "Dense relative and subordinate structure suits grammar judgment",
            "Pick five short spans and make exactly one ungrammatical",
        );
    }

    // Chart/statistics description with enough sentences for options.
    let chart_like = signals::RE_CHARTY.is_match(&txt) || signals::RE_TABLEY.is_match(&txt);
    if chart_like && m.sentences >= 5 {
        add(
            "RC25",
            0.78,
            "Passage describes chart or statistical figures across five-plus sentences",
            "Reuse the passage's factual sentences as options and test each",
        );
    }

    // Personal biography (not group/culture description).
    if is_bio {
        let first_sentence = txt.split(&['.', '!', '?'][..]).next().unwrap_or("");
        let group_like = RE_GROUP_SUBJECT.is_match(first_sentence);
        let pronouns = RE_PRONOUN.find_iter(&txt).count();
        let years = signals::RE_YEAR.find_iter(&txt).count();
        if !group_like && years >= 1 && (pronouns >= 1 || m.proper_like >= 2) {
            add(
                "RC26",
                0.82,
                "Personal biography: birth, career, and dated life events",
                "Order the life events chronologically before writing options",
            );
        }
    }

    if signals::looks_irrelevant_flow(&txt, &m, &fmt, strong_shift) {
        add(
            "RC35",
            0.72,
            "Five-plus sentence single-topic exposition suits irrelevant-sentence removal",
            "Find the sentence that fits the topic least",
        );
    }

    if signals::RE_ARGUMENT.is_match(&txt) {
        add(
            "RC20",
            0.70,
            "Obligation and recommendation phrasing detected",
            "Map the claim, grounds, and counterpoint",
        );
    }

    if signals::RE_EMOTION.is_match(&txt) {
        if strong_shift {
            add(
                "RC19",
                0.80,
                "Narrative with both emotion polarities and a turning point",
                "Order the initial, turning, and final feelings",
            );
        } else {
            add(
                "RC19",
                0.60,
                "Emotion vocabulary detected",
                "Separate initial, turning, and final feelings",
            );
        }
    }

    match signals::classify_paragraph_labels(&txt, &m, &fmt, strong_shift) {
        Some("RC36") => add(
            "RC36",
            0.72,
            "(A)(B)(C) labels over definition/example exposition",
            "Use connectives and references to order the paragraphs",
        ),
        Some("RC37") => add(
            "RC37",
            0.72,
            "(A)(B)(C) labels over research-report or stepwise argument prose",
            "Track hypothesis, method, and result to place each paragraph",
        ),
        _ => {}
    }

    // Clean-prose insertion candidates (no explicit slots).
    if !fmt.insert_parens {
        if signals::looks_insertion_friendly(&txt, &m, &fmt, strong_shift, notice) {
            add(
                "RC38",
                0.72,
                "Pivot sentences in clean exposition allow sentence insertion",
                "Decide where the transition sentence keeps the flow natural",
            );
        }
        if signals::looks_argument_insertion(&txt, &m, &fmt, strong_shift, notice) {
            add(
                "RC39",
                0.74,
                "Argumentative prose with strong contrast allows hard insertion",
                "Find where the argument direction changes",
            );
        }
    }

    // Set-structure signals.
    if fmt.lower_parens {
        add(
            "RC41",
            0.72,
            "(a)-(e) lowercase labels: set passage",
            "Track each paragraph's point and their links",
        );
        add(
            "RC42",
            0.70,
            "(a)-(e) lowercase labels: set passage, harder member",
            "Prepare fine-grained inference and contrast",
        );
    }
    let (set_first, set_second) = signals::score_set_signals(&txt, &fmt);
    if set_first > 0.0 {
        add(
            "RC41",
            0.60 + set_first,
            "Part/Section/question-range markers suggest a set",
            "Map paragraph relationships and the main point",
        );
    }
    if set_second > 0.0 {
        add(
            "RC42",
            0.58 + set_second,
            "Part/Section/question-range markers suggest a set",
            "Prepare detail inference and comparison",
        );
    }

    // Expository core: gist/topic/title plus blank and summary families.
    if tokens >= 90 && !fmt.notice_keys && !is_bio && !strong_shift {
        add(
            "RC24",
            0.86,
            "Expository prose: title inference",
            "Compress the whole flow into one phrase",
        );
        add(
            "RC23",
            0.84,
            "Expository prose: topic identification",
            "State the core concept in one sentence",
        );
        add(
            "RC22",
            0.80,
            "Expository prose: main point identification",
            "Summarize the writer's overall message",
        );

        if signals::looks_blank_friendly(&txt, &m, &fmt) {
            add(
                "RC31",
                0.84,
                "Key concept word can be blanked",
                "Blank the pivotal noun phrase",
            );
        }
        add(
            "RC32",
            0.78,
            "Phrase-level blank inference possible",
            "Blank a cause-effect or transition phrase",
        );
        let clause_fit = if signals::looks_clause_blank(&txt, &m, &fmt) {
            0.84
        } else {
            0.74
        };
        add(
            "RC33",
            clause_fit,
            "Clause-level blank on abstract reasoning",
            "Blank a summarizing or pivoting clause",
        );

        let global_fit = if signals::looks_global_blank(&txt, &m, &fmt) {
            if tokens >= 170 {
                0.86
            } else {
                0.83
            }
        } else if tokens >= 150 {
            0.78
        } else {
            0.0
        };
        if global_fit > 0.0 {
            add(
                "RC34",
                global_fit,
                "Long exposition with causal pivots suits a hard global blank",
                "Blank a mid-passage clause that carries the causal link",
            );
        }

        let summary_fit = if signals::looks_ab_summary(&txt, &m, &fmt) {
            if tokens >= 150 {
                0.86
            } else {
                0.83
            }
        } else {
            0.72
        };
        add(
            "RC40",
            summary_fit,
            "Content compresses into two contrasting aspects",
            "Name the two aspects the summary slots should hold",
        );
    }

    if tokens >= 220 {
        add(
            "RC41",
            0.62,
            "Long exposition satisfies set-passage length",
            "-",
        );
        add(
            "RC42",
            0.60,
            "Long exposition satisfies set-passage length",
            "-",
        );
    }

    // Purpose items from letters and intent phrasing.
    let letter = signals::has_letter_format(&txt);
    let intent = signals::has_intent_phrasing(&txt);
    if letter {
        let fit = if intent { 0.85 } else { 0.80 };
        let reason = if intent {
            "Letter format with an explicit request or purpose"
        } else {
            "Letter format detected"
        };
        add(
            "RC18",
            fit,
            reason,
            "Summarize the writer's intent in one sentence",
        );
    } else if intent && tokens <= 120 && !chart_like {
        add(
            "RC18",
            0.70,
            "Short announcement with a clear participation or inquiry purpose",
            "State the document's overall purpose in one sentence",
        );
    }

    inject_evergreen(&mut cands, band, &fmt, notice, is_bio);

    // Per-type max-fit dedupe, preserving first-seen order.
    let mut merged: IndexMap<String, CandidateType> = IndexMap::new();
    for cand in cands {
        match merged.entry(cand.type_code.clone()) {
            indexmap::map::Entry::Occupied(mut entry) => {
                if cand.fit > entry.get().fit {
                    entry.insert(cand);
                }
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(cand);
            }
        }
    }

    apply_length_boosts(&mut merged, &m, tokens);
    apply_signal_boosts(&mut merged, &txt, &m, &fmt, notice, is_bio);

    merged.retain(|code, _| band.allows(code));

    let mut out: Vec<CandidateType> = merged.into_values().collect();
    out.sort_by(|a, b| b.fit.partial_cmp(&a.fit).unwrap_or(std::cmp::Ordering::Equal));
    let mut out = collapse_set_pair(out);
    out.truncate(config.max_rule_candidates);
    out
}

/// Inject evergreen candidates that survive the gate and shape blocks.
fn inject_evergreen(
    cands: &mut Vec<CandidateType>,
    band: Band,
    fmt: &FormatSignals,
    notice: bool,
    is_bio: bool,
) {
    let existing: Vec<String> = cands.iter().map(|c| c.type_code.clone()).collect();
    let boost = if fmt.strong() || notice { 0.0 } else { 0.03 };

    for (code, base) in EVERGREEN {
        if !band.allows(code) || existing.iter().any(|t| t.as_str() == *code) {
            continue;
        }
        if is_bio && BIO_BLOCKED_EVERGREEN.contains(code) {
            continue;
        }
        if notice && NOTICE_BLOCKED_EVERGREEN.contains(code) {
            continue;
        }
        cands.push(CandidateType::new(
            *code,
            base + boost,
            "Generic type viable without strong format signals",
            "Review the passage's overall logic, structure, and vocabulary",
        ));
    }
}

fn bump(map: &mut IndexMap<String, CandidateType>, code: &str, delta: f64) {
    if let Some(c) = map.get_mut(code) {
        c.fit = (c.fit + delta).clamp(0.0, 1.0);
    }
}

/// Length-profile corrections over the merged candidates.
fn apply_length_boosts(map: &mut IndexMap<String, CandidateType>, m: &PassageMetrics, tokens: usize) {
    if tokens < 150 {
        for (t, v) in [("RC18", 0.06), ("RC19", 0.04), ("RC27", 0.05), ("RC28", 0.03), ("RC24", 0.02)] {
            bump(map, t, v);
        }
    } else if tokens < 190 {
        for (t, v) in [
            ("RC20", 0.03),
            ("RC22", 0.04),
            ("RC23", 0.04),
            ("RC26", 0.03),
            ("RC25", 0.03),
            ("RC27", 0.02),
            ("RC28", 0.02),
            ("RC29", 0.04),
            ("RC30", 0.03),
            ("RC36", 0.03),
        ] {
            bump(map, t, v);
        }
    } else {
        for (t, v) in [
            ("RC31", 0.04),
            ("RC32", 0.04),
            ("RC33", 0.03),
            ("RC34", 0.04),
            ("RC35", 0.03),
            ("RC37", 0.03),
            ("RC38", 0.03),
            ("RC39", 0.03),
            ("RC40", 0.03),
        ] {
            bump(map, t, v);
        }
        if tokens >= 220 {
            bump(map, "RC41", 0.04);
            bump(map, "RC42", 0.04);
        }
    }

    if m.avg_sentence_len >= 18.0 {
        for (t, v) in [("RC31", 0.02), ("RC32", 0.03), ("RC33", 0.03), ("RC29", 0.02)] {
            bump(map, t, v);
        }
    }
    if m.paragraphs >= 2 {
        for (t, v) in [("RC22", 0.03), ("RC23", 0.03), ("RC32", 0.02), ("RC33", 0.02), ("RC40", 0.03)] {
            bump(map, t, v);
        }
    }
    if m.paragraphs >= 3 && tokens >= 180 {
        bump(map, "RC41", 0.03);
        bump(map, "RC42", 0.03);
    }
}

/// Content-signal corrections over the merged candidates.
fn apply_signal_boosts(
    map: &mut IndexMap<String, CandidateType>,
    txt: &str,
    m: &PassageMetrics,
    fmt: &FormatSignals,
    notice: bool,
    is_bio: bool,
) {
    if m.discourse_markers >= 4 {
        for (t, v) in [
            ("RC22", 0.05),
            ("RC23", 0.04),
            ("RC31", 0.03),
            ("RC32", 0.03),
            ("RC33", 0.03),
            ("RC38", 0.03),
            ("RC39", 0.03),
        ] {
            bump(map, t, v);
        }
    }
    if m.deictics >= 6 {
        for (t, v) in [
            ("RC38", 0.04),
            ("RC39", 0.04),
            ("RC36", 0.03),
            ("RC37", 0.03),
            ("RC22", 0.02),
            ("RC40", 0.02),
        ] {
            bump(map, t, v);
        }
    }
    if signals::RE_ARGUMENT_META.is_match(txt) && signals::RE_STRONG_CONTRAST.is_match(txt) {
        bump(map, "RC39", 0.06);
    }

    if !notice && !is_bio && signals::RE_PAIRING.is_match(&txt.to_lowercase()) {
        bump(map, "RC40", 0.06);
    }

    // Chart/statistics reinforcement needs five usable sentences.
    let chart_like = signals::RE_TABLEY.is_match(txt) || signals::RE_CHARTY.is_match(txt);
    if m.sentences >= 5 && (chart_like || m.numerics >= 3) {
        let years = signals::RE_YEAR.find_iter(txt).count();
        let compares = signals::RE_COMPARE.find_iter(txt).count();
        let groups = signals::RE_GROUPS.find_iter(txt).count();
        if m.numerics >= 3 {
            bump(map, "RC25", 0.08);
        }
        if chart_like {
            bump(map, "RC25", 0.06);
        }
        if years >= 2 {
            bump(map, "RC25", 0.05);
        }
        if compares >= 1 {
            bump(map, "RC25", 0.04);
        }
        if groups >= 1 {
            bump(map, "RC25", 0.04);
        }
    }

    if is_bio {
        bump(map, "RC26", 0.06);
    }
    if m.ttr < 0.35 {
        bump(map, "RC31", 0.04);
        bump(map, "RC40", 0.04);
    }
    if m.proper_like >= 6 {
        for t in ["RC22", "RC23", "RC31", "RC40"] {
            bump(map, t, 0.02);
        }
    }

    let letter = signals::has_letter_format(txt);
    let intent = signals::has_intent_phrasing(txt);
    if letter {
        bump(map, "RC18", 0.10);
    }
    if intent {
        bump(map, "RC18", 0.06);
    }
    if letter && intent {
        bump(map, "RC18", 0.04);
    }

    if signals::RE_EMOTION.is_match(txt) {
        bump(map, "RC19", 0.06);
    }
    if signals::RE_ARGUMENT.is_match(txt) {
        bump(map, "RC20", 0.05);
    }
    if signals::score_idiom(txt, fmt) > 0.0 {
        bump(map, "RC21", 0.05);
    }

    if notice {
        bump(map, "RC27", 0.12);
        bump(map, "RC28", 0.06);
        // Notices displace the expository evergreen families.
        for (t, v) in [
            ("RC22", -0.12),
            ("RC23", -0.12),
            ("RC24", -0.08),
            ("RC31", -0.12),
            ("RC32", -0.10),
            ("RC33", -0.10),
            ("RC40", -0.10),
        ] {
            bump(map, t, v);
        }
    } else if fmt.notice_keys || fmt.url {
        bump(map, "RC27", 0.05);
        bump(map, "RC28", 0.04);
    }

    if signals::RE_GRAMMAR_META.is_match(txt) {
        bump(map, "RC29", 0.04);
    }
    if signals::RE_LEXICAL_META.is_match(txt) {
        bump(map, "RC30", 0.04);
    }
    if fmt.bullets && fmt.underline {
        bump(map, "RC29", 0.08);
        bump(map, "RC30", 0.06);
    }
    if fmt.insert_parens {
        bump(map, "RC35", 0.06);
        bump(map, "RC38", 0.05);
    }
    if fmt.paragraph_labels {
        bump(map, "RC36", 0.05);
        bump(map, "RC37", 0.04);
    }
    if fmt.lower_parens {
        bump(map, "RC41", 0.05);
        bump(map, "RC42", 0.05);
    }

    if signals::looks_expository_topic(txt, m, fmt) {
        bump(map, "RC24", 0.10);
        bump(map, "RC23", 0.06);
        bump(map, "RC22", 0.04);
    }
}

/// Collapse the RC41/RC42 pair into the combined set code.
fn collapse_set_pair(cands: Vec<CandidateType>) -> Vec<CandidateType> {
    let first = cands.iter().find(|c| c.type_code == "RC41").map(|c| c.fit);
    let second = cands.iter().find(|c| c.type_code == "RC42").map(|c| c.fit);
    let (Some(first), Some(second)) = (first, second) else {
        return cands;
    };

    let mut out: Vec<CandidateType> = cands
        .into_iter()
        .filter(|c| c.type_code != "RC41" && c.type_code != "RC42")
        .collect();
    out.push(CandidateType::new(
        "RC41_42",
        first.max(second),
        "Set passage: both member questions generated together",
        "Selecting the set produces every member item",
    ));
    out.sort_by(|a, b| b.fit.partial_cmp(&a.fit).unwrap_or(std::cmp::Ordering::Equal));
    out
}

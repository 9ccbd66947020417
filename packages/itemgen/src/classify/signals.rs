//! Surface and content signal library for the rule-based scorer.
//!
//! Format signals (markers, labels, section keys) are detected on the raw
//! passage before sanitization strips them; content signals run on the
//! sanitized text.

use std::sync::LazyLock;

use regex::Regex;

use crate::classify::metrics::PassageMetrics;

// ---------------------------------------------------------------------------
// Format-like signals (raw text)
// ---------------------------------------------------------------------------

pub static RE_UNDERLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<u>.*?</u>").unwrap());
pub static RE_NUM_BULLETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[①②③④⑤]").unwrap());
pub static RE_INSERT_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*[①②③④⑤]\s*\)").unwrap());
pub static RE_PARAGRAPH_LABELS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([A-C]\)").unwrap());
pub static RE_LOWER_PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([a-e]\)").unwrap());
pub static RE_NOTICE_KEYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Title|Date|Location|Eligibility|Registration|Fee|Contact|Note|Time|Venue|Deadline|Participants?|Age requirement|Restrictions?|Details?|Awards?|Evaluation Criteria|Activities?|Duration|Period|Schedule|Return|Service Range|Purchase Information|Tour Times?|Renovation Period|Card Type|Additional Information|Caution)\s*:",
    )
    .unwrap()
});
pub static RE_WEBSITE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://|www\.").unwrap());

/// Marker followed by a short lexical candidate ("① informative").
pub static RE_INLINE_LEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[①②③④⑤]\s*[A-Za-z-]+(?:\s+[A-Za-z-]+){0,2}").unwrap());

/// Format signals detected on the raw (pre-sanitization) passage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatSignals {
    pub bullets: bool,
    pub underline: bool,
    pub insert_parens: bool,
    pub inline_lex: bool,
    pub paragraph_labels: bool,
    pub lower_parens: bool,
    pub notice_keys: bool,
    pub url: bool,
}

impl FormatSignals {
    pub fn detect(raw: &str) -> Self {
        Self {
            bullets: RE_NUM_BULLETS.is_match(raw),
            underline: RE_UNDERLINE.is_match(raw),
            insert_parens: RE_INSERT_PARENS.is_match(raw),
            inline_lex: RE_INLINE_LEX.is_match(raw),
            paragraph_labels: RE_PARAGRAPH_LABELS.is_match(raw),
            lower_parens: RE_LOWER_PARENS.is_match(raw),
            notice_keys: RE_NOTICE_KEYS.is_match(raw),
            url: RE_WEBSITE_URL.is_match(raw),
        }
    }

    /// A strong authoring-format signal is present.
    pub fn strong(&self) -> bool {
        self.notice_keys || self.insert_parens || self.underline
    }
}

// ---------------------------------------------------------------------------
// Content signals (sanitized text)
// ---------------------------------------------------------------------------

pub static RE_TABLEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(table|figure|chart|graph)\b").unwrap());
pub static RE_CHARTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(percent|percentage|survey|dataset|index|rank(ed)?|ratio|per capita|growth rate|decline|increase)\b").unwrap()
});
pub static RE_BIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(born\b|born in|was born in|died in|passed away|awarded|won the|career|early life|later years|retired|biograph|Nobel|prize)\b").unwrap()
});
pub static RE_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(should|must|ought to|need to|have to|has to|it is necessary to|it is (?:important|essential|crucial|critical) to|it would be better to)\b").unwrap()
});
pub static RE_EMOTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(feel|felt|anxious|relieved|disappointed|excited|upset|proud|afraid|confident|confidence)\b").unwrap()
});
pub static RE_TURNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(However|But|Then|Finally|At last|After (he|she|I)|After hearing)\b").unwrap()
});

/// Positive emotion vocabulary.
pub const POS_EMO: &[&str] = &[
    "relieved", "confident", "confidence", "excited", "proud", "joy", "joyful", "happy", "glad",
    "satisfied",
];

/// Negative emotion vocabulary.
pub const NEG_EMO: &[&str] = &[
    "anxious", "uneasy", "upset", "afraid", "nervous", "disappointed", "frustrated", "shaking",
    "troubled", "worried",
];

/// Letter openings and closings.
pub static RE_LETTER_DEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Dear\s+[A-Z][a-zA-Z]+|To whom it may concern|Dear\s+Friends)").unwrap()
});
pub static RE_LETTER_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Sincerely|Regards|Best regards|Yours truly|Many blessings)\b").unwrap()
});

/// Purpose/intent phrasing.
pub static RE_INTENT_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(I would like to (?:ask|request)|Please let me know|I ask you to|I want immediate action)\b").unwrap()
});
pub static RE_INTENT_INQUIRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(I am writing to inquire|I would like to know|I want to know|could not find (?:any )?information)\b").unwrap()
});
pub static RE_INTENT_GUIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(This is how you participate|Here is how you participate|You can bring your items)\b").unwrap()
});
pub static RE_INTENT_PROMO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bIf you'?re interested in\b|\bThis post is for you\b|\bIt'?s time to\b").unwrap()
});

/// Bullets and prices used by notice detection.
pub static RE_BULLET_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[∙•]|^\s*[-*]\s").unwrap());
pub static RE_PRICE_SIGN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[$￡€]\s*\d").unwrap());
static RE_DATE_OR_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(deadline|period|schedule|from\s+\w+\s+\d|\d{1,2}:\d{2}\s*(?:a\.m\.|p\.m\.)|tour\s+times?|renovation period)\b").unwrap()
});
static RE_NOTICE_SECTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(age requirement|restrictions?|participants?|awards?|evaluation criteria|activities?|service range|purchase information|tour times?|renovation period|card type|additional information)\b").unwrap()
});

/// Grammar/lexis meta vocabulary.
pub static RE_GRAMMAR_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tense|agreement|subject[-\s]?verb|preposition|article|pronoun|parallelism|comparative|superlative|modifier|participle|gerund|infinitive|voice|concord)\b").unwrap()
});
pub static RE_LEXICAL_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(word\s*choice|lexical|collocation|nuance|synonym|antonym|appropriate|inappropriate)\b").unwrap()
});
static RE_DERIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\w+(?:ness|tion|sion|ity|able|ible|ive|ment|ize|ise|ous)\b").unwrap()
});
static RE_CONTRAST_EVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(irrelevant|inaccurate|misleading|awkward)\b.*?\b(relevant|accurate|apt|fitting|natural)\b|\b(relevant|accurate|apt|fitting|natural)\b.*?\b(irrelevant|inaccurate|misleading|awkward)\b").unwrap()
});

/// Idiom shells and simile/metaphor cues.
static RE_IDIOM_SHELLS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bthe\s+[a-z]+?\s+in\s+the\s+room\b",
        r"(?i)\b[a-z]+-?ed\s+sword\b",
        r"(?i)\bball\s+is\s+in\s+(?:my|your|his|her|their|our)\s+court\b",
        r"(?i)\bon\s+thin\s+ice\b",
        r"(?i)\bglass\s+ceiling\b",
        r"(?i)\bslippery\s+slope\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static RE_SIMILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:like|as)\s+(?:a|an|the)?\s*[A-Za-z][A-Za-z\-']{3,}").unwrap());
pub const METAPHOR_CUES: &[&str] = &[
    "iceberg", "elephant", "sword", "ceiling", "slope", "anchor", "compass", "pillar", "bridge",
    "lens", "canvas",
];

/// Logical pivots for clause-level blanks.
pub static RE_CLAUSE_PIVOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(it follows that|in turn|therefore|thus|consequently|as a result)\b").unwrap()
});

/// Argument/meta vocabulary and contrast for hard insertions.
pub static RE_ARGUMENT_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(analogy|argument|reasoning|logic|this is why|the reason is|in reality|in fact|the essence of|fails to|undermines?)\b").unwrap()
});
pub static RE_STRONG_CONTRAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(by contrast|in contrast|however|but |yet |still,|nevertheless|nonetheless|on the other hand)\b").unwrap()
});

/// Sentence-insertion pivots.
pub static RE_SENTENCE_PIVOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(yes,|however,|but |in fact,|indeed,|for example,|by way of example,|without\b|once\b|thus,)").unwrap()
});

/// Research/experiment report signals.
pub static RE_RESEARCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(experiment|experimental|research|study|studies|data|dataset|measurements?|subjects?|participants?|they found that|we found that|results? (?:show|suggest|indicate)|observed that)\b").unwrap()
});
pub static RE_STRONG_EXPERIMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(experiment|experimental|randomi[sz]ed|control group|treatment group|placebo|subjects?|participants?|in one study|in a study|in an experiment)\b").unwrap()
});
pub static RE_REASONING_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(assume|assumption|principle|theory|model|equilibrium|equilibria|outcomes?|scenario|case in which|cases? where)\b").unwrap()
});
pub static RE_CAUSAL_CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(therefore|thus|consequently|as a result|hence|in turn)\b").unwrap()
});
pub static RE_DEFINITION_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(is|are|was|were)\s+(called|known as|defined as)\b|\b(refers to|means that)\b").unwrap()
});
pub static RE_EXAMPLE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(for example|for instance|similarly|in particular|in this sense|in practice|in the real world)\b").unwrap()
});

/// Two-aspect pairing signals for summary items.
pub static RE_PAIRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(on the one hand\b.*\bon the other hand\b|both\b.*\band\b|not only\b.*\bbut\b|while\b.*\b(but|and)\b|whereas\b)").unwrap()
});

/// Set-structure signals for long multi-part passages.
static RE_ROMAN_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*(?:i|ii|iii|iv|v)\s*\)").unwrap());
static RE_PART_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPart\s*(?:I|II|III|1|2|3)\b").unwrap());
static RE_SECTION_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSection\s*[A-C1-3]\b").unwrap());
static RE_Q_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bQuestions?\s*(?:\d+\s*[-–]\s*\d+|\d+\s*(?:and|&)\s*\d+)\b").unwrap()
});
static RE_FORMER_LATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(the\s+former|the\s+latter|respectively)\b").unwrap());

pub static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(18|19|20)\d{2}\b").unwrap());
pub static RE_COMPARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(compared to|compared with|than|whereas)\b").unwrap());
pub static RE_GROUPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(rural|urban|country|countries|region|regions|age groups?|respondents|survey)\b").unwrap()
});

// ---------------------------------------------------------------------------
// Derived predicates and scorers
// ---------------------------------------------------------------------------

/// Count hits from a word set in lowercased text.
fn word_hits(lc: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| lc.contains(*w)).count()
}

/// A narrative with both emotional polarities or a turning point.
pub fn emotion_shift(txt: &str) -> bool {
    let lc = txt.to_lowercase();
    let neg = word_hits(&lc, NEG_EMO);
    let pos = word_hits(&lc, POS_EMO);
    (neg > 0 && pos > 0) || (RE_TURNING.is_match(txt) && RE_EMOTION.is_match(txt))
}

/// Notice/announcement shape: section labels plus dense factual signals.
pub fn is_notice_like(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if txt.is_empty() {
        return false;
    }
    let strong = fmt.notice_keys || fmt.url;

    let fact_signals = [
        RE_BULLET_DOT.is_match(txt),
        RE_PRICE_SIGN.is_match(txt),
        RE_DATE_OR_PERIOD.is_match(txt),
        RE_NOTICE_SECTIONS.is_match(txt),
    ]
    .iter()
    .filter(|b| **b)
    .count();

    (strong && m.sentences >= 3) || (fact_signals >= 2 && m.sentences >= 4 && m.tokens <= 220)
}

/// Single-topic expository/analytic shape (no letter, notice, biography,
/// chart table, or emotional narrative).
pub fn looks_expository_topic(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if m.tokens < 90 || m.sentences < 3 {
        return false;
    }
    if fmt.notice_keys || fmt.url || RE_BIO.is_match(txt) {
        return false;
    }
    if RE_LETTER_DEAR.is_match(txt) || RE_LETTER_CLOSE.is_match(txt) {
        return false;
    }
    if emotion_shift(txt) {
        return false;
    }
    m.discourse_markers >= 2
}

/// Word-level blank suitability: expository, label-free, long sentences.
pub fn looks_blank_friendly(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 90 || m.tokens > 260 {
        return false;
    }
    if fmt.bullets || fmt.insert_parens || fmt.paragraph_labels || fmt.lower_parens {
        return false;
    }
    m.avg_sentence_len >= 14.0
}

/// Clause-level blank suitability: long abstract reasoning with pivots.
pub fn looks_clause_blank(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 120 || m.tokens > 260 || m.sentences < 5 {
        return false;
    }
    if m.discourse_markers < 3 || m.deictics < 5 {
        return false;
    }
    RE_CLAUSE_PIVOT.is_match(txt)
}

/// Long-passage global blank suitability.
pub fn looks_global_blank(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 140 || m.tokens > 270 || m.sentences < 5 {
        return false;
    }
    if m.discourse_markers < 3 || m.deictics < 5 || m.avg_sentence_len < 16.0 {
        return false;
    }
    let lc = txt.to_lowercase();
    RE_CLAUSE_PIVOT.is_match(&lc)
        || lc.contains("however")
        || lc.contains("instead")
        || lc.contains("on the other hand")
}

/// Two-aspect summary suitability.
pub fn looks_ab_summary(txt: &str, m: &PassageMetrics, fmt: &FormatSignals) -> bool {
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 90 || m.tokens > 260 || m.sentences < 3 || m.discourse_markers < 2 {
        return false;
    }
    let lc = txt.to_lowercase();
    RE_PAIRING.is_match(&lc)
        || lc.contains("while")
        || lc.contains("whereas")
        || lc.contains("although")
}

/// Irrelevant-sentence suitability: ≥5 sentences of single-topic prose.
pub fn looks_irrelevant_flow(
    txt: &str,
    m: &PassageMetrics,
    fmt: &FormatSignals,
    strong_emotion_shift: bool,
) -> bool {
    if m.sentences < 5 || m.tokens < 70 || m.tokens > 260 {
        return false;
    }
    if is_notice_like(txt, m, fmt) || fmt.notice_keys || fmt.url {
        return false;
    }
    if RE_BIO.is_match(txt) || RE_LETTER_DEAR.is_match(txt) || RE_LETTER_CLOSE.is_match(txt) {
        return false;
    }
    if strong_emotion_shift {
        return false;
    }
    looks_expository_topic(txt, m, fmt)
}

/// Sentence-insertion suitability on clean prose.
pub fn looks_insertion_friendly(
    txt: &str,
    m: &PassageMetrics,
    fmt: &FormatSignals,
    strong_emotion_shift: bool,
    notice_like: bool,
) -> bool {
    if notice_like || strong_emotion_shift {
        return false;
    }
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 120 || m.tokens > 230 || m.sentences < 5 {
        return false;
    }
    RE_SENTENCE_PIVOT.is_match(txt)
}

/// Hard-insertion suitability: argumentative prose with strong contrast.
pub fn looks_argument_insertion(
    txt: &str,
    m: &PassageMetrics,
    fmt: &FormatSignals,
    strong_emotion_shift: bool,
    notice_like: bool,
) -> bool {
    if notice_like || strong_emotion_shift {
        return false;
    }
    if !looks_expository_topic(txt, m, fmt) {
        return false;
    }
    if m.tokens < 130 || m.tokens > 260 || m.sentences < 5 {
        return false;
    }
    RE_ARGUMENT_META.is_match(txt) && RE_STRONG_CONTRAST.is_match(txt)
}

/// Classify an (A)(B)(C)-labeled passage into an ordering family.
pub fn classify_paragraph_labels(
    txt: &str,
    m: &PassageMetrics,
    fmt: &FormatSignals,
    strong_emotion_shift: bool,
) -> Option<&'static str> {
    if !fmt.paragraph_labels {
        return None;
    }
    if strong_emotion_shift || is_notice_like(txt, m, fmt) || fmt.notice_keys {
        return None;
    }
    if RE_BIO.is_match(txt) || RE_LETTER_DEAR.is_match(txt) || RE_LETTER_CLOSE.is_match(txt) {
        return None;
    }
    if m.tokens < 70 || m.tokens > 260 || m.sentences < 4 {
        return None;
    }

    let lc = txt.to_lowercase();
    let expository = looks_expository_topic(txt, m, fmt);
    let research = RE_RESEARCH.find_iter(&lc).count();
    let strong_exp = RE_STRONG_EXPERIMENT.find_iter(&lc).count();
    let reasoning = RE_REASONING_META.find_iter(&lc).count();
    let causal = RE_CAUSAL_CHAIN.find_iter(&lc).count();
    let example = RE_EXAMPLE_CUE.find_iter(&lc).count();
    let definition = RE_DEFINITION_CUE.find_iter(&lc).count();

    // Experiment-report prose orders by hypothesis/method/result.
    if strong_exp >= 1 && research >= 2 {
        return Some("RC37");
    }
    // Definition/example expository prose with incidental research mentions.
    if research >= 1 && expository && (example + definition) >= 2 && reasoning == 0 {
        return Some("RC36");
    }
    // Stepwise argumentation without experiment vocabulary.
    if expository && reasoning >= 1 && causal >= 1 {
        return Some("RC37");
    }
    if expository && (example >= 1 || definition >= 1) {
        return Some("RC36");
    }
    if expository {
        return Some("RC36");
    }
    Some("RC37")
}

/// Lexical-appropriateness content score (no format markers needed).
pub fn score_lexical_semantic(txt: &str) -> f64 {
    let mut score: f64 = 0.0;
    if RE_LEXICAL_META.is_match(txt) {
        score += 0.35;
    }
    if RE_CONTRAST_EVAL.is_match(txt) {
        score += 0.25;
    }
    if RE_DERIV.find_iter(txt).count() >= 3 {
        score += 0.10;
    }
    score.min(0.80)
}

/// Grammar-judgment meta score.
pub fn score_grammar_semantic(txt: &str) -> f64 {
    if RE_GRAMMAR_META.is_match(txt) {
        0.30
    } else {
        0.0
    }
}

/// Grammar-judgment structural score.
///
/// Estimates whether five short spans could be underlined with exactly one
/// made ungrammatical, judging from sentence structure alone: enough
/// length, several sentences, and relative/subordinate/auxiliary density.
pub fn score_grammar_structure(txt: &str, m: &PassageMetrics) -> f64 {
    if txt.is_empty() || m.tokens < 60 || m.tokens > 260 || m.sentences < 4 {
        return 0.0;
    }

    let lc = txt.to_lowercase();
    let rel = count_words(
        &lc,
        &["which", "that", "who", "whom", "whose", "where", "when"],
    );
    let sub = count_words(
        &lc,
        &[
            "because", "although", "though", "while", "when", "if", "unless", "since", "after",
            "before",
        ],
    );
    let aux = count_words(
        &lc,
        &[
            "am", "is", "are", "was", "were", "has", "have", "had", "do", "does", "did", "can",
            "could", "should", "would", "must", "may", "might",
        ],
    );

    let mut score: f64 = 0.0;
    score += match rel {
        0 => 0.0,
        1 => 0.15,
        _ => 0.25,
    };
    score += match sub {
        0 => 0.0,
        1 => 0.10,
        _ => 0.20,
    };
    if m.sentences >= 5 {
        score += 0.10;
    }
    if m.tokens >= 100 {
        score += 0.10;
    }
    if aux >= 10 {
        score += 0.05;
    }
    score.min(0.65)
}

fn count_words(lc: &str, words: &[&str]) -> usize {
    lc.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| words.contains(w))
        .count()
}

/// Idiom/metaphor interpretation score.
///
/// Strong format signals dampen the score slightly: marker-driven
/// families take precedence on such passages.
pub fn score_idiom(txt: &str, fmt: &FormatSignals) -> f64 {
    let shell = RE_IDIOM_SHELLS.iter().any(|p| p.is_match(txt));
    let simile = RE_SIMILE.is_match(txt);
    let lc = txt.to_lowercase();
    let cues = word_hits(&lc, METAPHOR_CUES);

    let mut score = 0.0;
    if shell {
        score += 0.50;
    }
    if simile {
        score += 0.30;
    }
    score += match cues {
        0 => 0.0,
        1 => 0.10,
        _ => 0.20,
    };

    if fmt.bullets || fmt.underline || fmt.insert_parens {
        score *= 0.85;
    }
    score
}

/// Set-structure scores for the two set members.
pub fn score_set_signals(txt: &str, fmt: &FormatSignals) -> (f64, f64) {
    let mut first = 0.0;
    let mut second = 0.0;
    let mut bump = |a: f64, b: f64, cond: bool| {
        if cond {
            first += a;
            second += b;
        }
    };
    bump(0.18, 0.15, fmt.lower_parens);
    bump(0.10, 0.08, RE_ROMAN_PARENS.is_match(txt));
    bump(0.08, 0.06, RE_PART_HEADING.is_match(txt));
    bump(0.06, 0.05, RE_SECTION_HEAD.is_match(txt));
    bump(0.07, 0.06, RE_Q_RANGE.is_match(txt));
    bump(0.05, 0.05, RE_FORMER_LATTER.is_match(txt));

    let paragraphs = txt.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    if paragraphs >= 2 {
        let boost = (0.02 * (paragraphs as f64 - 1.0)).min(0.06);
        first += boost;
        second += boost;
    }
    (first.min(0.30), second.min(0.28))
}

/// Letter format present.
pub fn has_letter_format(txt: &str) -> bool {
    RE_LETTER_DEAR.is_match(txt) || RE_LETTER_CLOSE.is_match(txt)
}

/// Explicit purpose/intent phrasing present.
pub fn has_intent_phrasing(txt: &str) -> bool {
    RE_INTENT_REQUEST.is_match(txt)
        || RE_INTENT_INQUIRY.is_match(txt)
        || RE_INTENT_GUIDE.is_match(txt)
        || RE_INTENT_PROMO.is_match(txt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(text: &str) -> PassageMetrics {
        PassageMetrics::analyze(text)
    }

    #[test]
    fn test_format_signals_detected_on_raw() {
        let fmt = FormatSignals::detect("Pick ① <u>one</u> ( ② ) from (A) or (a).");
        assert!(fmt.bullets);
        assert!(fmt.underline);
        assert!(fmt.insert_parens);
        assert!(fmt.paragraph_labels);
        assert!(fmt.lower_parens);
    }

    #[test]
    fn test_emotion_shift_requires_both_polarities_or_turning() {
        assert!(emotion_shift("I was anxious. Finally I felt relieved."));
        assert!(!emotion_shift("The data was processed quickly."));
        assert!(!emotion_shift("I was anxious and worried throughout."));
    }

    #[test]
    fn test_notice_like() {
        let text = "Spring Camp Notice. Date: May 5. Fee: $10. Deadline: April 30. Contact: office.";
        let fmt = FormatSignals::detect(text);
        assert!(is_notice_like(text, &metrics(text), &fmt));

        let prose = "The tide comes in twice a day along most coastlines of the world.";
        let fmt = FormatSignals::detect(prose);
        assert!(!is_notice_like(prose, &metrics(prose), &fmt));
    }

    #[test]
    fn test_letter_and_intent() {
        let letter = "Dear Mr. Field, I am writing to inquire about the schedule. Sincerely, Ann";
        assert!(has_letter_format(letter));
        assert!(has_intent_phrasing(letter));
    }

    #[test]
    fn test_grammar_structure_score_needs_length() {
        let short = "This is short. It has little. Nothing more. Done now.";
        assert_eq!(score_grammar_structure(short, &metrics(short)), 0.0);
    }

    #[test]
    fn test_idiom_score_dampened_by_format() {
        let text = "Talking about it was the elephant in the room for everyone.";
        let clean = score_idiom(text, &FormatSignals::default());
        let marked = score_idiom(
            text,
            &FormatSignals {
                bullets: true,
                ..Default::default()
            },
        );
        assert!(clean > 0.0);
        assert!(marked < clean);
    }

    #[test]
    fn test_set_signals_capped() {
        let text = "(a) one (i) Part I Section A Questions 41-42 the former respectively\n\npara\n\npara";
        let fmt = FormatSignals::detect(text);
        let (first, second) = score_set_signals(text, &fmt);
        assert!(first <= 0.30 && second <= 0.28);
        assert!(first > 0.0);
    }
}

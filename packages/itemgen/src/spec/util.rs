//! Coercion utilities shared by the specification families.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Circled numerals, letters, and digits all name the same answer slots.
const ANSWER_MAP: &[(&str, &str)] = &[
    ("①", "1"),
    ("②", "2"),
    ("③", "3"),
    ("④", "4"),
    ("⑤", "5"),
    ("A", "1"),
    ("B", "2"),
    ("C", "3"),
    ("D", "4"),
    ("E", "5"),
    ("a", "1"),
    ("b", "2"),
    ("c", "3"),
    ("d", "4"),
    ("e", "5"),
];

static RE_ANSWER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(answer|correct)\s*[:：]\s*").unwrap());
static RE_OPTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[ABCDEabcde①②③④⑤1-5](?:[)\].:\-]|\s)\s*)").unwrap());

/// Normalize an answer token to "1".."5" where recognizable.
pub fn standardize_answer(value: &Value) -> String {
    let s = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let s = RE_ANSWER_PREFIX.replace(s.trim(), "").to_string();
    for (from, to) in ANSWER_MAP {
        if s == *from {
            return to.to_string();
        }
    }
    s
}

/// Coerce assorted option shapes into a list of strings.
///
/// Accepts a string list, a list of `{label, text}` objects, a keyed map
/// (`1..5`, `A..E`, `①..⑤`), or one newline-joined string with label
/// prefixes.
pub fn tidy_options(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => {
            const KEY_ORDERS: [[&str; 5]; 4] = [
                ["1", "2", "3", "4", "5"],
                ["A", "B", "C", "D", "E"],
                ["a", "b", "c", "d", "e"],
                ["①", "②", "③", "④", "⑤"],
            ];
            for order in KEY_ORDERS {
                if order.iter().all(|k| map.contains_key(*k)) {
                    return order
                        .iter()
                        .filter_map(|k| map.get(*k))
                        .map(value_text)
                        .filter(|s| !s.is_empty())
                        .collect();
                }
            }
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            pairs
                .into_iter()
                .map(|(_, v)| value_text(v))
                .filter(|s| !s.is_empty())
                .collect()
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(o) => ["text", "option", "value"]
                    .iter()
                    .find_map(|k| o.get(*k))
                    .map(value_text)
                    .unwrap_or_default(),
                other => value_text(other),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| RE_OPTION_LABEL.replace(l, "").trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

const QUESTION_ALIASES: &[&str] = &["question", "prompt", "stem"];
const OPTION_ALIASES: &[&str] = &["options", "choices", "answers", "answer_choices"];
const ANSWER_ALIASES: &[&str] = &[
    "correct_answer",
    "answer",
    "answer_key",
    "correct",
    "label",
    "solution",
    "key",
];
const EXPLANATION_ALIASES: &[&str] = &["explanation", "rationale", "reasoning", "analysis"];

/// Map common field-name variants onto the standard MCQ shape.
pub fn coerce_mcq_like(data: Value) -> Value {
    let Value::Object(mut map) = data else {
        return data;
    };

    promote_alias(&mut map, "question", QUESTION_ALIASES);
    promote_alias(&mut map, "options", OPTION_ALIASES);
    promote_alias(&mut map, "correct_answer", ANSWER_ALIASES);
    promote_alias(&mut map, "explanation", EXPLANATION_ALIASES);

    let question = map
        .get("question")
        .map(value_text)
        .unwrap_or_default();
    map.insert("question".into(), Value::String(question));

    let options = map.get("options").map(tidy_options).unwrap_or_default();
    map.insert(
        "options".into(),
        Value::Array(options.into_iter().map(Value::String).collect()),
    );

    let answer = map
        .get("correct_answer")
        .map(standardize_answer)
        .unwrap_or_default();
    map.insert("correct_answer".into(), Value::String(answer));

    if let Some(explanation) = map.get("explanation").map(value_text) {
        map.insert("explanation".into(), Value::String(explanation));
    }

    Value::Object(map)
}

fn promote_alias(map: &mut Map<String, Value>, canonical: &str, aliases: &[&str]) {
    let present = map
        .get(canonical)
        .map(|v| !matches!(v, Value::Null) && !matches!(v, Value::String(s) if s.trim().is_empty()))
        .unwrap_or(false);
    if present {
        return;
    }
    for alias in aliases {
        if *alias == canonical {
            continue;
        }
        if let Some(v) = map.get(*alias).cloned() {
            if !matches!(v, Value::Null) {
                map.insert(canonical.to_string(), v);
                return;
            }
        }
    }
}

/// Resolve an answer to a 1-based option index.
///
/// Accepts "1".."5" and exact option-text matches.
pub fn answer_to_index(answer: &str, options: &[String]) -> Option<u8> {
    let a = answer.trim();
    if let Ok(n) = a.parse::<u8>() {
        if (1..=5).contains(&n) {
            return Some(n);
        }
        return None;
    }
    options
        .iter()
        .position(|o| o == a)
        .map(|i| (i + 1) as u8)
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "to", "of", "in", "on", "for", "and", "or", "with", "by", "from",
];

static RE_OPTION_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[:\-–—;]\s*").unwrap());
static RE_OPTION_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'“”‘’()\[\]{}…\.]+"#).unwrap());

/// Condense an option to a short head phrase of at most `max_words`.
pub fn condense_option(option: &str, max_words: usize) -> String {
    let s = option.trim();
    let s = RE_OPTION_SPLIT
        .split(s)
        .filter(|p| !p.trim().is_empty())
        .last()
        .unwrap_or(s)
        .trim()
        .to_string();
    let s = RE_OPTION_NOISE.replace_all(&s, "").to_string();

    let tokens: Vec<&str> = s.split_whitespace().collect();
    let pruned: Vec<&str> = {
        let kept: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !STOPWORDS.contains(&t.to_ascii_lowercase().as_str()))
            .collect();
        if kept.is_empty() {
            tokens.clone()
        } else {
            kept
        }
    };
    let head = pruned
        .into_iter()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");
    let head = head
        .trim_matches(&[' ', ',', '.', '-', '–', '—', ';', ':'][..])
        .to_string();
    if head.is_empty() {
        tokens.first().unwrap_or(&"").to_string()
    } else {
        head
    }
}

/// Replace the first occurrence of `old` in `text` with `new`.
///
/// First pass matches on word boundaries case-insensitively; the second
/// tolerates flexible whitespace inside the needle.
pub fn replace_once(text: &str, old: &str, new: &str) -> String {
    if old.is_empty() || new.is_empty() {
        return text.to_string();
    }
    let strict = format!(r"(?i)\b{}\b", regex::escape(old));
    if let Ok(re) = Regex::new(&strict) {
        let replaced = re.replace(text, new);
        if replaced != text {
            return replaced.into_owned();
        }
    }
    let loose = format!("(?i){}", regex::escape(old).replace(r"\ ", r"\s+"));
    match Regex::new(&loose) {
        Ok(re) => re.replace(text, new).into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standardize_answer_variants() {
        assert_eq!(standardize_answer(&json!("③")), "3");
        assert_eq!(standardize_answer(&json!("B")), "2");
        assert_eq!(standardize_answer(&json!(4)), "4");
        assert_eq!(standardize_answer(&json!("Answer: ④")), "4");
        assert_eq!(standardize_answer(&json!("the full option text")), "the full option text");
    }

    #[test]
    fn test_tidy_options_from_keyed_map() {
        let v = json!({"A": "first", "B": "second", "C": "third", "D": "fourth", "E": "fifth"});
        assert_eq!(tidy_options(&v), vec!["first", "second", "third", "fourth", "fifth"]);
    }

    #[test]
    fn test_tidy_options_from_object_list() {
        let v = json!([{"label": "A", "text": "one"}, {"option": "two"}, {"value": "three"}]);
        assert_eq!(tidy_options(&v), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_tidy_options_from_labeled_string() {
        let v = json!("A) first\nB) second\n③ third");
        assert_eq!(tidy_options(&v), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_coerce_aliases() {
        let data = json!({
            "stem": "What is it?",
            "choices": ["a", "b", "c", "d", "e"],
            "answer_key": "②",
            "rationale": "because",
        });
        let coerced = coerce_mcq_like(data);
        assert_eq!(coerced["question"], "What is it?");
        assert_eq!(coerced["options"].as_array().unwrap().len(), 5);
        assert_eq!(coerced["correct_answer"], "2");
        assert_eq!(coerced["explanation"], "because");
    }

    #[test]
    fn test_answer_to_index() {
        let options: Vec<String> = ["alpha", "beta", "gamma", "delta", "epsilon"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(answer_to_index("2", &options), Some(2));
        assert_eq!(answer_to_index("gamma", &options), Some(3));
        assert_eq!(answer_to_index("7", &options), None);
        assert_eq!(answer_to_index("missing", &options), None);
    }

    #[test]
    fn test_condense_option() {
        assert_eq!(condense_option("a sense of the sublime", 2), "sense sublime");
        assert_eq!(condense_option("growth: economic expansion", 2), "economic expansion");
        assert_eq!(condense_option("the of", 2), "the of");
    }

    #[test]
    fn test_replace_once_word_boundary() {
        let out = replace_once("The cat sat on the cat mat.", "cat", "_____");
        assert_eq!(out, "The _____ sat on the cat mat.");
    }

    #[test]
    fn test_replace_once_loose_whitespace() {
        let out = replace_once("joined  words here", "joined words", "_____");
        assert_eq!(out, "_____ here");
    }
}

//! JSON recovery parser.
//!
//! Turns an LLM's textual reply into structured data, tolerating markdown
//! code fences, explanatory prose around the JSON body, smart quotes,
//! bare circled-numeral list markers, and trailing commas.
//!
//! Stages run in a fixed order and each stage is idempotent. Double-quote
//! normalization is deferred until after parsing: rewriting double quotes
//! before parsing can corrupt quoted JSON string content.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ItemGenError, Result};

/// Circled numerals used as list markers in item content.
pub const CIRCLED: [char; 5] = ['①', '②', '③', '④', '⑤'];

/// Opening/closing triple-backtick fences, with or without a language tag.
static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^```(?:json)?\s*|\s*```\s*$").unwrap());

/// Trailing comma immediately before a closing `}` or `]`.
static RE_TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Apostrophe-family typographic quotes. Double-quote variants are NOT
/// normalized here; see module docs.
const SMART_APOSTROPHES: [char; 3] = ['\u{2018}', '\u{2019}', '\u{2032}'];

/// Typographic double quotes, normalized only inside parsed string values.
const SMART_DOUBLE_QUOTES: [char; 5] = ['\u{201c}', '\u{201d}', '\u{201e}', '\u{201f}', '\u{2033}'];

/// Strip leading/trailing code fences.
fn strip_code_fences(text: &str) -> String {
    RE_FENCE.replace_all(text, "").trim().to_string()
}

/// Normalize apostrophe variants to ASCII `'`.
fn normalize_apostrophes(s: &str) -> String {
    s.chars()
        .map(|c| if SMART_APOSTROPHES.contains(&c) { '\'' } else { c })
        .collect()
}

/// Replace ASCII control characters (0x00-0x1F) with spaces.
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .map(|c| if (c as u32) < 0x20 { ' ' } else { c })
        .collect()
}

/// Wrap bare circled numerals in double quotes.
///
/// Only glyphs outside of string literals are quoted. A one-pass state
/// machine tracks whether the scan position is inside a quoted string,
/// honoring backslash escapes, so glyphs inside string values are left
/// untouched.
fn quote_bare_circled(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_str = false;
    let mut esc = false;
    for ch in s.chars() {
        if in_str {
            out.push(ch);
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        if ch == '"' {
            in_str = true;
            out.push(ch);
        } else if CIRCLED.contains(&ch) {
            out.push('"');
            out.push(ch);
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Locate the outermost JSON object.
///
/// If the whole text already parses, it is returned as-is; otherwise the
/// substring from the first `{` to the last `}` is taken.
fn extract_outer_json_block(s: &str) -> Result<String> {
    let s = s.trim();
    if serde_json::from_str::<Value>(s).is_ok() {
        return Ok(s.to_string());
    }
    let start = s.find('{');
    let end = s.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(s[start..=end].to_string()),
        _ => Err(ItemGenError::Recovery {
            cleaned: s.to_string(),
        }),
    }
}

/// Run the pre-parse cleaning stages.
fn preclean(raw: &str) -> Result<String> {
    let s = strip_code_fences(raw);
    let s = normalize_apostrophes(&s);
    let s = quote_bare_circled(&s);
    let s = RE_TRAILING_COMMA.replace_all(&s, "$1").to_string();
    extract_outer_json_block(&s)
}

/// Permissive literal parse, used as a last resort.
///
/// Tolerates Python-literal quoting: single-quoted strings and
/// `True`/`False`/`None` keywords. The text is rewritten to strict JSON
/// and reparsed; only object/array results are accepted.
fn parse_literal_lenient(s: &str) -> Option<Value> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_double = false;
    let mut in_single = false;
    let mut esc = false;

    while let Some(ch) = chars.next() {
        if in_double {
            out.push(ch);
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_double = false;
            }
            continue;
        }
        if in_single {
            if esc {
                // \' inside a single-quoted string needs no escape in JSON
                if ch == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(ch);
                }
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '\'' {
                out.push('"');
                in_single = false;
            } else if ch == '"' {
                out.push_str("\\\"");
            } else {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '"' => {
                in_double = true;
                out.push(ch);
            }
            '\'' => {
                in_single = true;
                out.push('"');
            }
            'T' if eat_keyword(&mut chars, "rue") => out.push_str("true"),
            'F' if eat_keyword(&mut chars, "alse") => out.push_str("false"),
            'N' if eat_keyword(&mut chars, "one") => out.push_str("null"),
            _ => out.push(ch),
        }
    }

    let value: Value = serde_json::from_str(&out).ok()?;
    match value {
        Value::Object(_) | Value::Array(_) => Some(value),
        _ => None,
    }
}

/// Consume `rest` from the iterator if it matches exactly.
fn eat_keyword(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, rest: &str) -> bool {
    let saved = chars.clone();
    for expected in rest.chars() {
        if chars.next() != Some(expected) {
            *chars = saved;
            return false;
        }
    }
    true
}

/// Recursively replace control characters in every string value.
pub fn strip_controls_deep(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, strip_controls_deep(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(strip_controls_deep).collect())
        }
        Value::String(s) => Value::String(strip_control_chars(&s)),
        other => other,
    }
}

/// Recursively normalize typographic quotes inside string values.
///
/// Safe only after parsing: structure is already fixed, so rewriting
/// double-quote glyphs cannot break the syntax.
fn normalize_quotes_deep(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_quotes_deep(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(normalize_quotes_deep).collect())
        }
        Value::String(s) => Value::String(
            s.chars()
                .map(|c| {
                    if SMART_APOSTROPHES.contains(&c) {
                        '\''
                    } else if SMART_DOUBLE_QUOTES.contains(&c) {
                        '"'
                    } else {
                        c
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Recover structured data from free-form model output.
///
/// Returns the parsed value after deep cleaning. If no stage yields
/// parseable structure the error carries the cleaned text for
/// diagnostics; callers treat that as a single failed attempt, not a
/// fatal condition.
pub fn recover_json(raw: &str) -> Result<Value> {
    let cleaned = preclean(raw)?;

    let parsed = match serde_json::from_str::<Value>(&cleaned) {
        Ok(v) => v,
        Err(_) => parse_literal_lenient(&cleaned).ok_or(ItemGenError::Recovery {
            cleaned: cleaned.clone(),
        })?,
    };

    Ok(normalize_quotes_deep(strip_controls_deep(parsed)))
}

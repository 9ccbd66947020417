//! Key-coercion adapter for loosely-structured model output.
//!
//! A fixed alias table maps common field-name variants onto the standard
//! spec keys, applied once at the orchestrator boundary before any
//! specification-specific normalization runs.

use serde_json::{Map, Value};

/// Fixed alias table: model key -> spec key.
pub const KEY_ALIASES: &[(&str, &str)] = &[
    ("stimulus", "passage"),
    ("question_stem", "question"),
];

/// Recursively rename aliased keys; backstop a missing top-level passage.
pub fn coerce_common_keys(value: Value, passage: Option<&str>) -> Value {
    let coerced = rename_deep(value);
    match (coerced, passage) {
        (Value::Object(mut map), Some(passage)) if !passage.trim().is_empty() => {
            if !map.contains_key("passage") {
                map.insert("passage".into(), Value::String(passage.to_string()));
            }
            Value::Object(map)
        }
        (other, _) => other,
    }
}

fn rename_deep(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let renamed = KEY_ALIASES
                    .iter()
                    .find(|(from, _)| *from == key)
                    .map(|(_, to)| to.to_string())
                    .unwrap_or(key);
                out.insert(renamed, rename_deep(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rename_deep).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_renamed_at_depth() {
        let data = json!({
            "stimulus": "text",
            "nested": {"question_stem": "Q?", "keep": 1},
            "list": [{"stimulus": "inner"}],
        });
        let out = coerce_common_keys(data, None);
        assert_eq!(out["passage"], "text");
        assert_eq!(out["nested"]["question"], "Q?");
        assert_eq!(out["list"][0]["passage"], "inner");
    }

    #[test]
    fn test_passage_backstop_top_level_only() {
        let data = json!({"question": "Q?", "nested": {}});
        let out = coerce_common_keys(data, Some("the source passage"));
        assert_eq!(out["passage"], "the source passage");
        assert!(out["nested"].get("passage").is_none());
    }

    #[test]
    fn test_existing_passage_untouched() {
        let data = json!({"passage": "original"});
        let out = coerce_common_keys(data, Some("backstop"));
        assert_eq!(out["passage"], "original");
    }
}

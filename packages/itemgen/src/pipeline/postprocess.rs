//! Output sanitation for finished items.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static RE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());

/// Sanitize text fields of a finished item.
///
/// Underline tags stay (they are item markup); markdown bold and script
/// blocks are stripped from every string value.
pub fn sanitize_html(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, sanitize_html(v))).collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_html).collect()),
        Value::String(s) => {
            let s = s.replace("**", "");
            Value::String(RE_SCRIPT.replace_all(&s, "").to_string())
        }
        other => other,
    }
}

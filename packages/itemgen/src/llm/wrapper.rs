//! Resilient request/response cycle returning structured JSON.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::ItemGenError;
use crate::llm::chat::{ChatModel, LlmParams};
use crate::recovery::{recover_json, strip_control_chars};

/// Sentinel returned when every attempt failed.
pub fn failure_sentinel() -> Value {
    json!({ "ok": false, "candidates": [] })
}

/// One resilient JSON call.
///
/// Sends the two-message request, strips control characters from the raw
/// text, and runs the recovery parser. On any failure (transport, timeout,
/// unparseable output) it sleeps `backoff_s * attempt` and retries, up to
/// `retries` extra attempts. After exhausting retries it returns the
/// `{"ok": false, "candidates": []}` sentinel instead of an error —
/// callers branch on `ok`. A parsed object that lacks an `ok` key gets
/// `"ok": true` injected.
pub async fn call_llm_json(
    model: &dyn ChatModel,
    system: &str,
    user: &str,
    params: &LlmParams,
    retries: u32,
    backoff_s: f64,
) -> Value {
    for attempt in 0..=retries {
        match call_once(model, system, user, params).await {
            Ok(value) => return mark_ok(value),
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    total = retries + 1,
                    error = %e,
                    "LLM JSON call attempt failed"
                );
                if attempt < retries {
                    let delay = backoff_s * (attempt + 1) as f64;
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
        }
    }
    failure_sentinel()
}

async fn call_once(
    model: &dyn ChatModel,
    system: &str,
    user: &str,
    params: &LlmParams,
) -> crate::error::Result<Value> {
    let deadline = Duration::from_secs_f64(params.timeout_s);
    let text = tokio::time::timeout(deadline, model.complete(system, user, params))
        .await
        .map_err(|_| ItemGenError::Timeout {
            timeout_s: params.timeout_s,
        })??;

    let clean = strip_control_chars(&text);
    recover_json(&clean)
}

fn mark_ok(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            map.entry("ok").or_insert(Value::Bool(true));
            Value::Object(map)
        }
        other => other,
    }
}

/// True when a wrapper result signals a failed call.
pub fn is_failure(value: &Value) -> bool {
    value.get("ok").and_then(Value::as_bool) == Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;

    #[tokio::test]
    async fn test_ok_injected_into_parsed_object() {
        let model = MockModel::new().with_default_reply(r#"{"candidates": []}"#);
        let value = call_llm_json(&model, "sys", "user", &LlmParams::default(), 0, 0.0).await;
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_existing_ok_not_overwritten() {
        let model = MockModel::new().with_default_reply(r#"{"ok": false, "feasible": false}"#);
        let value = call_llm_json(&model, "sys", "user", &LlmParams::default(), 0, 0.0).await;
        assert_eq!(value["ok"], false);
    }

    #[tokio::test]
    async fn test_sentinel_after_exhausted_retries() {
        let model = MockModel::new().with_default_reply("this is not json");
        let value = call_llm_json(&model, "sys", "user", &LlmParams::default(), 2, 0.0).await;
        assert!(is_failure(&value));
        assert_eq!(value["candidates"], serde_json::json!([]));
        // primary + 2 retries
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_garbage() {
        let model = MockModel::new()
            .with_reply_sequence(vec!["garbage".into(), r#"{"a": 1}"#.into()]);
        let value = call_llm_json(&model, "sys", "user", &LlmParams::default(), 2, 0.0).await;
        assert_eq!(value["a"], 1);
        assert_eq!(value["ok"], true);
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fenced_reply_parses() {
        let model = MockModel::new().with_default_reply("```json\n{\"x\": [1, 2,]}\n```");
        let value = call_llm_json(&model, "sys", "user", &LlmParams::default(), 0, 0.0).await;
        assert_eq!(value["x"], serde_json::json!([1, 2]));
    }
}

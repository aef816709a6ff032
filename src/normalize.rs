//! Maps whatever the hosted model sent back onto [`PredictResponse`].
//!
//! The inference API is not consistent about its success shape: text
//! classification pipelines answer with `[{label, score}, ...]`, some
//! deployments wrap that once more as `[[{label, score}, ...]]`. Errors come
//! back as JSON objects or as plain text depending on which layer failed.

use serde_json::Value;
use std::time::Duration;

use crate::types::{PredictFailure, PredictResponse, Prediction};

pub const INFERENCE_FAILED: &str = "inference failed";
pub const UNEXPECTED_FORMAT: &str = "unexpected response format";

/// Normalizes the body of a `200 OK` upstream response.
pub fn upstream_success(body: &str, elapsed: Duration) -> PredictResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => normalize_success(value, elapsed),
        Err(_) => unexpected_format(Value::String(body.to_owned())),
    }
}

/// Picks the top-ranked `{label, score}` pair out of a decoded success body.
pub fn normalize_success(value: Value, elapsed: Duration) -> PredictResponse {
    match top_prediction(&value) {
        Some((label, score)) => PredictResponse::Prediction(Prediction {
            label: label.to_owned(),
            score,
            time_taken: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }),
        None => unexpected_format(value),
    }
}

fn top_prediction(value: &Value) -> Option<(&str, f64)> {
    let mut predictions = value.as_array()?;

    // Nested output: one list of predictions per input.
    if let Some(Value::Array(inner)) = predictions.first() {
        predictions = inner;
    }

    let first = predictions.first()?;
    let label = first.get("label")?.as_str()?;
    let score = first.get("score")?.as_f64()?;
    Some((label, score))
}

/// Normalizes a non-200 upstream response. JSON bodies are kept structured,
/// anything else is passed through as text.
pub fn upstream_failure(status_code: u16, body: &str) -> PredictResponse {
    let details = serde_json::from_str::<Value>(body)
        .unwrap_or_else(|_| Value::String(body.to_owned()));
    inference_failed(status_code, details)
}

/// Normalizes a request that never produced an upstream response.
pub fn transport_failure(status_code: u16, message: impl Into<String>) -> PredictResponse {
    inference_failed(status_code, Value::String(message.into()))
}

fn inference_failed(status_code: u16, details: Value) -> PredictResponse {
    PredictResponse::Failure(PredictFailure {
        error: INFERENCE_FAILED.to_string(),
        status_code: Some(status_code),
        details: Some(details),
        raw: None,
    })
}

fn unexpected_format(raw: Value) -> PredictResponse {
    PredictResponse::Failure(PredictFailure {
        error: UNEXPECTED_FORMAT.to_string(),
        status_code: None,
        details: None,
        raw: Some(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ELAPSED: Duration = Duration::from_millis(42);

    #[test]
    fn flat_list_yields_first_prediction() {
        let response = normalize_success(
            json!([
                {"label": "POSITIVE", "score": 0.9998},
                {"label": "NEGATIVE", "score": 0.0002}
            ]),
            ELAPSED,
        );

        assert_eq!(
            response,
            PredictResponse::Prediction(Prediction {
                label: "POSITIVE".to_string(),
                score: 0.9998,
                time_taken: 42,
            })
        );
    }

    #[test]
    fn nested_list_is_unwrapped_once() {
        let response = normalize_success(
            json!([[{"label": "NEGATIVE", "score": 0.75}]]),
            Duration::ZERO,
        );

        assert_eq!(
            response,
            PredictResponse::Prediction(Prediction {
                label: "NEGATIVE".to_string(),
                score: 0.75,
                time_taken: 0,
            })
        );
    }

    #[test]
    fn doubly_nested_list_is_not_unwrapped_twice() {
        let value = json!([[[{"label": "NEGATIVE", "score": 0.75}]]]);
        let response = normalize_success(value.clone(), ELAPSED);

        assert_eq!(serde_json::to_value(&response).unwrap()["raw"], value);
    }

    #[test]
    fn empty_list_is_unexpected_format() {
        let response = normalize_success(json!([]), ELAPSED);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": "unexpected response format", "raw": []})
        );
    }

    #[test]
    fn empty_nested_list_reports_original_value() {
        let response = normalize_success(json!([[]]), ELAPSED);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": "unexpected response format", "raw": [[]]})
        );
    }

    #[test]
    fn object_body_is_unexpected_format() {
        let value = json!({"label": "POSITIVE", "score": 0.9});
        let response = normalize_success(value.clone(), ELAPSED);

        assert!(response.is_failure());
        assert_eq!(serde_json::to_value(&response).unwrap()["raw"], value);
    }

    #[test]
    fn missing_score_is_unexpected_format() {
        let response = normalize_success(json!([{"label": "POSITIVE"}]), ELAPSED);
        assert!(response.is_failure());

        let response = normalize_success(json!([{"label": "POSITIVE", "score": "high"}]), ELAPSED);
        assert!(response.is_failure());
    }

    #[test]
    fn non_json_success_body_is_returned_as_raw_text() {
        let response = upstream_success("<html>gateway</html>", ELAPSED);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": "unexpected response format", "raw": "<html>gateway</html>"})
        );
    }

    #[test]
    fn success_body_is_decoded_then_normalized() {
        let response = upstream_success(r#"[{"label":"POSITIVE","score":1.0}]"#, ELAPSED);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"label": "POSITIVE", "score": 1.0, "time_taken": 42})
        );
    }

    #[test]
    fn json_failure_body_is_kept_structured() {
        let response = upstream_failure(503, r#"{"detail": "x"}"#);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "error": "inference failed",
                "status_code": 503,
                "details": {"detail": "x"}
            })
        );
    }

    #[test]
    fn text_failure_body_is_passed_through() {
        let response = upstream_failure(500, "Internal Server Error");

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "error": "inference failed",
                "status_code": 500,
                "details": "Internal Server Error"
            })
        );
    }

    #[test]
    fn transport_failure_uses_synthetic_status() {
        let response = transport_failure(504, "operation timed out");

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "error": "inference failed",
                "status_code": 504,
                "details": "operation timed out"
            })
        );
    }
}

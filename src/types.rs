use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

/// Body sent to the hosted inference endpoint.
#[derive(Debug, Serialize)]
pub struct InferenceRequest<'a> {
    pub inputs: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: &'static str,
}

/// Stable response contract returned by `/predict`, whatever the upstream did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction(Prediction),
    Failure(PredictFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
    /// Milliseconds spent waiting on the upstream.
    pub time_taken: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl PredictResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use url::Url;

use crate::config::RelayConfig;
use crate::engine::SentimentEngine;
use crate::normalize;
use crate::types::{InferenceRequest, PredictResponse};

/// Relays predictions to a model hosted on the Hugging Face Inference API.
pub struct HfInferenceEngine {
    client: reqwest::Client,
    model_url: Url,
    api_token: SecretString,
}

impl HfInferenceEngine {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            model_url: config.model_url,
            api_token: config.api_token,
        })
    }

    async fn call_upstream(&self, text: &str) -> reqwest::Result<(StatusCode, String)> {
        let response = self
            .client
            .post(self.model_url.clone())
            .bearer_auth(self.api_token.expose_secret())
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl SentimentEngine for HfInferenceEngine {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len(), model_url = %self.model_url))]
    async fn predict(&self, text: &str) -> PredictResponse {
        counter!("predict_requests_total").increment(1);

        let start = Instant::now();
        let result = self.call_upstream(text).await;
        let elapsed = start.elapsed();
        histogram!("upstream_latency_seconds").record(elapsed.as_secs_f64());

        match result {
            Ok((status, body)) if status == StatusCode::OK => {
                let response = normalize::upstream_success(&body, elapsed);
                if response.is_failure() {
                    counter!("upstream_failures_total", "kind" => "format").increment(1);
                    tracing::warn!(
                        elapsed_ms = elapsed.as_millis(),
                        "Upstream returned an unexpected response format"
                    );
                } else {
                    tracing::debug!(elapsed_ms = elapsed.as_millis(), "Prediction completed");
                }
                response
            }
            Ok((status, body)) => {
                counter!("upstream_failures_total", "kind" => "status").increment(1);
                tracing::warn!(
                    status = status.as_u16(),
                    elapsed_ms = elapsed.as_millis(),
                    "Upstream inference failed"
                );
                normalize::upstream_failure(status.as_u16(), &body)
            }
            Err(err) => {
                counter!("upstream_failures_total", "kind" => "transport").increment(1);
                let status = if err.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                tracing::warn!(
                    error = %err,
                    elapsed_ms = elapsed.as_millis(),
                    "Upstream request did not complete"
                );
                normalize::transport_failure(status.as_u16(), err.to_string())
            }
        }
    }
}

use crate::types::PredictResponse;
use async_trait::async_trait;

/// Anything that can turn a piece of text into a sentiment prediction.
///
/// Implementations recover every per-request failure into a
/// [`PredictResponse::Failure`], so callers never see an error path.
#[async_trait]
pub trait SentimentEngine {
    async fn predict(&self, text: &str) -> PredictResponse;
}

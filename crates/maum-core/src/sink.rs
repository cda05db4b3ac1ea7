//! Outbound boundary toward persistence collaborators.
//!
//! The ensemble emits an [`AggregationResult`] and nothing else; attaching a
//! timestamp, a user identifier, and the schema-side category mapping is the
//! sink implementation's job.

use crate::error::Result;
use crate::types::AggregationResult;
use async_trait::async_trait;

/// Consumer of aggregation results.
#[async_trait]
pub trait EmotionSink: Send + Sync {
    /// Record one aggregation result.
    async fn record(&self, result: &AggregationResult) -> Result<()>;
}

/// Sink that emits results to the structured log and nothing else.
///
/// Useful as a default wiring in environments without a persistence layer.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl EmotionSink for TracingSink {
    async fn record(&self, result: &AggregationResult) -> Result<()> {
        tracing::info!(
            label = %result.label,
            confidence = result.confidence,
            winning_votes = result.winning_votes,
            total_votes = result.total_votes,
            "emotion recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_accepts_result() {
        let sink = TracingSink;
        let result = AggregationResult::from_counts("긍정", 2, 3);
        sink.record(&result).await.unwrap();
    }
}

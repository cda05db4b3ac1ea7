//! Ensemble orchestration: multi-model fan-out and majority-vote reduction.
//!
//! One input event fans out to every applicable catalog member; each member
//! either casts one discrete vote or abstains (unavailable, failed, or
//! timed out). The winning label is the one with the most votes, ties going
//! to the label that appeared first in the vote sequence. The vote sequence
//! follows catalog order, so the policy is deterministic.

use crate::audio::{AudioSource, Waveform};
use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::loader::ModelLoader;
use crate::predictor::ModelInput;
use futures::future::join_all;
use maum_core::{AggregationResult, Error, Modality, Result, Vote};
use maum_core::sink::EmotionSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-lived inference service over a fixed model catalog.
///
/// Stateless between calls apart from the loader's model cache; given a
/// warm cache, identical inputs produce identical results.
pub struct EmotionEnsemble {
    catalog: ModelCatalog,
    loader: Arc<ModelLoader>,
    model_timeout: Duration,
}

impl EmotionEnsemble {
    /// Build an ensemble over a catalog with a fresh loader.
    pub fn new(catalog: ModelCatalog) -> Result<Self> {
        catalog.validate()?;
        let loader = Arc::new(ModelLoader::new(catalog.device())?);
        Ok(Self::with_loader(catalog, loader))
    }

    /// Build an ensemble with an injected loader (shared caches, tests).
    pub fn with_loader(catalog: ModelCatalog, loader: Arc<ModelLoader>) -> Self {
        Self {
            catalog,
            loader,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Per-model prediction timeout; a slow model abstains from the vote
    /// instead of stalling the aggregation.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &Arc<ModelLoader> {
        &self.loader
    }

    /// Preload every catalog member, logging per-model outcomes. Returns
    /// the number of models available. Never fails the whole set.
    pub async fn warm_up(&self) -> usize {
        let mut available = 0;
        for descriptor in self.catalog.all_descriptors() {
            match self.loader.load(descriptor).await {
                Ok(_) => {
                    info!(model = %descriptor.name, "model ready");
                    available += 1;
                }
                Err(e) => {
                    warn!(model = %descriptor.name, error = %e, "model failed to load");
                }
            }
        }
        info!(
            available,
            total = self.catalog.len(),
            "ensemble warm-up complete"
        );
        available
    }

    /// Run the ensemble over one input event.
    ///
    /// At least one of `text` / `audio` must be provided. Individual model
    /// failures are logged and excluded from the vote; only a vote-less
    /// outcome is an error.
    pub async fn predict_emotion(
        &self,
        text: Option<&str>,
        audio: Option<&AudioSource>,
    ) -> Result<AggregationResult> {
        if text.is_none() && audio.is_none() {
            return Err(Error::NoInput);
        }

        // Decode once; a failed decode degrades to a text-only vote.
        let waveform: Option<Waveform> = match audio {
            Some(source) => match source.resolve() {
                Ok(waveform) => Some(waveform),
                Err(e) => {
                    warn!(error = %e, "audio decode failed, speech models abstain");
                    None
                }
            },
            None => None,
        };

        let mut ballots = Vec::new();
        for descriptor in self.catalog.all_descriptors() {
            match (descriptor.modality, text, waveform.as_ref()) {
                (Modality::Text, Some(text), _) => {
                    ballots.push(self.cast_vote(descriptor, ModelInput::Text(text)));
                }
                (Modality::Speech, _, Some(waveform)) => {
                    ballots.push(self.cast_vote(descriptor, ModelInput::Speech(waveform)));
                }
                _ => {}
            }
        }

        let votes: Vec<Vote> = join_all(ballots).await.into_iter().flatten().collect();
        if votes.is_empty() {
            return Err(Error::EnsembleExhausted);
        }

        let result = majority(&votes);
        info!(
            label = %result.label,
            confidence = result.confidence,
            votes = result.total_votes,
            "ensemble decision"
        );
        Ok(result)
    }

    /// Text-only convenience contract used by the chat layer.
    pub async fn predict_emotion_with_score(&self, text: &str) -> Result<(String, f32)> {
        self.predict_emotion(Some(text), None)
            .await
            .map(AggregationResult::into_tuple)
    }

    /// Run a prediction and hand the result to the persistence
    /// collaborator. The sink attaches timestamps and user identity on its
    /// side.
    pub async fn predict_and_record(
        &self,
        text: Option<&str>,
        audio: Option<&AudioSource>,
        sink: &dyn EmotionSink,
    ) -> Result<AggregationResult> {
        let result = self.predict_emotion(text, audio).await?;
        sink.record(&result).await?;
        Ok(result)
    }

    /// One member's contribution: load, predict under the timeout, and
    /// either vote or abstain.
    async fn cast_vote(
        &self,
        descriptor: &ModelDescriptor,
        input: ModelInput<'_>,
    ) -> Option<Vote> {
        let predictor = match self.loader.load(descriptor).await {
            Ok(predictor) => predictor,
            Err(e) => {
                warn!(model = %descriptor.name, error = %e, "model unavailable, abstaining");
                return None;
            }
        };

        match tokio::time::timeout(self.model_timeout, predictor.predict(input)).await {
            Ok(Ok(prediction)) => Some(Vote::new(
                descriptor.name.clone(),
                prediction.label,
                prediction.score,
            )),
            Ok(Err(e)) => {
                warn!(model = %descriptor.name, error = %e, "prediction failed, abstaining");
                None
            }
            Err(_) => {
                warn!(
                    model = %descriptor.name,
                    timeout_ms = self.model_timeout.as_millis() as u64,
                    "prediction timed out, abstaining"
                );
                None
            }
        }
    }
}

/// Hard-voting reduction. Only discrete labels count; per-model scores do
/// not break ties. The first label to reach the winning count wins.
fn majority(votes: &[Vote]) -> AggregationResult {
    debug_assert!(!votes.is_empty());

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for vote in votes {
        match counts.iter_mut().find(|(label, _)| *label == vote.label) {
            Some((_, count)) => *count += 1,
            None => counts.push((&vote.label, 1)),
        }
    }

    let mut winner: (&str, usize) = ("", 0);
    for &(label, count) in &counts {
        if count > winner.1 {
            winner = (label, count);
        }
    }

    AggregationResult::from_counts(winner.0, winner.1, votes.len())
}

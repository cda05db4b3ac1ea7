//! Mock predictors for ensemble testing.
//!
//! Configurable implementations of the EmotionPredictor trait for testing
//! fan-out, aggregation, and error handling without model weights.

use async_trait::async_trait;
use maum_classifiers::predictor::{EmotionPredictor, ModelInput, Prediction};
use maum_core::{Error, Modality, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// A configurable mock predictor that always emits the same vote.
pub struct MockPredictor {
    name: String,
    modality: Modality,
    label: String,
    score: f32,
    simulated_latency: Option<Duration>,
    call_count: AtomicU32,
}

impl MockPredictor {
    pub fn text(name: &str, label: &str) -> Self {
        Self::new(name, Modality::Text, label)
    }

    pub fn speech(name: &str, label: &str) -> Self {
        Self::new(name, Modality::Speech, label)
    }

    pub fn new(name: &str, modality: Modality, label: &str) -> Self {
        Self {
            name: name.to_string(),
            modality,
            label: label.to_string(),
            score: 0.9,
            simulated_latency: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the score this predictor reports
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Set simulated inference latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Number of times predict was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmotionPredictor for MockPredictor {
    async fn predict(&self, input: ModelInput<'_>) -> Result<Prediction> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if input.modality() != self.modality {
            return Err(Error::prediction(format!(
                "mock '{}' got wrong modality",
                self.name
            )));
        }

        if let Some(latency) = self.simulated_latency {
            tokio::time::sleep(latency).await;
        }

        Ok(Prediction::new(self.label.clone(), self.score))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> Modality {
        self.modality
    }
}

/// A predictor that always fails - for testing abstention paths.
pub struct FailingPredictor {
    name: String,
    modality: Modality,
}

impl FailingPredictor {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modality: Modality::Text,
        }
    }

    pub fn speech(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modality: Modality::Speech,
        }
    }
}

#[async_trait]
impl EmotionPredictor for FailingPredictor {
    async fn predict(&self, _input: ModelInput<'_>) -> Result<Prediction> {
        Err(Error::prediction("simulated predictor failure"))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> Modality {
        self.modality
    }
}

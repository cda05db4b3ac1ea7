//! Predictor trait and common types.

use crate::audio::Waveform;
use async_trait::async_trait;
use maum_core::{Modality, Result};

/// One input event, borrowed for the duration of a prediction.
#[derive(Debug, Clone, Copy)]
pub enum ModelInput<'a> {
    Text(&'a str),
    Speech(&'a Waveform),
}

impl ModelInput<'_> {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Speech(_) => Modality::Speech,
        }
    }
}

/// A single model's output for a single input.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Label drawn from the model's declared label set
    pub label: String,
    /// Soft-max probability mass of the winning class
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for all loaded classifiers.
///
/// Implementations never return a label outside their declared label set,
/// and raise [`maum_core::Error::Prediction`] only on malformed input.
/// Low confidence is reported, not gated, at this layer.
#[async_trait]
pub trait EmotionPredictor: Send + Sync {
    /// Classify the given input.
    async fn predict(&self, input: ModelInput<'_>) -> Result<Prediction>;

    /// Get the model name
    fn name(&self) -> &str;

    /// Input modality this model consumes
    fn modality(&self) -> Modality;
}

/// Helper shared by predictors: pick the winning class and its probability
/// from a soft-max distribution.
pub(crate) fn argmax(probabilities: &[f32]) -> (usize, f32) {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_picks_largest() {
        let (idx, prob) = argmax(&[0.1, 0.6, 0.3]);
        assert_eq!(idx, 1);
        assert!((prob - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_first_wins_on_tie() {
        let (idx, _) = argmax(&[0.4, 0.4, 0.2]);
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_input_modality() {
        assert_eq!(ModelInput::Text("안녕").modality(), Modality::Text);
    }
}

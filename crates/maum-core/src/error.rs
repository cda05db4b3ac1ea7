//! Error types for the Maum emotion ensemble

use crate::types::{Granularity, Modality};

/// Result type alias using Maum's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ensemble operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested label schema combination is not registered
    #[error("no label schema registered for {modality}/{granularity}")]
    UnknownGranularity {
        modality: Modality,
        granularity: Granularity,
    },

    /// A specific model failed to load (network or integrity failure).
    /// Recovered by excluding that model from the current vote.
    #[error("model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// Malformed input to a single predictor; that model abstains
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Caller supplied neither text nor audio
    #[error("no input provided: supply text, audio, or both")]
    NoInput,

    /// Every applicable model failed or none were applicable
    #[error("ensemble exhausted: no model produced a vote")]
    EnsembleExhausted,

    /// Configuration errors (catalog files, descriptors)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new model-unavailable error
    pub fn model_unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create a new prediction error
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error is local to one model (the ensemble may proceed
    /// on the remaining members) rather than fatal to the request.
    pub fn is_model_local(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. } | Self::Prediction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_local_classification() {
        assert!(Error::model_unavailable("kcbert", "fetch failed").is_model_local());
        assert!(Error::prediction("empty waveform").is_model_local());
        assert!(!Error::NoInput.is_model_local());
        assert!(!Error::EnsembleExhausted.is_model_local());
    }

    #[test]
    fn test_error_display_names_model() {
        let err = Error::model_unavailable("hubert", "timeout");
        let msg = err.to_string();
        assert!(msg.contains("hubert"));
        assert!(msg.contains("timeout"));
    }
}

//! Shared types for ensemble inputs, votes, and results

use serde::{Deserialize, Serialize};

/// Input channel a classifier consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Plain text (chat messages)
    Text,
    /// Audio waveform
    Speech,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Speech => write!(f, "speech"),
        }
    }
}

/// Hierarchical emotion-label resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 4 classes
    Coarse,
    /// 8 classes at runtime (7 for the 1-indexed speech space)
    Mid,
    /// 42 classes
    Fine,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coarse => write!(f, "coarse"),
            Self::Mid => write!(f, "mid"),
            Self::Fine => write!(f, "fine"),
        }
    }
}

/// A single model's discrete prediction for one input.
///
/// Ephemeral: produced and consumed within one aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    /// Name of the model that cast the vote
    pub model: String,
    /// Discrete label the model emitted
    pub label: String,
    /// The model's own confidence for that label (soft-max mass)
    pub raw_score: f32,
}

impl Vote {
    pub fn new(model: impl Into<String>, label: impl Into<String>, raw_score: f32) -> Self {
        Self {
            model: model.into(),
            label: label.into(),
            raw_score,
        }
    }
}

/// Final outcome of one ensemble aggregation.
///
/// `confidence` is a plurality share (`winning_votes / total_votes`), not a
/// calibrated probability. Persistence collaborators attach timestamps and
/// user identity on their side; this type carries none of that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Label with the highest vote count
    pub label: String,
    /// Vote share of the winning label, in [0, 1]
    pub confidence: f32,
    /// Number of votes agreeing with the winning label
    pub winning_votes: usize,
    /// Total votes cast by the ensemble
    pub total_votes: usize,
}

impl AggregationResult {
    /// Build a result from vote counts; confidence is derived, never stored
    /// inconsistently with the counts.
    pub fn from_counts(label: impl Into<String>, winning_votes: usize, total_votes: usize) -> Self {
        debug_assert!(total_votes >= 1);
        debug_assert!(winning_votes <= total_votes);
        Self {
            label: label.into(),
            confidence: winning_votes as f32 / total_votes as f32,
            winning_votes,
            total_votes,
        }
    }

    /// The `(label, confidence)` tuple contract used by the UI layer.
    pub fn into_tuple(self) -> (String, f32) {
        (self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_vote_share() {
        let result = AggregationResult::from_counts("긍정", 2, 3);
        assert_eq!(result.winning_votes, 2);
        assert_eq!(result.total_votes, 3);
        assert!((result.confidence - 2.0 / 3.0).abs() < 1e-6);
        assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
    }

    #[test]
    fn test_unanimous_confidence() {
        let result = AggregationResult::from_counts("중립", 4, 4);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_tuple_contract() {
        let (label, confidence) = AggregationResult::from_counts("슬픔", 1, 2).into_tuple();
        assert_eq!(label, "슬픔");
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn test_modality_serde_roundtrip() {
        let json = serde_json::to_string(&Modality::Speech).unwrap();
        assert_eq!(json, "\"speech\"");
        let back: Modality = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Modality::Speech);
    }

    #[test]
    fn test_granularity_display() {
        assert_eq!(Granularity::Coarse.to_string(), "coarse");
        assert_eq!(Granularity::Mid.to_string(), "mid");
        assert_eq!(Granularity::Fine.to_string(), "fine");
    }
}

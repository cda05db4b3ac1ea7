//! Canonical emotion label schema.
//!
//! One [`LabelSet`] per registered (modality, granularity) pair. The schema
//! is a pure lookup table: every classifier sharing a granularity was
//! trained against one of these vocabularies, and the aggregator relies on
//! that to compare votes as plain strings.
//!
//! The speech transform vocabulary is conventionally 1-indexed while every
//! network's class axis is 0-indexed; [`LabelSet::label_for_class`] carries
//! that correction so it is applied exactly once, in one place.

use maum_core::{Error, Granularity, Modality, Result};

/// Ordered label vocabulary for one (modality, granularity) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    first_index: usize,
    labels: Vec<String>,
}

impl LabelSet {
    /// Build a 0-indexed label set.
    pub fn zero_based(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::with_first_index(0, labels)
    }

    /// Build a label set whose map keys start at `first_index`.
    pub fn with_first_index(
        first_index: usize,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            first_index,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of labels; a classifier predicting into this set must have an
    /// output layer of exactly this width.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// First map key of the set (0 for most sets, 1 for the speech
    /// transform vocabulary).
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Lookup by map key. Keys run `first_index ..= first_index + len - 1`.
    pub fn get(&self, key: usize) -> Option<&str> {
        key.checked_sub(self.first_index)
            .and_then(|pos| self.labels.get(pos))
            .map(String::as_str)
    }

    /// Lookup by network class axis (always 0-based). For a 1-indexed set
    /// this is where the off-by-one correction happens, once and only
    /// here.
    pub fn label_for_class(&self, raw_class: usize) -> Result<&str> {
        self.labels
            .get(raw_class)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::prediction(format!(
                    "class index {} out of range for a {}-label set",
                    raw_class,
                    self.labels.len()
                ))
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Iterate labels in class-axis order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// The runtime mid-granularity vocabulary shared by the text encoders and
/// the spectrogram CNN.
const MID: [&str; 8] = [
    "슬픔", "소외", "분노", "불안", "긍정", "중립", "당황", "위협",
];

/// Coarse text vocabulary.
const COARSE: [&str; 4] = ["기쁨", "슬픔", "분노", "불안"];

/// Speech transform vocabulary, 1-indexed by convention.
const SPEECH_MID: [&str; 7] = ["긍정", "슬픔", "분노", "불안", "소외", "당황", "중립"];

/// Fine-granularity vocabulary, grouped under the mid categories.
const FINE: [&str; 42] = [
    // 슬픔
    "실망", "후회", "우울", "절망", "비참함", "서러움",
    // 소외
    "외로움", "소외감", "배신감", "질투", "그리움",
    // 분노
    "짜증", "억울함", "증오", "경멸", "분함", "원망",
    // 불안
    "걱정", "초조", "두려움", "혼란", "긴장", "막막함", "조심스러움",
    // 긍정
    "기쁨", "감사", "설렘", "만족", "자신감", "편안함", "뿌듯함", "기대감",
    // 중립
    "담담함", "무관심",
    // 당황
    "놀람", "민망함", "부끄러움", "죄책감", "어색함",
    // 위협
    "공포", "위축감", "불신",
];

/// Canonical label set for a (modality, granularity) pair.
///
/// Fails with [`Error::UnknownGranularity`] when the combination has no
/// registered vocabulary (speech models only exist at mid granularity).
pub fn labels_for(modality: Modality, granularity: Granularity) -> Result<LabelSet> {
    match (modality, granularity) {
        (Modality::Text, Granularity::Coarse) => Ok(LabelSet::zero_based(COARSE)),
        (Modality::Text, Granularity::Mid) => Ok(LabelSet::zero_based(MID)),
        (Modality::Text, Granularity::Fine) => Ok(LabelSet::zero_based(FINE)),
        (Modality::Speech, Granularity::Mid) => Ok(LabelSet::with_first_index(1, SPEECH_MID)),
        (modality, granularity) => Err(Error::UnknownGranularity {
            modality,
            granularity,
        }),
    }
}

/// All registered vocabularies for a granularity, across modalities.
///
/// Used by catalog validation: a member's labels must be drawn from one of
/// these so that votes stay comparable.
pub fn vocabularies_for_granularity(granularity: Granularity) -> Vec<LabelSet> {
    [Modality::Text, Modality::Speech]
        .into_iter()
        .filter_map(|modality| labels_for(modality, granularity).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinalities() {
        assert_eq!(labels_for(Modality::Text, Granularity::Coarse).unwrap().len(), 4);
        assert_eq!(labels_for(Modality::Text, Granularity::Mid).unwrap().len(), 8);
        assert_eq!(labels_for(Modality::Text, Granularity::Fine).unwrap().len(), 42);
        assert_eq!(labels_for(Modality::Speech, Granularity::Mid).unwrap().len(), 7);
    }

    #[test]
    fn test_unknown_combination() {
        let err = labels_for(Modality::Speech, Granularity::Fine).unwrap_err();
        assert!(matches!(err, Error::UnknownGranularity { .. }));
    }

    #[test]
    fn test_one_indexed_lookup_applies_correction_once() {
        let set = labels_for(Modality::Speech, Granularity::Mid).unwrap();
        assert_eq!(set.first_index(), 1);
        // Raw network class 0 must resolve to the label stored at map key 1.
        assert_eq!(set.label_for_class(0).unwrap(), "긍정");
        assert_eq!(set.get(1), Some("긍정"));
        assert_eq!(set.label_for_class(0).unwrap(), set.get(1).unwrap());
        // Map key 0 does not exist in a 1-indexed set.
        assert_eq!(set.get(0), None);
        // Last class maps to the last key, not past it.
        assert_eq!(set.label_for_class(6).unwrap(), set.get(7).unwrap());
    }

    #[test]
    fn test_zero_based_lookup() {
        let set = labels_for(Modality::Text, Granularity::Mid).unwrap();
        assert_eq!(set.first_index(), 0);
        assert_eq!(set.label_for_class(0).unwrap(), "슬픔");
        assert_eq!(set.label_for_class(4).unwrap(), "긍정");
        assert_eq!(set.get(4), Some("긍정"));
    }

    #[test]
    fn test_out_of_range_class_is_prediction_error() {
        let set = labels_for(Modality::Text, Granularity::Coarse).unwrap();
        assert!(set.label_for_class(4).is_err());
    }

    #[test]
    fn test_speech_mid_is_subset_of_text_mid() {
        let speech = labels_for(Modality::Speech, Granularity::Mid).unwrap();
        let text = labels_for(Modality::Text, Granularity::Mid).unwrap();
        for label in speech.iter() {
            assert!(text.contains(label), "{label} missing from mid vocabulary");
        }
    }

    #[test]
    fn test_fine_labels_are_unique() {
        let set = labels_for(Modality::Text, Granularity::Fine).unwrap();
        let mut seen = std::collections::HashSet::new();
        for label in set.iter() {
            assert!(seen.insert(label), "duplicate fine label {label}");
        }
    }
}

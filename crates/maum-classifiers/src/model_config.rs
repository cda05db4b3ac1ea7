//! Declarative catalog configuration.
//!
//! Mirrors the on-disk YAML format used to describe classifier ensembles.
//! Entry order in the file is preserved into the catalog; the vote
//! tie-break follows it.

use maum_core::{Granularity, Modality};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default = "default_version")]
    pub version: String,

    /// Ordered classifier entries.
    pub models: Vec<ModelSpec>,

    /// Device every model is placed on.
    #[serde(default)]
    pub device: DeviceSpec,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One classifier entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique model name; also names the local weight cache file.
    pub name: String,

    pub modality: Modality,

    pub granularity: Granularity,

    pub architecture: ArchitectureKind,

    /// Pretrained-base hub repo resolving the tokenizer / feature-extractor
    /// configuration and the base network shape. The spectrogram CNN has no
    /// base.
    #[serde(default)]
    pub base: Option<String>,

    /// Where the fine-tuned weights come from.
    pub weights: WeightSourceSpec,

    /// Label override; when absent the canonical schema vocabulary for
    /// (modality, granularity) is used.
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    /// First map key of the label space (1 for the speech transform
    /// vocabulary). Only meaningful together with `labels`.
    #[serde(default)]
    pub label_base: usize,

    /// Token truncation length for text models.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Expected input sample rate for speech models.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_max_length() -> usize {
    128
}

fn default_sample_rate() -> u32 {
    16_000
}

/// Backing network family. A tagged variant, never a name-string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitectureKind {
    /// BERT-family text encoder with a sequence-classification head
    TextEncoder,
    /// Self-attention acoustic model over a raw waveform
    AcousticTransform,
    /// Convolutional network over a log-mel spectrogram
    SpectrogramCnn,
}

/// Source of fine-tuned weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WeightSourceSpec {
    /// Download from Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_weights_filename")]
        filename: String,
        #[serde(default = "default_revision")]
        revision: String,
    },

    /// Load from local filesystem
    Local { path: PathBuf },
}

fn default_weights_filename() -> String {
    "model.safetensors".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

/// Device to run inference on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda,
    Metal,
}

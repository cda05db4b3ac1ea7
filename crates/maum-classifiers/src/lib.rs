//! Maum Classifiers
//!
//! Multi-model emotion ensemble inference: a catalog of independently
//! fine-tuned text and speech classifiers is fanned out over a shared input
//! and reduced to a single emotion label by majority vote, with a
//! vote-share confidence.
//!
//! The moving parts:
//! - [`labels`]: canonical label vocabularies per (modality, granularity)
//! - [`catalog`]: the declarative model registry
//! - [`loader`]: weight fetching and the process-lifetime model cache
//! - per-model predictors: [`text_encoder`], [`acoustic_transform`],
//!   [`acoustic_cnn`] over [`mel`] features
//! - [`ensemble`]: fan-out, voting, and the public prediction contract

pub mod acoustic_cnn;
pub mod acoustic_transform;
pub mod audio;
pub mod catalog;
pub mod ensemble;
pub mod labels;
pub mod loader;
pub mod mel;
pub mod model_config;
pub mod predictor;
pub mod text_encoder;

pub use audio::{AudioSource, Waveform};
pub use catalog::{ModelCatalog, ModelDescriptor, WeightSource};
pub use ensemble::EmotionEnsemble;
pub use labels::{labels_for, LabelSet};
pub use loader::ModelLoader;
pub use model_config::{ArchitectureKind, CatalogSpec, DeviceSpec, ModelSpec, WeightSourceSpec};
pub use predictor::{EmotionPredictor, ModelInput, Prediction};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audio::{AudioSource, Waveform};
    pub use crate::catalog::{ModelCatalog, ModelDescriptor};
    pub use crate::ensemble::EmotionEnsemble;
    pub use crate::labels::{labels_for, LabelSet};
    pub use crate::loader::ModelLoader;
    pub use crate::predictor::{EmotionPredictor, ModelInput, Prediction};
    pub use maum_core::prelude::*;
}

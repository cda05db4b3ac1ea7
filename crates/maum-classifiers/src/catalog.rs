//! Model catalog: the declarative list of available classifiers.
//!
//! Built once at startup, immutable afterwards. Iteration order is the
//! order entries were declared in, and the ensemble's tie-break depends on
//! it staying stable.

use crate::labels::{self, LabelSet};
use crate::model_config::{ArchitectureKind, CatalogSpec, DeviceSpec, ModelSpec, WeightSourceSpec};
use maum_core::{Error, Granularity, Modality, Result};
use std::path::{Path, PathBuf};

/// Immutable registry entry for one classifier.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub modality: Modality,
    pub granularity: Granularity,
    pub architecture: ArchitectureKind,
    /// Pretrained-base hub repo (tokenizer / feature-extractor / network
    /// shape); `None` for the spectrogram CNN.
    pub base: Option<String>,
    pub weights: WeightSource,
    pub label_set: LabelSet,
    pub max_length: usize,
    pub sample_rate: u32,
}

/// Resolved weight source.
#[derive(Debug, Clone)]
pub enum WeightSource {
    HuggingFace {
        repo: String,
        filename: String,
        revision: String,
    },
    Local {
        path: PathBuf,
    },
}

impl From<WeightSourceSpec> for WeightSource {
    fn from(spec: WeightSourceSpec) -> Self {
        match spec {
            WeightSourceSpec::HuggingFace {
                repo,
                filename,
                revision,
            } => Self::HuggingFace {
                repo,
                filename,
                revision,
            },
            WeightSourceSpec::Local { path } => Self::Local { path },
        }
    }
}

impl ModelDescriptor {
    fn from_spec(spec: ModelSpec) -> Result<Self> {
        let label_set = match spec.labels {
            Some(labels) => LabelSet::with_first_index(spec.label_base, labels),
            None => labels::labels_for(spec.modality, spec.granularity)?,
        };

        Ok(Self {
            name: spec.name,
            modality: spec.modality,
            granularity: spec.granularity,
            architecture: spec.architecture,
            base: spec.base,
            weights: spec.weights.into(),
            label_set,
            max_length: spec.max_length,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Ordered, validated collection of model descriptors.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    descriptors: Vec<ModelDescriptor>,
    device: DeviceSpec,
}

impl ModelCatalog {
    /// The production five-model ensemble: three Korean text encoders, one
    /// transform-based acoustic model, one spectrogram CNN. Order matters.
    pub fn builtin() -> Self {
        let mid_text = labels::labels_for(Modality::Text, Granularity::Mid)
            .expect("mid text vocabulary is registered");
        let mid_speech = labels::labels_for(Modality::Speech, Granularity::Mid)
            .expect("mid speech vocabulary is registered");
        let cnn_labels = mid_text.clone();

        let text_entry = |name: &str, base: &str, repo: &str| ModelDescriptor {
            name: name.to_string(),
            modality: Modality::Text,
            granularity: Granularity::Mid,
            architecture: ArchitectureKind::TextEncoder,
            base: Some(base.to_string()),
            weights: WeightSource::HuggingFace {
                repo: repo.to_string(),
                filename: "model.safetensors".to_string(),
                revision: "main".to_string(),
            },
            label_set: mid_text.clone(),
            max_length: 128,
            sample_rate: 16_000,
        };

        let descriptors = vec![
            text_entry(
                "koelectra",
                "monologg/koelectra-base-discriminator",
                "maum-labs/koelectra-emotion-mid",
            ),
            text_entry("kcbert", "beomi/kcbert-base", "maum-labs/kcbert-emotion-mid"),
            text_entry("kluebert", "klue/bert-base", "maum-labs/kluebert-emotion-mid"),
            ModelDescriptor {
                name: "hubert".to_string(),
                modality: Modality::Speech,
                granularity: Granularity::Mid,
                architecture: ArchitectureKind::AcousticTransform,
                base: Some("facebook/hubert-base-ls960".to_string()),
                weights: WeightSource::HuggingFace {
                    repo: "maum-labs/hubert-emotion-mid".to_string(),
                    filename: "model.safetensors".to_string(),
                    revision: "main".to_string(),
                },
                label_set: mid_speech,
                max_length: 128,
                sample_rate: 16_000,
            },
            ModelDescriptor {
                name: "cnn_speech".to_string(),
                modality: Modality::Speech,
                granularity: Granularity::Mid,
                architecture: ArchitectureKind::SpectrogramCnn,
                base: None,
                weights: WeightSource::HuggingFace {
                    repo: "maum-labs/cnn-speech-emotion-mid".to_string(),
                    filename: "model.safetensors".to_string(),
                    revision: "main".to_string(),
                },
                // The CNN head was trained against the shared mid
                // vocabulary with 0-based classes.
                label_set: cnn_labels,
                max_length: 128,
                sample_rate: 22_050,
            },
        ];

        Self {
            descriptors,
            device: DeviceSpec::Cpu,
        }
    }

    /// Build a catalog from a parsed spec, preserving entry order.
    pub fn from_spec(spec: CatalogSpec) -> Result<Self> {
        let mut descriptors = Vec::with_capacity(spec.models.len());
        for model in spec.models {
            descriptors.push(ModelDescriptor::from_spec(model)?);
        }
        let catalog = Self {
            descriptors,
            device: spec.device,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let spec: CatalogSpec = serde_yaml::from_str(&contents)
            .map_err(|e| Error::config(format!("failed to parse catalog file: {e}")))?;
        Self::from_spec(spec)
    }

    /// Build directly from descriptors (tests and embedders).
    pub fn from_descriptors(descriptors: Vec<ModelDescriptor>) -> Self {
        Self {
            descriptors,
            device: DeviceSpec::Cpu,
        }
    }

    pub fn all_descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    pub fn descriptors_for_modality(
        &self,
        modality: Modality,
    ) -> impl Iterator<Item = &ModelDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.modality == modality)
    }

    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn device(&self) -> DeviceSpec {
        self.device
    }

    /// Catalog-level invariants:
    /// - names are unique (they key the loader cache and weight files);
    /// - every member's labels are drawn from a registered vocabulary of
    ///   its granularity, so votes stay comparable;
    /// - non-CNN architectures carry a pretrained-base reference.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for descriptor in &self.descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate model name '{}' in catalog",
                    descriptor.name
                )));
            }

            if descriptor.label_set.is_empty() {
                return Err(Error::config(format!(
                    "model '{}' declares an empty label set",
                    descriptor.name
                )));
            }

            let vocabularies = labels::vocabularies_for_granularity(descriptor.granularity);
            let comparable = descriptor
                .label_set
                .iter()
                .all(|label| vocabularies.iter().any(|v| v.contains(label)));
            if !comparable {
                return Err(Error::config(format!(
                    "model '{}' declares labels outside the {} vocabularies",
                    descriptor.name, descriptor.granularity
                )));
            }

            if descriptor.base.is_none()
                && descriptor.architecture != ArchitectureKind::SpectrogramCnn
            {
                return Err(Error::config(format!(
                    "model '{}' has no pretrained base reference",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        catalog.validate().unwrap();

        let names: Vec<_> = catalog
            .all_descriptors()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["koelectra", "kcbert", "kluebert", "hubert", "cnn_speech"]
        );

        assert_eq!(catalog.descriptors_for_modality(Modality::Text).count(), 3);
        assert_eq!(catalog.descriptors_for_modality(Modality::Speech).count(), 2);
    }

    #[test]
    fn test_builtin_head_widths_match_label_sets() {
        let catalog = ModelCatalog::builtin();
        let hubert = catalog.get("hubert").unwrap();
        assert_eq!(hubert.label_set.len(), 7);
        assert_eq!(hubert.label_set.first_index(), 1);

        let cnn = catalog.get("cnn_speech").unwrap();
        assert_eq!(cnn.label_set.len(), 8);
        assert_eq!(cnn.label_set.first_index(), 0);
        assert_eq!(cnn.sample_rate, 22_050);
    }

    #[test]
    fn test_from_spec_rejects_foreign_labels() {
        let yaml = r#"
models:
  - name: rogue
    modality: text
    granularity: mid
    architecture: text-encoder
    base: "beomi/kcbert-base"
    weights: { type: local, path: "rogue.safetensors" }
    labels: ["행복한고양이"]
"#;
        let spec: CatalogSpec = serde_yaml::from_str(yaml).unwrap();
        let err = ModelCatalog::from_spec(spec).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_spec_rejects_duplicate_names() {
        let yaml = r#"
models:
  - name: twin
    modality: text
    granularity: mid
    architecture: text-encoder
    base: "klue/bert-base"
    weights: { type: local, path: "a.safetensors" }
  - name: twin
    modality: text
    granularity: mid
    architecture: text-encoder
    base: "klue/bert-base"
    weights: { type: local, path: "b.safetensors" }
"#;
        let spec: CatalogSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(ModelCatalog::from_spec(spec).is_err());
    }

    #[test]
    fn test_spec_without_labels_uses_schema_vocabulary() {
        let yaml = r#"
models:
  - name: fine_text
    modality: text
    granularity: fine
    architecture: text-encoder
    base: "klue/bert-base"
    weights: { type: local, path: "fine.safetensors" }
"#;
        let spec: CatalogSpec = serde_yaml::from_str(yaml).unwrap();
        let catalog = ModelCatalog::from_spec(spec).unwrap();
        assert_eq!(catalog.get("fine_text").unwrap().label_set.len(), 42);
    }
}

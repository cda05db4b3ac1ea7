//! BERT-family text emotion classifier.
//!
//! Tokenizes with truncation to the descriptor's maximum length, pools the
//! [CLS] hidden state through a linear head sized to the label set, and
//! reports the soft-max mass of the arg-max class.

use crate::catalog::ModelDescriptor;
use crate::labels::LabelSet;
use crate::predictor::{argmax, EmotionPredictor, ModelInput, Prediction};
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use maum_core::{Error, Modality, Result};
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

pub struct TextEmotionClassifier {
    name: String,
    tokenizer: Tokenizer,
    model: BertModel,
    classifier: Linear,
    device: Device,
    label_set: LabelSet,
}

impl TextEmotionClassifier {
    /// Build from resolved local files: the base repo's tokenizer and
    /// config plus the fine-tuned weight file.
    pub fn load(
        descriptor: &ModelDescriptor,
        device: &Device,
        tokenizer_path: &Path,
        config_path: &Path,
        weights_path: &Path,
    ) -> Result<Self> {
        let unavailable =
            |reason: String| Error::model_unavailable(descriptor.name.clone(), reason);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| unavailable(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: descriptor.max_length,
                ..Default::default()
            }))
            .map_err(|e| unavailable(format!("failed to configure truncation: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| unavailable(format!("failed to read base config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| unavailable(format!("failed to parse base config: {e}")))?;

        // SAFETY: mmap'd safetensors file; safe as long as the file is not
        // modified while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| unavailable(format!("failed to load weights: {e}")))?
        };

        let model = load_backbone(&vb, &config, &["bert", "electra", ""])
            .map_err(|e| unavailable(e.to_string()))?;

        let classifier = candle_nn::linear(
            config.hidden_size,
            descriptor.label_set.len(),
            vb.pp("classifier"),
        )
        .map_err(|e| unavailable(format!("failed to load classification head: {e}")))?;

        tracing::info!(
            model = %descriptor.name,
            labels = descriptor.label_set.len(),
            "loaded text encoder"
        );

        Ok(Self {
            name: descriptor.name.clone(),
            tokenizer,
            model,
            classifier,
            device: device.clone(),
            label_set: descriptor.label_set.clone(),
        })
    }

    fn forward(&self, text: &str) -> Result<Vec<f32>> {
        let prediction_err = |e: candle_core::Error| Error::prediction(e.to_string());

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::prediction(format!("tokenization failed: {e}")))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .map_err(prediction_err)?
            .unsqueeze(0)
            .map_err(prediction_err)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .map_err(prediction_err)?
            .unsqueeze(0)
            .map_err(prediction_err)?;

        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(prediction_err)?;

        // [CLS] pooled output -> classification head
        let cls = hidden_states
            .i((0, 0, ..))
            .map_err(prediction_err)?
            .unsqueeze(0)
            .map_err(prediction_err)?;
        let logits = self.classifier.forward(&cls).map_err(prediction_err)?;

        candle_nn::ops::softmax(&logits, D::Minus1)
            .map_err(prediction_err)?
            .squeeze(0)
            .map_err(prediction_err)?
            .to_vec1()
            .map_err(prediction_err)
    }
}

#[async_trait]
impl EmotionPredictor for TextEmotionClassifier {
    async fn predict(&self, input: ModelInput<'_>) -> Result<Prediction> {
        let ModelInput::Text(text) = input else {
            return Err(Error::prediction(format!(
                "model '{}' consumes text, got {}",
                self.name,
                input.modality()
            )));
        };

        let probabilities = self.forward(text)?;
        let (class, score) = argmax(&probabilities);
        let label = self.label_set.label_for_class(class)?;

        Ok(Prediction::new(label, score))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> Modality {
        Modality::Text
    }
}

/// Try the known parameter prefixes the backbone may have been exported
/// under.
fn load_backbone(vb: &VarBuilder, config: &BertConfig, prefixes: &[&str]) -> Result<BertModel> {
    let mut errors = Vec::new();

    for prefix in prefixes {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match BertModel::load(vb_prefix, config) {
            Ok(model) => {
                tracing::debug!(
                    prefix = if prefix.is_empty() { "<root>" } else { prefix },
                    "loaded encoder backbone"
                );
                return Ok(model);
            }
            Err(e) => errors.push(format!(
                "{}: {e}",
                if prefix.is_empty() { "<root>" } else { prefix }
            )),
        }
    }

    Err(Error::config(format!(
        "no encoder backbone found under tried prefixes [{}]",
        errors.join(" | ")
    )))
}

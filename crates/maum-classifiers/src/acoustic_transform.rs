//! Transform-based acoustic emotion classifier.
//!
//! Consumes a raw waveform: the paired feature-extractor normalization
//! (zero mean, unit variance), a strided convolutional feature encoder, a
//! self-attention encoder stack sized from the pretrained base's
//! `config.json`, mean pooling over time, and a classification head.
//!
//! This model predicts into the 1-indexed speech vocabulary; the class-axis
//! lookup on [`LabelSet`] carries that correction.

use crate::catalog::ModelDescriptor;
use crate::labels::LabelSet;
use crate::predictor::{argmax, EmotionPredictor, ModelInput, Prediction};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, LayerNorm, Linear, Module, VarBuilder};
use maum_core::{Error, Modality, Result};
use serde::Deserialize;
use std::path::Path;

/// Shape of the pretrained acoustic base, read from its `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AcousticConfig {
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_hidden_layers")]
    pub num_hidden_layers: usize,
    #[serde(default = "default_num_attention_heads")]
    pub num_attention_heads: usize,
    #[serde(default = "default_intermediate_size")]
    pub intermediate_size: usize,
    #[serde(default = "default_conv_dim")]
    pub conv_dim: Vec<usize>,
    #[serde(default = "default_conv_kernel")]
    pub conv_kernel: Vec<usize>,
    #[serde(default = "default_conv_stride")]
    pub conv_stride: Vec<usize>,
    #[serde(default = "default_classifier_proj_size")]
    pub classifier_proj_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

fn default_hidden_size() -> usize {
    768
}
fn default_num_hidden_layers() -> usize {
    12
}
fn default_num_attention_heads() -> usize {
    12
}
fn default_intermediate_size() -> usize {
    3072
}
fn default_conv_dim() -> Vec<usize> {
    vec![512; 7]
}
fn default_conv_kernel() -> Vec<usize> {
    vec![10, 3, 3, 3, 3, 2, 2]
}
fn default_conv_stride() -> Vec<usize> {
    vec![5, 2, 2, 2, 2, 2, 2]
}
fn default_classifier_proj_size() -> usize {
    256
}
fn default_layer_norm_eps() -> f64 {
    1e-5
}

impl Default for AcousticConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults deserialize")
    }
}

struct SelfAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn load(hidden_size: usize, num_heads: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let head_dim = hidden_size / num_heads;
        Ok(Self {
            q_proj: candle_nn::linear(hidden_size, hidden_size, vb.pp("q_proj"))?,
            k_proj: candle_nn::linear(hidden_size, hidden_size, vb.pp("k_proj"))?,
            v_proj: candle_nn::linear(hidden_size, hidden_size, vb.pp("v_proj"))?,
            out_proj: candle_nn::linear(hidden_size, hidden_size, vb.pp("out_proj"))?,
            num_heads,
            head_dim,
            scale: 1.0 / (head_dim as f64).sqrt(),
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, time, _) = xs.dims3()?;
        let shape = (batch, time, self.num_heads, self.head_dim);

        let q = self.q_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let k = self.k_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;
        let v = self.v_proj.forward(xs)?.reshape(shape)?.transpose(1, 2)?.contiguous()?;

        let scores = (q.matmul(&k.transpose(2, 3)?.contiguous()?)? * self.scale)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, time, self.num_heads * self.head_dim))?;
        self.out_proj.forward(&context)
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    layer_norm: LayerNorm,
    intermediate_dense: Linear,
    output_dense: Linear,
    final_layer_norm: LayerNorm,
}

impl EncoderLayer {
    fn load(config: &AcousticConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            attention: SelfAttention::load(
                config.hidden_size,
                config.num_attention_heads,
                vb.pp("attention"),
            )?,
            layer_norm: candle_nn::layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("layer_norm"),
            )?,
            intermediate_dense: candle_nn::linear(
                config.hidden_size,
                config.intermediate_size,
                vb.pp("feed_forward.intermediate_dense"),
            )?,
            output_dense: candle_nn::linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("feed_forward.output_dense"),
            )?,
            final_layer_norm: candle_nn::layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("final_layer_norm"),
            )?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let residual = xs;
        let xs = self.layer_norm.forward(&(residual + self.attention.forward(xs)?)?)?;
        let ff = self
            .output_dense
            .forward(&self.intermediate_dense.forward(&xs)?.gelu()?)?;
        self.final_layer_norm.forward(&(xs + ff)?)
    }
}

pub struct AcousticTransformClassifier {
    name: String,
    feature_encoder: Vec<Conv1d>,
    feature_norm: LayerNorm,
    feature_projection: Linear,
    encoder_layers: Vec<EncoderLayer>,
    projector: Linear,
    classifier: Linear,
    device: Device,
    label_set: LabelSet,
    sample_rate: u32,
}

impl AcousticTransformClassifier {
    /// Build from the base repo's config and the fine-tuned weight file.
    pub fn load(
        descriptor: &ModelDescriptor,
        device: &Device,
        config_path: &Path,
        weights_path: &Path,
    ) -> Result<Self> {
        let unavailable =
            |reason: String| Error::model_unavailable(descriptor.name.clone(), reason);

        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| unavailable(format!("failed to read base config: {e}")))?;
        let config: AcousticConfig = serde_json::from_str(&config_str)
            .map_err(|e| unavailable(format!("failed to parse base config: {e}")))?;

        if config.conv_dim.len() != config.conv_kernel.len()
            || config.conv_dim.len() != config.conv_stride.len()
        {
            return Err(unavailable("inconsistent conv layer shapes in base config".into()));
        }

        // SAFETY: mmap'd safetensors file; safe as long as the file is not
        // modified while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| unavailable(format!("failed to load weights: {e}")))?
        };

        type Built = (
            Vec<Conv1d>,
            LayerNorm,
            Linear,
            Vec<EncoderLayer>,
            Linear,
            Linear,
        );
        let build = || -> candle_core::Result<Built> {
            let mut feature_encoder = Vec::with_capacity(config.conv_dim.len());
            let mut in_channels = 1;
            for (i, ((&out_channels, &kernel), &stride)) in config
                .conv_dim
                .iter()
                .zip(&config.conv_kernel)
                .zip(&config.conv_stride)
                .enumerate()
            {
                let conv_cfg = Conv1dConfig {
                    stride,
                    ..Default::default()
                };
                feature_encoder.push(candle_nn::conv1d(
                    in_channels,
                    out_channels,
                    kernel,
                    conv_cfg,
                    vb.pp(format!("feature_extractor.conv_layers.{i}.conv")),
                )?);
                in_channels = out_channels;
            }

            let feature_norm = candle_nn::layer_norm(
                in_channels,
                config.layer_norm_eps,
                vb.pp("feature_projection.layer_norm"),
            )?;
            let feature_projection = candle_nn::linear(
                in_channels,
                config.hidden_size,
                vb.pp("feature_projection.projection"),
            )?;

            let mut encoder_layers = Vec::with_capacity(config.num_hidden_layers);
            for i in 0..config.num_hidden_layers {
                encoder_layers.push(EncoderLayer::load(
                    &config,
                    vb.pp(format!("encoder.layers.{i}")),
                )?);
            }

            let projector = candle_nn::linear(
                config.hidden_size,
                config.classifier_proj_size,
                vb.pp("projector"),
            )?;
            let classifier = candle_nn::linear(
                config.classifier_proj_size,
                descriptor.label_set.len(),
                vb.pp("classifier"),
            )?;

            Ok((
                feature_encoder,
                feature_norm,
                feature_projection,
                encoder_layers,
                projector,
                classifier,
            ))
        };

        let (feature_encoder, feature_norm, feature_projection, encoder_layers, projector, classifier) =
            build().map_err(|e| unavailable(format!("failed to build network: {e}")))?;

        tracing::info!(
            model = %descriptor.name,
            layers = config.num_hidden_layers,
            labels = descriptor.label_set.len(),
            "loaded acoustic transform model"
        );

        Ok(Self {
            name: descriptor.name.clone(),
            feature_encoder,
            feature_norm,
            feature_projection,
            encoder_layers,
            projector,
            classifier,
            device: device.clone(),
            label_set: descriptor.label_set.clone(),
            sample_rate: descriptor.sample_rate,
        })
    }

    fn forward(&self, samples: &[f32]) -> Result<Vec<f32>> {
        let prediction_err = |e: candle_core::Error| Error::prediction(e.to_string());

        let mut xs = Tensor::from_vec(samples.to_vec(), (1, 1, samples.len()), &self.device)
            .map_err(prediction_err)?;

        for conv in &self.feature_encoder {
            xs = conv.forward(&xs).map_err(prediction_err)?;
            xs = xs.gelu().map_err(prediction_err)?;
        }

        // (batch, channels, frames) -> (batch, frames, channels)
        let run = || -> candle_core::Result<Tensor> {
            let xs = xs.transpose(1, 2)?.contiguous()?;
            let xs = self.feature_norm.forward(&xs)?;
            let mut xs = self.feature_projection.forward(&xs)?;
            for layer in &self.encoder_layers {
                xs = layer.forward(&xs)?;
            }
            let hidden = self.projector.forward(&xs)?;
            let pooled = hidden.mean(1)?;
            let logits = self.classifier.forward(&pooled)?;
            candle_nn::ops::softmax(&logits, D::Minus1)?.squeeze(0)
        };

        run().map_err(prediction_err)?.to_vec1().map_err(prediction_err)
    }
}

#[async_trait]
impl EmotionPredictor for AcousticTransformClassifier {
    async fn predict(&self, input: ModelInput<'_>) -> Result<Prediction> {
        let ModelInput::Speech(waveform) = input else {
            return Err(Error::prediction(format!(
                "model '{}' consumes speech, got {}",
                self.name,
                input.modality()
            )));
        };

        if waveform.is_empty() {
            return Err(Error::prediction("empty waveform"));
        }

        let prepared = waveform.resampled(self.sample_rate).normalized();
        let probabilities = self.forward(&prepared.samples)?;
        let (class, score) = argmax(&probabilities);

        // The label space is 1-indexed; label_for_class applies the
        // correction exactly once.
        let label = self.label_set.label_for_class(class)?;

        Ok(Prediction::new(label, score))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> Modality {
        Modality::Speech
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_match_base_shape() {
        let config = AcousticConfig::default();
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.conv_dim.len(), 7);
        assert_eq!(config.conv_kernel, vec![10, 3, 3, 3, 3, 2, 2]);
        assert_eq!(config.conv_stride[0], 5);
    }

    #[test]
    fn test_config_parses_partial_json() {
        let config: AcousticConfig =
            serde_json::from_str(r#"{"hidden_size": 512, "num_hidden_layers": 6}"#).unwrap();
        assert_eq!(config.hidden_size, 512);
        assert_eq!(config.num_hidden_layers, 6);
        assert_eq!(config.num_attention_heads, 12);
    }
}

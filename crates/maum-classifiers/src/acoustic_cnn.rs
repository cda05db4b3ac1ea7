//! Convolutional emotion classifier over log-mel spectrograms.
//!
//! Three conv stages (1→32→64→128, each conv 3×3 pad 1 + batch-norm +
//! ReLU), max-pool by 2 after the first two stages, adaptive average pool
//! to 1×1 after the last, then a linear head to the label count.

use crate::catalog::ModelDescriptor;
use crate::labels::LabelSet;
use crate::mel::{MelConfig, MelSpectrogram};
use crate::predictor::{argmax, EmotionPredictor, ModelInput, Prediction};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Linear, Module, ModuleT, VarBuilder};
use maum_core::{Error, Modality, Result};
use std::path::Path;

struct ConvStage {
    conv: Conv2d,
    norm: BatchNorm,
}

impl ConvStage {
    fn load(
        in_channels: usize,
        out_channels: usize,
        conv_vb: VarBuilder,
        norm_vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        Ok(Self {
            conv: candle_nn::conv2d(in_channels, out_channels, 3, conv_cfg, conv_vb)?,
            norm: candle_nn::batch_norm(out_channels, 1e-5, norm_vb)?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // Batch-norm in running-stats mode: inference only.
        self.norm.forward_t(&self.conv.forward(xs)?, false)?.relu()
    }
}

pub struct SpectrogramCnnClassifier {
    name: String,
    stages: [ConvStage; 3],
    fc: Linear,
    extractor: MelSpectrogram,
    device: Device,
    label_set: LabelSet,
    sample_rate: u32,
}

impl SpectrogramCnnClassifier {
    pub fn load(descriptor: &ModelDescriptor, device: &Device, weights_path: &Path) -> Result<Self> {
        let unavailable =
            |reason: String| Error::model_unavailable(descriptor.name.clone(), reason);

        // SAFETY: mmap'd safetensors file; safe as long as the file is not
        // modified while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| unavailable(format!("failed to load weights: {e}")))?
        };

        let build = || -> candle_core::Result<([ConvStage; 3], Linear)> {
            let stages = [
                ConvStage::load(1, 32, vb.pp("conv1"), vb.pp("bn1"))?,
                ConvStage::load(32, 64, vb.pp("conv2"), vb.pp("bn2"))?,
                ConvStage::load(64, 128, vb.pp("conv3"), vb.pp("bn3"))?,
            ];
            let fc = candle_nn::linear(128, descriptor.label_set.len(), vb.pp("fc"))?;
            Ok((stages, fc))
        };
        let (stages, fc) = build().map_err(|e| unavailable(format!("failed to build network: {e}")))?;

        let extractor = MelSpectrogram::new(MelConfig {
            sample_rate: descriptor.sample_rate,
            ..Default::default()
        });

        tracing::info!(
            model = %descriptor.name,
            labels = descriptor.label_set.len(),
            "loaded spectrogram CNN"
        );

        Ok(Self {
            name: descriptor.name.clone(),
            stages,
            fc,
            extractor,
            device: device.clone(),
            label_set: descriptor.label_set.clone(),
            sample_rate: descriptor.sample_rate,
        })
    }

    fn forward(&self, mel: Vec<Vec<f32>>) -> Result<Vec<f32>> {
        let prediction_err = |e: candle_core::Error| Error::prediction(e.to_string());

        let n_mels = mel.len();
        let width = mel.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<f32> = mel.into_iter().flatten().collect();

        let run = || -> candle_core::Result<Tensor> {
            let mut xs = Tensor::from_vec(flat, (1, 1, n_mels, width), &self.device)?;
            xs = self.stages[0].forward(&xs)?.max_pool2d(2)?;
            xs = self.stages[1].forward(&xs)?.max_pool2d(2)?;
            xs = self.stages[2].forward(&xs)?;
            // Adaptive average pool to 1x1.
            let pooled = xs.mean(D::Minus1)?.mean(D::Minus1)?;
            let logits = self.fc.forward(&pooled)?;
            candle_nn::ops::softmax(&logits, D::Minus1)?.squeeze(0)
        };

        run().map_err(prediction_err)?.to_vec1().map_err(prediction_err)
    }
}

#[async_trait]
impl EmotionPredictor for SpectrogramCnnClassifier {
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

        let prepared = waveform.resampled(self.sample_rate);
        let mel = self.extractor.compute(&prepared.samples)?;
        let probabilities = self.forward(mel)?;
        let (class, score) = argmax(&probabilities);
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

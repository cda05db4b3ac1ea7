//! Waveform decoding and resampling.

use maum_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Mono audio buffer with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file into a mono waveform. Multi-channel input is mixed
    /// down by averaging.
    pub fn from_wav_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| Error::prediction(format!("failed to open {}: {e}", path.display())))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::prediction(format!("failed to decode {}: {e}", path.display())))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| {
                        Error::prediction(format!("failed to decode {}: {e}", path.display()))
                    })?
            }
        };

        let channels = spec.channels as usize;
        let mono = if channels <= 1 {
            samples
        } else {
            samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        Ok(Self::new(mono, spec.sample_rate))
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Resample via linear interpolation. A no-op when the rates already
    /// match.
    pub fn resampled(&self, target_rate: u32) -> Waveform {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Waveform::new(self.samples.clone(), target_rate.max(1));
        }

        let ratio = self.sample_rate as f32 / target_rate as f32;
        let output_len = (self.samples.len() as f32 / ratio) as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f32 * ratio;
            let idx = src_pos as usize;
            let frac = src_pos - idx as f32;

            let sample = if idx + 1 < self.samples.len() {
                self.samples[idx] * (1.0 - frac) + self.samples[idx + 1] * frac
            } else if idx < self.samples.len() {
                self.samples[idx]
            } else {
                0.0
            };
            output.push(sample);
        }

        Waveform::new(output, target_rate)
    }

    /// Zero-mean, unit-variance normalization: the preprocessing the
    /// transform acoustic model's paired feature extractor performs.
    pub fn normalized(&self) -> Waveform {
        if self.samples.is_empty() {
            return self.clone();
        }
        let n = self.samples.len() as f32;
        let mean = self.samples.iter().sum::<f32>() / n;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f32>()
            / n;
        let denom = (variance + 1e-7).sqrt();
        let samples = self.samples.iter().map(|s| (s - mean) / denom).collect();
        Waveform::new(samples, self.sample_rate)
    }
}

/// Audio input accepted by the ensemble: a file path or an in-memory
/// waveform.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    Samples(Waveform),
}

impl AudioSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::Samples(Waveform::new(samples, sample_rate))
    }

    /// Resolve to a concrete waveform, decoding from disk when needed.
    pub fn resolve(&self) -> Result<Waveform> {
        match self {
            Self::Path(path) => Waveform::from_wav_file(path),
            Self::Samples(waveform) => Ok(waveform.clone()),
        }
    }
}

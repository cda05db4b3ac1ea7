//! Log-mel spectrogram extraction for the spectrogram CNN.
//!
//! Fixed-shape features: 128 mel bands by 128 time frames, regardless of
//! input duration. Shorter clips are zero-padded on the right, longer clips
//! cropped on the right. The mel scale is HTK (2595·log10(1 + f/700)), the
//! window is Hann, and the power spectrum comes from a real FFT.

use maum_core::{Error, Result};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Feature extractor configuration. The defaults are the parameters the
/// CNN was trained with.
#[derive(Debug, Clone)]
pub struct MelConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmax: f32,
    /// Fixed number of time frames after pad/crop.
    pub width: usize,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmax: 8000.0,
            width: 128,
        }
    }
}

/// Precomputed mel filterbank, Hann window, and FFT plan.
pub struct MelSpectrogram {
    config: MelConfig,
    window: Vec<f32>,
    filterbank: Vec<Vec<f32>>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl MelSpectrogram {
    pub fn new(config: MelConfig) -> Self {
        let window = hann_window(config.n_fft);
        let filterbank = mel_filterbank(
            config.n_mels,
            config.n_fft,
            config.sample_rate as f32,
            config.fmax,
        );
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(config.n_fft);
        Self {
            config,
            window,
            filterbank,
            fft,
        }
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Compute the normalized log-mel feature matrix: `n_mels` rows by
    /// `width` columns, values in [0, 1].
    ///
    /// The input must already be at the configured sample rate.
    pub fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return Err(Error::prediction("empty waveform"));
        }

        let MelConfig {
            n_fft,
            hop_length,
            n_mels,
            width,
            ..
        } = self.config;

        let n_frames = if samples.len() < n_fft {
            1
        } else {
            1 + (samples.len() - n_fft) / hop_length
        };

        let mut input = self.fft.make_input_vec();
        let mut spectrum: Vec<Complex<f32>> = self.fft.make_output_vec();

        // mel x time, filled column by column
        let mut mel = vec![vec![0.0f32; n_frames]; n_mels];

        for frame_idx in 0..n_frames {
            let start = frame_idx * hop_length;

            for (i, slot) in input.iter_mut().enumerate() {
                let sample = samples.get(start + i).copied().unwrap_or(0.0);
                *slot = sample * self.window[i];
            }

            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| Error::prediction(format!("fft failed: {e}")))?;

            for (band, filter) in self.filterbank.iter().enumerate() {
                let mut energy = 0.0f32;
                for (coeff, bin) in filter.iter().zip(spectrum.iter()) {
                    energy += coeff * bin.norm_sqr();
                }
                mel[band][frame_idx] = energy;
            }
        }

        // Decibels relative to the spectrogram maximum.
        let peak = mel
            .iter()
            .flat_map(|row| row.iter())
            .fold(f32::MIN, |acc, &v| acc.max(v))
            .max(1e-10);
        for row in &mut mel {
            for value in row.iter_mut() {
                *value = 10.0 * (value.max(1e-10) / peak).log10();
            }
        }

        // Min-max normalize to [0, 1].
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for row in &mel {
            for &value in row {
                lo = lo.min(value);
                hi = hi.max(value);
            }
        }
        let span = hi - lo + 1e-6;
        for row in &mut mel {
            for value in row.iter_mut() {
                *value = (*value - lo) / span;
            }
        }

        // Pad or crop the time axis to the fixed width.
        for row in &mut mel {
            row.resize(width, 0.0);
        }

        Ok(mel)
    }
}

impl Default for MelSpectrogram {
    fn default() -> Self {
        Self::new(MelConfig::default())
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over the real-FFT bin axis, band-limited to
/// `fmax`.
fn mel_filterbank(n_bands: usize, n_fft: usize, sample_rate: f32, fmax: f32) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let f_max = fmax.min(sample_rate / 2.0);

    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(f_max);

    let n_points = n_bands + 2;
    let mel_points: Vec<f32> = (0..n_points)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
        .collect();

    let bin_points: Vec<f32> = mel_points
        .iter()
        .map(|&m| mel_to_hz(m) * n_fft as f32 / sample_rate)
        .collect();

    let mut filterbank = Vec::with_capacity(n_bands);
    for band in 0..n_bands {
        let mut filter = vec![0.0f32; n_bins];
        let left = bin_points[band];
        let center = bin_points[band + 1];
        let right = bin_points[band + 2];

        for (bin, slot) in filter.iter_mut().enumerate() {
            let bin_f = bin as f32;
            if bin_f >= left && bin_f <= center && (center - left) > 0.0 {
                *slot = (bin_f - left) / (center - left);
            } else if bin_f > center && bin_f <= right && (right - center) > 0.0 {
                *slot = (right - bin_f) / (right - center);
            }
        }
        filterbank.push(filter);
    }

    filterbank
}

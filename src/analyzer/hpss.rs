//! Harmonic-percussive source separation by median filtering.
//!
//! The magnitude spectrogram is median filtered along time (sustained tones
//! survive) and along frequency (transients survive). A Wiener-style soft
//! mask built from the two, with a separation margin applied to the
//! percussive side, keeps the harmonic part of the STFT, which is then
//! inverted back to a waveform of the input length.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum HpssError {
    #[error("Separation margin must be >= 1.0, got {0}")]
    InvalidMargin(f64),
    #[error("Invalid STFT configuration: {0}")]
    InvalidConfig(String),
}

/// Parameters of the harmonic extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicConfig {
    /// Separation margin. Larger values isolate tonal content more aggressively.
    pub margin: f64,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Median filter length, in frames (time) and bins (frequency).
    pub kernel_size: usize,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self {
            margin: 1.0,
            n_fft: 2048,
            hop_length: 512,
            kernel_size: 31,
        }
    }
}

impl HarmonicConfig {
    pub fn with_margin(margin: f64) -> Self {
        Self {
            margin,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), HpssError> {
        if self.margin.is_nan() || self.margin < 1.0 {
            return Err(HpssError::InvalidMargin(self.margin));
        }
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return Err(HpssError::InvalidConfig(format!(
                "n_fft must be even and >= 2, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(HpssError::InvalidConfig(format!(
                "hop_length must be in 1..={}, got {}",
                self.n_fft, self.hop_length
            )));
        }
        if self.kernel_size == 0 {
            return Err(HpssError::InvalidConfig("kernel_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Frame-major spectrogram: `frames[t][k]` for bins `k in 0..=n_fft/2`.
type Spectrogram = Vec<Vec<Complex<f64>>>;

/// Extract the harmonic component of `samples`. Output has the input's length.
pub fn harmonic(samples: &[f64], config: &HarmonicConfig) -> Result<Vec<f64>, HpssError> {
    config.validate()?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut planner = FftPlanner::<f64>::new();
    let window = hann(config.n_fft);

    let stft = forward_stft(samples, config, &window, &mut planner);
    let magnitude: Vec<Vec<f64>> = stft
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();

    let harm = median_along_time(&magnitude, config.kernel_size);
    let perc = median_along_freq(&magnitude, config.kernel_size);

    let masked: Spectrogram = stft
        .iter()
        .enumerate()
        .map(|(t, frame)| {
            frame
                .iter()
                .enumerate()
                .map(|(k, &c)| c * soft_mask(harm[t][k], perc[t][k] * config.margin))
                .collect()
        })
        .collect();

    log::trace!(
        "HPSS: {} frames x {} bins, margin {}",
        stft.len(),
        config.n_fft / 2 + 1,
        config.margin
    );

    Ok(inverse_stft(&masked, config, &window, samples.len(), &mut planner))
}

/// Periodic Hann window.
fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
        .collect()
}

/// Soft mask with power 2. Zero where both references are (numerically) zero.
fn soft_mask(x: f64, x_ref: f64) -> f64 {
    let z = x.max(x_ref);
    if z < f64::MIN_POSITIVE {
        return 0.0;
    }
    let a = (x / z).powi(2);
    let b = (x_ref / z).powi(2);
    a / (a + b)
}

/// Centered STFT: the signal is zero padded by `n_fft / 2` on both sides.
fn forward_stft(
    samples: &[f64],
    config: &HarmonicConfig,
    window: &[f64],
    planner: &mut FftPlanner<f64>,
) -> Spectrogram {
    let n_fft = config.n_fft;
    let pad = n_fft / 2;
    let mut padded = vec![0.0; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_frames = 1 + (padded.len() - n_fft) / config.hop_length;
    let fft = planner.plan_fft_forward(n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    (0..n_frames)
        .map(|t| {
            let start = t * config.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            buffer[..=n_fft / 2].to_vec()
        })
        .collect()
}

/// Overlap-add inverse of [`forward_stft`], normalised by the summed squared window.
fn inverse_stft(
    stft: &Spectrogram,
    config: &HarmonicConfig,
    window: &[f64],
    length: usize,
    planner: &mut FftPlanner<f64>,
) -> Vec<f64> {
    let n_fft = config.n_fft;
    let half = n_fft / 2;
    let total = n_fft + config.hop_length * stft.len().saturating_sub(1);
    let mut output = vec![0.0; total];
    let mut window_sum = vec![0.0; total];

    let ifft = planner.plan_fft_inverse(n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    for (t, frame) in stft.iter().enumerate() {
        // Rebuild the conjugate-symmetric full spectrum
        buffer[..=half].copy_from_slice(frame);
        for k in 1..half {
            buffer[n_fft - k] = frame[k].conj();
        }
        ifft.process(&mut buffer);

        let start = t * config.hop_length;
        for i in 0..n_fft {
            let w = window[i];
            output[start + i] += buffer[i].re / n_fft as f64 * w;
            window_sum[start + i] += w * w;
        }
    }

    for (y, &w) in output.iter_mut().zip(&window_sum) {
        if w > f64::MIN_POSITIVE {
            *y /= w;
        }
    }

    let mut trimmed: Vec<f64> = output.into_iter().skip(half).take(length).collect();
    trimmed.resize(length, 0.0);
    trimmed
}

/// Map an out-of-range index into `0..n` by mirror reflection about the edges
/// (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n { m as usize } else { (period - 1 - m) as usize }
}

fn median(window: &mut [f64]) -> f64 {
    let mid = window.len() / 2;
    let (_, m, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Median filter each frequency bin across frames.
fn median_along_time(mag: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let n_frames = mag.len();
    let n_bins = mag.first().map(|f| f.len()).unwrap_or(0);
    let half = (kernel / 2) as isize;
    let mut out = vec![vec![0.0; n_bins]; n_frames];
    let mut scratch = vec![0.0; kernel];

    for k in 0..n_bins {
        for t in 0..n_frames {
            for (j, slot) in scratch.iter_mut().enumerate() {
                let src = reflect(t as isize + j as isize - half, n_frames);
                *slot = mag[src][k];
            }
            out[t][k] = median(&mut scratch);
        }
    }
    out
}

/// Median filter each frame across frequency bins.
fn median_along_freq(mag: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let half = (kernel / 2) as isize;
    let mut scratch = vec![0.0; kernel];

    mag.iter()
        .map(|frame| {
            let n_bins = frame.len();
            (0..n_bins)
                .map(|k| {
                    for (j, slot) in scratch.iter_mut().enumerate() {
                        *slot = frame[reflect(k as isize + j as isize - half, n_bins)];
                    }
                    median(&mut scratch)
                })
                .collect()
        })
        .collect()
}

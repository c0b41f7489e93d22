use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::Deserialize;

/// A single surviving (frequency, power) pair of the reduced spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPoint {
    pub frequency: f64,
    pub power: f64,
}

/// Sparsification floor: only points strictly above both limits survive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PsdFloor {
    pub min_freq: f64,
    pub min_power: f64,
}

impl Default for PsdFloor {
    fn default() -> Self {
        Self {
            min_freq: 10.0,
            min_power: 0.05,
        }
    }
}

/// Full-length DFT of a real signal.
pub fn spectrum(samples: &[f64]) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    if buffer.is_empty() {
        return buffer;
    }
    let fft = FftPlanner::<f64>::new().plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Convert a spectrum of `n` bins into thresholded power points.
///
/// Bin `k` sits at `k * sample_rate / n` Hz with power `|X[k]|^2 / n`. Output
/// is in ascending frequency order.
pub fn power_points(spec: &[Complex<f64>], sample_rate: u32, floor: &PsdFloor) -> Vec<SpectralPoint> {
    let n = spec.len() as f64;
    let spacing = sample_rate as f64 / n;

    spec.iter()
        .enumerate()
        .map(|(k, x)| SpectralPoint {
            frequency: k as f64 * spacing,
            power: x.norm_sqr() / n,
        })
        .filter(|p| p.power > floor.min_power && p.frequency > floor.min_freq)
        .collect()
}

/// Reduce a waveform to its sparse power spectral density.
pub fn reduce_psd(samples: &[f64], sample_rate: u32, floor: &PsdFloor) -> Vec<SpectralPoint> {
    power_points(&spectrum(samples), sample_rate, floor)
}

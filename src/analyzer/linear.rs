use rustfft::num_complex::Complex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RangeError {
    #[error("linear min_hz ({min_hz}) must not exceed max_hz ({max_hz})")]
    Inverted { min_hz: u32, max_hz: u32 },

    #[error("linear max_hz must be below {max}, got {0}", max = u32::MAX)]
    TooHigh(u32),
}

/// Inclusive integer-Hz range covered by the linear-bin features.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinearRange {
    pub min_hz: u32,
    pub max_hz: u32,
}

impl Default for LinearRange {
    fn default() -> Self {
        Self {
            min_hz: 10,
            max_hz: 8000,
        }
    }
}

impl LinearRange {
    pub fn validate(&self) -> Result<(), RangeError> {
        if self.max_hz == u32::MAX {
            return Err(RangeError::TooHigh(self.max_hz));
        }
        if self.min_hz > self.max_hz {
            return Err(RangeError::Inverted {
                min_hz: self.min_hz,
                max_hz: self.max_hz,
            });
        }
        Ok(())
    }

    /// Number of output slots, one per integer Hz. Agrees with `labels()`.
    pub fn width(&self) -> usize {
        self.max_hz
            .checked_sub(self.min_hz)
            .map_or(0, |d| d as usize + 1)
    }

    /// Integer frequencies labelling each slot.
    pub fn labels(&self) -> impl Iterator<Item = u32> {
        self.min_hz..=self.max_hz
    }
}

/// Sum spectral magnitudes into 1 Hz bins.
///
/// Bin `i` of the spectrum sits at `i * sample_rate / n` Hz and is rounded to
/// the nearest integer (ties to even). Magnitudes rounding to the same
/// integer accumulate. The scan stops at the first bin rounding above
/// `range.max_hz`. The output always has `range.width()` slots; frequencies
/// no bin rounds to stay 0.
pub fn aggregate_linear_bins(spec: &[Complex<f64>], sample_rate: u32, range: &LinearRange) -> Vec<f64> {
    let mut bins = vec![0.0; range.width()];
    if spec.is_empty() {
        return bins;
    }

    let spacing = sample_rate as f64 / spec.len() as f64;
    let (lo, hi) = (range.min_hz as f64, range.max_hz as f64);

    for (i, x) in spec.iter().enumerate() {
        let hz = (i as f64 * spacing).round_ties_even();
        if hz > hi {
            break;
        }
        if hz < lo {
            continue;
        }
        bins[(hz - lo) as usize] += x.norm();
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::psd::spectrum;

    #[test]
    fn test_width() {
        assert_eq!(LinearRange::default().width(), 7991);
        let labels: Vec<u32> = LinearRange { min_hz: 3, max_hz: 5 }.labels().collect();
        assert_eq!(labels, vec![3, 4, 5]);
    }

    #[test]
    fn test_half_hz_spacing_rounds_ties_to_even() {
        // 0.5 Hz spacing, unit magnitude everywhere
        let spec = vec![Complex::new(1.0, 0.0); 40_000];
        let bins = aggregate_linear_bins(&spec, 20_000, &LinearRange::default());
        assert_eq!(bins.len(), 7991);

        // Even integers take k-0.5, k, k+0.5; odd integers take only k
        assert_eq!(bins[0], 3.0); // 10 Hz
        assert_eq!(bins[1], 1.0); // 11 Hz
        assert_eq!(bins[2], 3.0); // 12 Hz
        assert_eq!(bins[7989], 1.0); // 7999 Hz
        assert_eq!(bins[7990], 3.0); // 8000 Hz
    }

    #[test]
    fn test_coarse_spacing_leaves_zero_slots() {
        // 4 Hz spacing: only every fourth integer receives a bin
        let spec = vec![Complex::new(2.0, 0.0); 1000];
        let bins = aggregate_linear_bins(&spec, 4000, &LinearRange::default());
        assert_eq!(bins.len(), 7991);
        assert_eq!(bins[12 - 10], 2.0);
        assert_eq!(bins[13 - 10], 0.0);
        assert_eq!(bins[16 - 10], 2.0);
        // Nothing above the last bin (3996 Hz)
        assert!(bins[(4000 - 10)..].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_pure_tone_peak_at_440() {
        let sr = 22050u32;
        let x: Vec<f64> = (0..sr as usize * 2)
            .map(|i| 0.5 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin())
            .collect();
        let bins = aggregate_linear_bins(&spectrum(&x), sr, &LinearRange::default());
        let (peak, _) = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak as u32 + 10, 440);
    }

    #[test]
    fn test_empty_spectrum() {
        let bins = aggregate_linear_bins(&[], 22050, &LinearRange::default());
        assert_eq!(bins.len(), 7991);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_range_validation() {
        assert!(LinearRange::default().validate().is_ok());
        assert!(LinearRange { min_hz: 440, max_hz: 440 }.validate().is_ok());

        let inverted = LinearRange { min_hz: 100, max_hz: 50 };
        assert_eq!(
            inverted.validate(),
            Err(RangeError::Inverted { min_hz: 100, max_hz: 50 })
        );
        assert_eq!(inverted.width(), 0);
        assert_eq!(inverted.labels().count(), 0);

        let huge = LinearRange { min_hz: 0, max_hz: u32::MAX };
        assert_eq!(huge.validate(), Err(RangeError::TooHigh(u32::MAX)));
        assert_eq!(LinearRange { min_hz: 0, max_hz: u32::MAX - 1 }.width(), u32::MAX as usize);
    }
}

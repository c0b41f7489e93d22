use crate::analyzer::linear::LinearRange;
use crate::bands::PitchClass;

/// Which feature representation a dataset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    PitchClass,
    Linear,
}

impl FeatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PitchClass => "pitch_class",
            Self::Linear => "linear",
        }
    }
}

/// Power per pitch class, or magnitude per integer Hz.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureVector {
    PitchClass([f64; 12]),
    Linear(Vec<f64>),
}

impl FeatureVector {
    pub fn mode(&self) -> FeatureMode {
        match self {
            Self::PitchClass(_) => FeatureMode::PitchClass,
            Self::Linear(_) => FeatureMode::Linear,
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            Self::PitchClass(v) => v,
            Self::Linear(v) => v,
        }
    }
}

/// One training example: features, ground-truth label, and source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub features: FeatureVector,
    pub key_label: String,
    pub file_name: String,
}

pub const KEY_COLUMN: &str = "key";
pub const FILE_COLUMN: &str = "file_name";

/// Column names for a dataset of the given mode.
pub fn header(mode: FeatureMode, range: &LinearRange) -> Vec<String> {
    let mut cols: Vec<String> = match mode {
        FeatureMode::PitchClass => PitchClass::ALL.iter().map(|p| p.label().to_string()).collect(),
        FeatureMode::Linear => range.labels().map(|hz| hz.to_string()).collect(),
    };
    cols.push(KEY_COLUMN.to_string());
    cols.push(FILE_COLUMN.to_string());
    cols
}

/// Row counts reported by `status`.
#[derive(Debug, Clone, Default)]
pub struct DatasetStats {
    pub rows: usize,
    pub labels: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_header() {
        let h = header(FeatureMode::PitchClass, &LinearRange::default());
        assert_eq!(h.len(), 14);
        assert_eq!(h[0], "C");
        assert_eq!(h[11], "B");
        assert_eq!(h[12], "key");
        assert_eq!(h[13], "file_name");
    }

    #[test]
    fn test_linear_header() {
        let h = header(FeatureMode::Linear, &LinearRange::default());
        assert_eq!(h.len(), 7991 + 2);
        assert_eq!(h[0], "10");
        assert_eq!(h[7990], "8000");
    }

    #[test]
    fn test_vector_mode() {
        assert_eq!(FeatureVector::PitchClass([0.0; 12]).mode(), FeatureMode::PitchClass);
        assert_eq!(FeatureVector::Linear(vec![1.0]).values(), &[1.0]);
    }
}

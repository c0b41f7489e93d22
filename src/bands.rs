use std::fmt;

/// Center frequency of C0, the lowest band in the table.
pub const C0_HZ: f64 = 16.35;

/// Number of octaves covered by the table (C0 through B8).
pub const OCTAVES: usize = 9;

/// One of the twelve equal-tempered pitch classes, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    EFlat,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    BFlat,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        Self::C,
        Self::CSharp,
        Self::D,
        Self::EFlat,
        Self::E,
        Self::F,
        Self::FSharp,
        Self::G,
        Self::GSharp,
        Self::A,
        Self::BFlat,
        Self::B,
    ];

    /// Position in the canonical order (C = 0 ... B = 11).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// Column label used in dataset headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::EFlat => "Eb",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::BFlat => "Bb",
            Self::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A frequency band attributed to one pitch class in one octave.
/// The band covers the half-open interval `[min_freq, max_freq)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub pitch_class: PitchClass,
    pub octave: u8,
    pub min_freq: f64,
    pub center_freq: f64,
    pub max_freq: f64,
}

impl Band {
    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.min_freq && freq < self.max_freq
    }
}

/// Immutable table of 108 contiguous bands (12 pitch classes x 9 octaves),
/// in strictly ascending frequency order.
#[derive(Debug, Clone)]
pub struct BandTable {
    bands: Vec<Band>,
}

impl BandTable {
    /// The standard table anchored at C0 = 16.35 Hz.
    pub fn equal_tempered() -> Self {
        Self::new(C0_HZ)
    }

    /// Build the table from the center frequency of C0.
    ///
    /// Each center is one semitone above the previous; each band's upper edge
    /// is the arithmetic midpoint between its center and the next projected
    /// center, and each lower edge is the previous band's upper edge. The
    /// first band starts at 0 Hz.
    pub fn new(anchor_hz: f64) -> Self {
        let half_step = 2f64.powf(1.0 / 12.0);
        let count = PitchClass::ALL.len() * OCTAVES;
        let mut bands = Vec::with_capacity(count);

        let mut center = anchor_hz;
        let mut min = 0.0;
        for i in 0..count {
            if i > 0 {
                center *= half_step;
            }
            let max = (center * half_step + center) / 2.0;
            bands.push(Band {
                pitch_class: PitchClass::ALL[i % 12],
                octave: (i / 12) as u8,
                min_freq: min,
                center_freq: center,
                max_freq: max,
            });
            min = max;
        }

        Self { bands }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Upper edge of the highest band; frequencies at or above it match nothing.
    pub fn highest_max(&self) -> f64 {
        self.bands.last().map(|b| b.max_freq).unwrap_or(0.0)
    }

    /// Index of the band containing `freq`, if any.
    pub fn position(&self, freq: f64) -> Option<usize> {
        // Bands are sorted and contiguous, so the first band whose max exceeds
        // freq is the only candidate.
        let idx = self.bands.partition_point(|b| b.max_freq <= freq);
        self.bands
            .get(idx)
            .filter(|b| b.contains(freq))
            .map(|_| idx)
    }

    pub fn find(&self, freq: f64) -> Option<&Band> {
        self.position(freq).map(|i| &self.bands[i])
    }
}

use std::collections::BTreeMap;

use super::psd::SpectralPoint;
use crate::bands::{BandTable, PitchClass};

/// Spectral power summed per pitch class across octaves.
///
/// Only classes with at least one non-empty band are present; use
/// [`PitchClassPowers::to_vector`] for a fixed-width, zero-filled view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchClassPowers {
    powers: BTreeMap<PitchClass, f64>,
}

impl PitchClassPowers {
    pub fn get(&self, pc: PitchClass) -> Option<f64> {
        self.powers.get(&pc).copied()
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.powers.contains_key(&pc)
    }

    /// Present classes in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (PitchClass, f64)> + '_ {
        self.powers.iter().map(|(&pc, &p)| (pc, p))
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.powers.values().sum()
    }

    /// Pitch class carrying the most power.
    pub fn dominant(&self) -> Option<PitchClass> {
        self.powers
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&pc, _)| pc)
    }

    /// One value per pitch class in canonical order, missing classes as 0.
    pub fn to_vector(&self) -> [f64; 12] {
        let mut out = [0.0; 12];
        for (pc, p) in self.iter() {
            out[pc.index()] = p;
        }
        out
    }
}

/// Bin spectral points onto the band table and sum per pitch class.
///
/// Each point lands in the single band with `min_freq <= f < max_freq`, or
/// nowhere if it lies outside the table. The accumulator is local to this
/// call. Points are summed in a canonical (frequency, power) order so the
/// result does not depend on the order of `points`.
pub fn aggregate_pitch_classes(table: &BandTable, points: &[SpectralPoint]) -> PitchClassPowers {
    let mut ordered: Vec<&SpectralPoint> = points.iter().collect();
    ordered.sort_by(|a, b| {
        a.frequency
            .total_cmp(&b.frequency)
            .then(a.power.total_cmp(&b.power))
    });

    let mut per_band = vec![0.0f64; table.len()];
    let mut unmatched = 0usize;
    for p in ordered {
        match table.position(p.frequency) {
            Some(i) => per_band[i] += p.power,
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        log::trace!("{} spectral points fell outside the band table", unmatched);
    }

    let mut powers = BTreeMap::new();
    for (band, &power) in table.bands().iter().zip(&per_band) {
        if power > 0.0 {
            *powers.entry(band.pitch_class).or_insert(0.0) += power;
        }
    }

    PitchClassPowers { powers }
}

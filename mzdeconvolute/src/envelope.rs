//! The isotopic envelope, the product of every deconvolution algorithm
use mzpeaks::{CoordinateLike, DeconvolutedPeak, IntensityMeasurement, KnownCharge, Mass, MZ};

use crate::isotopic_model::mass_to_mz;
use crate::params::DeconvolutionType;
use crate::spectrum::MzPeak;

/// A candidate neutral species recovered from a spectrum.
///
/// `score` is only comparable between envelopes produced by the same algorithm,
/// which is recorded in `algorithm`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopicEnvelope {
    pub monoisotopic_mass: f64,
    pub most_abundant_observed_isotopic_mass: f64,
    pub charge: i32,
    /// The input peaks assigned to this envelope, in ascending m/z order
    pub peaks: Vec<MzPeak>,
    pub total_intensity: f64,
    pub score: f64,
    pub algorithm: DeconvolutionType,
}

impl IsotopicEnvelope {
    /// Create a new envelope, sorting `peaks` by m/z and summing their intensity
    pub fn new(
        monoisotopic_mass: f64,
        most_abundant_observed_isotopic_mass: f64,
        charge: i32,
        mut peaks: Vec<MzPeak>,
        score: f64,
        algorithm: DeconvolutionType,
    ) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        let total_intensity = peaks.iter().map(|p| p.intensity).sum();
        Self {
            monoisotopic_mass,
            most_abundant_observed_isotopic_mass,
            charge,
            peaks,
            total_intensity,
            score,
            algorithm,
        }
    }

    /// Replace the total intensity, for algorithms where only part of the assigned
    /// signal supports the mass estimate
    pub fn with_total_intensity(mut self, total_intensity: f64) -> Self {
        self.total_intensity = total_intensity;
        self
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// The m/z of the monoisotopic peak at this envelope's charge
    pub fn monoisotopic_mz(&self) -> f64 {
        mass_to_mz(self.monoisotopic_mass, self.charge)
    }

    /// The m/z of the most abundant observed isotope at this envelope's charge
    pub fn most_abundant_observed_isotopic_mz(&self) -> f64 {
        mass_to_mz(self.most_abundant_observed_isotopic_mass, self.charge)
    }

    pub fn min_mz(&self) -> Option<f64> {
        self.peaks.first().map(|p| p.mz)
    }

    pub fn max_mz(&self) -> Option<f64> {
        self.peaks.last().map(|p| p.mz)
    }

    /// Whether this envelope and `other` were assigned at least one common input peak
    pub fn shares_peaks_with(&self, other: &Self) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.peaks.len() && j < other.peaks.len() {
            let (a, b) = (self.peaks[i].mz, other.peaks[j].mz);
            if a == b {
                return true;
            }
            if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Whether the envelope satisfies its structural invariants: a non-zero charge,
    /// at least one peak and a finite monoisotopic mass
    pub fn is_valid(&self) -> bool {
        self.charge != 0 && !self.peaks.is_empty() && self.monoisotopic_mass.is_finite()
    }
}

impl CoordinateLike<Mass> for IsotopicEnvelope {
    fn coordinate(&self) -> f64 {
        self.monoisotopic_mass
    }
}

impl CoordinateLike<MZ> for IsotopicEnvelope {
    fn coordinate(&self) -> f64 {
        self.monoisotopic_mz()
    }
}

impl IntensityMeasurement for IsotopicEnvelope {
    fn intensity(&self) -> f32 {
        self.total_intensity as f32
    }
}

impl KnownCharge for IsotopicEnvelope {
    fn charge(&self) -> i32 {
        self.charge
    }
}

impl From<&IsotopicEnvelope> for DeconvolutedPeak {
    fn from(value: &IsotopicEnvelope) -> Self {
        DeconvolutedPeak::new(
            value.monoisotopic_mass,
            value.total_intensity as f32,
            value.charge,
            0,
        )
    }
}

//! Isotopic pattern evaluation tools
use crate::spectrum::MzPeak;

pub type ScoreType = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScoreInterpretation {
    HigherIsBetter,
    LowerIsBetter,
}

/// Compare an experimental peak list against a theoretical pattern of the same length.
///
/// The two slices are paired positionally. An experimental peak with zero intensity
/// marks a theoretical isotope that was not observed.
pub trait IsotopicPatternScorer {
    fn score(&self, experimental: &[MzPeak], theoretical: &[MzPeak]) -> ScoreType;

    fn interpretation(&self) -> ScoreInterpretation {
        ScoreInterpretation::HigherIsBetter
    }
}

/// The cosine similarity of the experimental and theoretical intensity vectors,
/// ranging from 0 to 1 and insensitive to the overall scale of either.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CosineScorer {}

impl IsotopicPatternScorer for CosineScorer {
    fn score(&self, experimental: &[MzPeak], theoretical: &[MzPeak]) -> ScoreType {
        let mut dot = 0.0;
        let mut e_norm = 0.0;
        let mut t_norm = 0.0;
        for (e, t) in experimental.iter().zip(theoretical.iter()) {
            dot += e.intensity * t.intensity;
            e_norm += e.intensity * e.intensity;
            t_norm += t.intensity * t.intensity;
        }
        let denominator = (e_norm * t_norm).sqrt();
        if denominator > 0.0 {
            dot / denominator
        } else {
            0.0
        }
    }
}

/// The per-peak agreement score of MS-Deconv (Liu et al., MCP 2010,
/// <https://doi.org/10.1074/mcp.M110.002766>), summed over the pattern.
///
/// Each matched pair contributes `sqrt(int(t))` weighted by how close its m/z is,
/// falling linearly to zero at `error_tolerance`, and by how close its intensity is,
/// falling to zero once the relative intensity difference exceeds 1. Missing peaks
/// contribute nothing. The theoretical intensities are rescaled to the experimental
/// total before comparison.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MSDeconvScorer {
    /// The m/z error at which a peak stops contributing
    pub error_tolerance: f64,
}

impl MSDeconvScorer {
    pub fn new(error_tolerance: f64) -> Self {
        Self { error_tolerance }
    }

    #[inline]
    pub fn score_peak(&self, experimental: &MzPeak, theoretical: &MzPeak) -> ScoreType {
        let e_int = experimental.intensity;
        if e_int <= 0.0 {
            return 0.0;
        }
        let mass_error = (experimental.mz - theoretical.mz).abs();
        if mass_error > self.error_tolerance {
            return 0.0;
        }
        let mass_accuracy = 1.0 - mass_error / self.error_tolerance;

        let t_int = theoretical.intensity;
        let ratio = (t_int - e_int) / e_int;

        let abundance_diff = if e_int < t_int && ratio <= 1.0 {
            1.0 - ratio
        } else if e_int >= t_int && ratio.abs() <= 1.0 {
            1.0 + ratio
        } else {
            return 0.0;
        };
        t_int.sqrt() * mass_accuracy * abundance_diff
    }
}

impl Default for MSDeconvScorer {
    fn default() -> MSDeconvScorer {
        MSDeconvScorer {
            error_tolerance: 0.02,
        }
    }
}

impl IsotopicPatternScorer for MSDeconvScorer {
    fn score(&self, experimental: &[MzPeak], theoretical: &[MzPeak]) -> ScoreType {
        let e_total: f64 = experimental.iter().map(|p| p.intensity).sum();
        let t_total: f64 = theoretical.iter().map(|p| p.intensity).sum();
        if t_total <= 0.0 {
            return 0.0;
        }
        let scale = e_total / t_total;
        experimental
            .iter()
            .zip(theoretical.iter())
            .map(|(e, t)| self.score_peak(e, &MzPeak::new(t.mz, t.intensity * scale)))
            .sum()
    }
}

/// The selectable pattern scorers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScorerType {
    #[default]
    Cosine,
    MSDeconv,
}

impl IsotopicPatternScorer for ScorerType {
    fn score(&self, experimental: &[MzPeak], theoretical: &[MzPeak]) -> ScoreType {
        match self {
            ScorerType::Cosine => CosineScorer::default().score(experimental, theoretical),
            ScorerType::MSDeconv => MSDeconvScorer::default().score(experimental, theoretical),
        }
    }
}

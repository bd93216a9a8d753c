//! Deconvolution parameters, one configuration type per algorithm
use std::fmt::Display;
use std::str::FromStr;

use crate::charge::{validate_charge_range, ChargeRange, Polarity};
use crate::deconv_traits::DeconvolutionError;
use crate::isotopic_model::IsotopicModels;
use crate::scorer::ScorerType;
use crate::tolerance::Tolerance;

/// The closed set of deconvolution algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum DeconvolutionType {
    /// Averagine envelope matching
    Classic,
    /// Charge ladder detection in log m/z space
    LogClustering,
    /// Isotope pattern template matching
    #[cfg_attr(feature = "serde", serde(rename = "isodec"))]
    IsoDec,
    /// Reserved, not yet implemented
    Spectral,
}

impl DeconvolutionType {
    pub const ALL: [DeconvolutionType; 4] = [
        DeconvolutionType::Classic,
        DeconvolutionType::LogClustering,
        DeconvolutionType::IsoDec,
        DeconvolutionType::Spectral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeconvolutionType::Classic => "classic",
            DeconvolutionType::LogClustering => "log-clustering",
            DeconvolutionType::IsoDec => "isodec",
            DeconvolutionType::Spectral => "spectral",
        }
    }
}

impl Display for DeconvolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeconvolutionType {
    type Err = DeconvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == key)
            .ok_or_else(|| DeconvolutionError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl TryFrom<i32> for DeconvolutionType {
    type Error = DeconvolutionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| DeconvolutionError::UnsupportedAlgorithm(value.to_string()))
    }
}

/// Parameters for averagine envelope matching
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ClassicDeconvolutionParameters {
    pub min_charge: i32,
    pub max_charge: i32,
    pub polarity: Polarity,
    /// The mass accuracy window for matching theoretical isotopes to peaks
    pub tolerance: Tolerance,
    /// How far, as a multiplicative factor, an observed isotope's intensity may stray
    /// from the value predicted by the most abundant isotope
    pub intensity_ratio_limit: f64,
    pub isotopic_model: IsotopicModels,
    /// Envelopes with fewer peaks than this are discarded
    pub min_peaks: usize,
}

impl Default for ClassicDeconvolutionParameters {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 60,
            polarity: Polarity::Positive,
            tolerance: Tolerance::Ppm(4.0),
            intensity_ratio_limit: 3.0,
            isotopic_model: IsotopicModels::Peptide,
            min_peaks: 2,
        }
    }
}

impl ClassicDeconvolutionParameters {
    pub fn new(
        min_charge: i32,
        max_charge: i32,
        tolerance: Tolerance,
        intensity_ratio_limit: f64,
        polarity: Polarity,
    ) -> Self {
        Self {
            min_charge,
            max_charge,
            tolerance,
            intensity_ratio_limit,
            polarity,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        validate_charge_range(self.min_charge, self.max_charge, self.polarity)?;
        self.tolerance.validate()?;
        if !(self.intensity_ratio_limit >= 1.0) {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "Intensity ratio limit must be at least 1, got {}",
                self.intensity_ratio_limit
            )));
        }
        if self.min_peaks < 2 {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "An envelope needs at least 2 peaks, got a minimum of {}",
                self.min_peaks
            )));
        }
        Ok(())
    }
}

/// Parameters for charge ladder clustering in log m/z space
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LogClusteringParameters {
    pub min_charge: i32,
    pub max_charge: i32,
    pub polarity: Polarity,
    /// Peaks at or below this intensity are dropped before the log transform
    pub intensity_threshold: f64,
    /// The ppm window used when matching charge ladder steps in log space
    pub log_mz_tolerance_ppm: f64,
    /// Groups whose neutral masses agree within this window are likely correct
    pub correct_ppm_tolerance: f64,
    /// Groups whose neutral masses disagree beyond this window are likely incorrect
    pub incorrect_ppm_tolerance: f64,
    /// The fraction of mass pairs that must agree for a group to count as correct
    pub correct_fraction: f64,
    /// The ppm window for the consensus mass of a group
    pub consensus_ppm_tolerance: f64,
}

impl Default for LogClusteringParameters {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 60,
            polarity: Polarity::Positive,
            intensity_threshold: 0.01,
            log_mz_tolerance_ppm: 250.0,
            correct_ppm_tolerance: 25.0,
            incorrect_ppm_tolerance: 250.0,
            correct_fraction: 0.7,
            consensus_ppm_tolerance: 25.0,
        }
    }
}

impl LogClusteringParameters {
    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        validate_charge_range(self.min_charge, self.max_charge, self.polarity)?;
        for (name, value) in [
            ("log_mz_tolerance_ppm", self.log_mz_tolerance_ppm),
            ("correct_ppm_tolerance", self.correct_ppm_tolerance),
            ("incorrect_ppm_tolerance", self.incorrect_ppm_tolerance),
            ("consensus_ppm_tolerance", self.consensus_ppm_tolerance),
        ] {
            Tolerance::Ppm(value).validate().map_err(|e| {
                DeconvolutionError::ConfigurationError(format!("{name}: {e}"))
            })?;
        }
        if !(0.0..=1.0).contains(&self.correct_fraction) {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "Correct fraction must lie in [0, 1], got {}",
                self.correct_fraction
            )));
        }
        Ok(())
    }
}

/// Parameters for isotope pattern template matching
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct IsoDecParameters {
    pub min_charge: i32,
    pub max_charge: i32,
    pub polarity: Polarity,
    /// The mass accuracy window for matching template isotopes to peaks
    pub tolerance: Tolerance,
    /// The fewest matched isotopes an accepted envelope may have
    pub min_peaks: usize,
    /// The lowest template agreement an accepted envelope may have
    pub min_score: f64,
    /// Also try aligning the seed one isotope to either side of the template apex
    pub check_off_by_one: bool,
    pub scorer: ScorerType,
    pub isotopic_model: IsotopicModels,
}

impl Default for IsoDecParameters {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 50,
            polarity: Polarity::Positive,
            tolerance: Tolerance::Ppm(10.0),
            min_peaks: 3,
            min_score: 0.6,
            check_off_by_one: true,
            scorer: ScorerType::Cosine,
            isotopic_model: IsotopicModels::Peptide,
        }
    }
}

impl IsoDecParameters {
    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        validate_charge_range(self.min_charge, self.max_charge, self.polarity)?;
        self.tolerance.validate()?;
        if self.min_peaks == 0 {
            return Err(DeconvolutionError::ConfigurationError(
                "The minimum number of matched peaks must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters reserved for a spectrum-level deconvolution strategy that is not
/// available yet. Running with them fails with [`DeconvolutionError::NotImplemented`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SpectralDeconvolutionParameters {
    pub min_charge: i32,
    pub max_charge: i32,
    pub polarity: Polarity,
    pub tolerance: Tolerance,
}

impl Default for SpectralDeconvolutionParameters {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 60,
            polarity: Polarity::Positive,
            tolerance: Tolerance::Ppm(10.0),
        }
    }
}

/// A complete deconvolution configuration. The variant selects the algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "algorithm", rename_all = "kebab-case")
)]
pub enum DeconvolutionParameters {
    Classic(ClassicDeconvolutionParameters),
    LogClustering(LogClusteringParameters),
    #[cfg_attr(feature = "serde", serde(rename = "isodec"))]
    IsoDec(IsoDecParameters),
    Spectral(SpectralDeconvolutionParameters),
}

impl Default for DeconvolutionParameters {
    fn default() -> Self {
        Self::Classic(ClassicDeconvolutionParameters::default())
    }
}

impl From<ClassicDeconvolutionParameters> for DeconvolutionParameters {
    fn from(value: ClassicDeconvolutionParameters) -> Self {
        Self::Classic(value)
    }
}

impl From<LogClusteringParameters> for DeconvolutionParameters {
    fn from(value: LogClusteringParameters) -> Self {
        Self::LogClustering(value)
    }
}

impl From<IsoDecParameters> for DeconvolutionParameters {
    fn from(value: IsoDecParameters) -> Self {
        Self::IsoDec(value)
    }
}

impl From<SpectralDeconvolutionParameters> for DeconvolutionParameters {
    fn from(value: SpectralDeconvolutionParameters) -> Self {
        Self::Spectral(value)
    }
}

impl DeconvolutionParameters {
    /// The default parameters of a given algorithm
    pub fn default_for(algorithm: DeconvolutionType) -> Self {
        match algorithm {
            DeconvolutionType::Classic => ClassicDeconvolutionParameters::default().into(),
            DeconvolutionType::LogClustering => LogClusteringParameters::default().into(),
            DeconvolutionType::IsoDec => IsoDecParameters::default().into(),
            DeconvolutionType::Spectral => SpectralDeconvolutionParameters::default().into(),
        }
    }

    pub fn algorithm(&self) -> DeconvolutionType {
        match self {
            Self::Classic(_) => DeconvolutionType::Classic,
            Self::LogClustering(_) => DeconvolutionType::LogClustering,
            Self::IsoDec(_) => DeconvolutionType::IsoDec,
            Self::Spectral(_) => DeconvolutionType::Spectral,
        }
    }

    pub fn min_charge(&self) -> i32 {
        match self {
            Self::Classic(p) => p.min_charge,
            Self::LogClustering(p) => p.min_charge,
            Self::IsoDec(p) => p.min_charge,
            Self::Spectral(p) => p.min_charge,
        }
    }

    pub fn max_charge(&self) -> i32 {
        match self {
            Self::Classic(p) => p.max_charge,
            Self::LogClustering(p) => p.max_charge,
            Self::IsoDec(p) => p.max_charge,
            Self::Spectral(p) => p.max_charge,
        }
    }

    pub fn charge_range(&self) -> ChargeRange {
        (self.min_charge(), self.max_charge())
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::Classic(p) => p.polarity,
            Self::LogClustering(p) => p.polarity,
            Self::IsoDec(p) => p.polarity,
            Self::Spectral(p) => p.polarity,
        }
    }

    /// Set the polarity, flipping the sign of signed charge bounds to match
    pub fn set_polarity(&mut self, polarity: Polarity) {
        macro_rules! flip {
            ($p:expr) => {{
                $p.polarity = polarity;
                $p.min_charge = polarity.signed($p.min_charge);
                $p.max_charge = polarity.signed($p.max_charge);
            }};
        }
        match self {
            Self::Classic(p) => flip!(p),
            Self::LogClustering(p) => flip!(p),
            Self::IsoDec(p) => flip!(p),
            Self::Spectral(p) => flip!(p),
        }
    }

    /// Set both charge bounds, keeping the configured polarity
    pub fn set_charge_range(&mut self, min_charge: i32, max_charge: i32) {
        macro_rules! set {
            ($p:expr) => {{
                $p.min_charge = min_charge;
                $p.max_charge = max_charge;
            }};
        }
        match self {
            Self::Classic(p) => set!(p),
            Self::LogClustering(p) => set!(p),
            Self::IsoDec(p) => set!(p),
            Self::Spectral(p) => set!(p),
        }
    }

    /// Check every parameter value, failing with a [`DeconvolutionError::ConfigurationError`]
    /// describing the first problem found
    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        match self {
            Self::Classic(p) => p.validate(),
            Self::LogClustering(p) => p.validate(),
            Self::IsoDec(p) => p.validate(),
            Self::Spectral(p) => {
                validate_charge_range(p.min_charge, p.max_charge, p.polarity)?;
                p.tolerance.validate()
            }
        }
    }
}

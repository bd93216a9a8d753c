//! The single entry point that runs whichever algorithm a set of parameters selects
use tracing::{debug, warn};

use crate::classic::ClassicDeconvolutionAlgorithm;
use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
use crate::envelope::IsotopicEnvelope;
use crate::isodec::IsoDecAlgorithm;
use crate::isotopic_model::{isclose, mass_to_mz};
use crate::log_clustering::LogClusteringAlgorithm;
use crate::params::{DeconvolutionParameters, DeconvolutionType};
use crate::scan::Scan;
use crate::spectrum::{MzPeak, NeutralMassSpectrum, Spectrum};
use crate::tolerance::MzRange;

/// Relative monoisotopic mass difference under which two envelopes sharing a
/// peak are the same envelope
const DUPLICATE_MASS_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
enum AlgorithmDispatch {
    Classic(ClassicDeconvolutionAlgorithm),
    LogClustering(LogClusteringAlgorithm),
    IsoDec(IsoDecAlgorithm),
    Spectral,
}

/// Runs the algorithm selected by a [`DeconvolutionParameters`] variant.
///
/// Parameters are validated once on construction and the selected algorithm is built
/// then, so the averagine tables it needs are ready before the first spectrum. A
/// `Deconvoluter` holds no mutable state and may be shared across threads.
///
/// ```
/// use mzdeconvolute::prelude::*;
///
/// let spectrum = Spectrum::new(vec![500.0, 500.5, 501.0], vec![100.0, 80.0, 30.0]).unwrap();
/// let deconvoluter = Deconvoluter::new(DeconvolutionParameters::default()).unwrap();
/// let envelopes = deconvoluter.deconvolute(&spectrum, None).unwrap();
/// for envelope in envelopes.iter() {
///     assert!(envelope.charge != 0);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Deconvoluter {
    params: DeconvolutionParameters,
    algorithm: AlgorithmDispatch,
}

impl Deconvoluter {
    /// # Errors
    /// [`DeconvolutionError::ConfigurationError`] if `params` fails validation.
    pub fn new(params: DeconvolutionParameters) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        let algorithm = match params {
            DeconvolutionParameters::Classic(p) => {
                AlgorithmDispatch::Classic(ClassicDeconvolutionAlgorithm::new(p)?)
            }
            DeconvolutionParameters::LogClustering(p) => {
                AlgorithmDispatch::LogClustering(LogClusteringAlgorithm::new(p)?)
            }
            DeconvolutionParameters::IsoDec(p) => {
                AlgorithmDispatch::IsoDec(IsoDecAlgorithm::new(p)?)
            }
            DeconvolutionParameters::Spectral(_) => AlgorithmDispatch::Spectral,
        };
        Ok(Self { params, algorithm })
    }

    /// Build a deconvoluter running `name`'s algorithm with its default parameters
    ///
    /// # Errors
    /// [`DeconvolutionError::UnsupportedAlgorithm`] if `name` is not an algorithm.
    pub fn from_algorithm_name(name: &str) -> Result<Self, DeconvolutionError> {
        let algorithm: DeconvolutionType = name.parse()?;
        Self::new(DeconvolutionParameters::default_for(algorithm))
    }

    pub fn params(&self) -> &DeconvolutionParameters {
        &self.params
    }

    pub fn algorithm_type(&self) -> DeconvolutionType {
        self.params.algorithm()
    }

    /// The selected algorithm
    ///
    /// # Errors
    /// [`DeconvolutionError::NotImplemented`] for an algorithm that is reserved
    /// but not available.
    pub fn algorithm(&self) -> Result<&dyn DeconvolutionAlgorithm, DeconvolutionError> {
        match &self.algorithm {
            AlgorithmDispatch::Classic(a) => Ok(a),
            AlgorithmDispatch::LogClustering(a) => Ok(a),
            AlgorithmDispatch::IsoDec(a) => Ok(a),
            AlgorithmDispatch::Spectral => {
                Err(DeconvolutionError::NotImplemented(DeconvolutionType::Spectral))
            }
        }
    }

    /// Deconvolve `spectrum`, considering only the peaks inside `mz_range` when one
    /// is given.
    ///
    /// The range is applied to the input peaks before the algorithm runs, so peaks
    /// outside it never join an envelope. Envelopes come back in the order the
    /// algorithm produces them, with duplicates removed (see [`is_duplicate_envelope`]).
    pub fn deconvolute(
        &self,
        spectrum: &Spectrum,
        mz_range: Option<MzRange>,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        let algorithm = self.algorithm()?;
        let filtered;
        let spectrum = match mz_range {
            Some(range) => {
                check_range(&range)?;
                filtered = spectrum.filtered_to_range(&range);
                &filtered
            }
            None => spectrum,
        };
        if spectrum.is_empty() {
            return Ok(Vec::new());
        }
        let envelopes = algorithm.deconvolute(spectrum);
        let n = envelopes.len();
        let envelopes = deduplicate_envelopes(envelopes);
        debug!(
            "{} produced {} envelopes ({} duplicates) from {} peaks",
            algorithm.algorithm(),
            envelopes.len(),
            n - envelopes.len(),
            spectrum.len()
        );
        Ok(envelopes)
    }

    /// Deconvolve the envelopes of `spectrum` whose most abundant peak lies inside
    /// `seed_range`.
    ///
    /// Unlike [`Deconvoluter::deconvolute`] the rest of the spectrum stays visible, so
    /// an envelope seeded inside the range may take isotopes or other charge states
    /// from outside it. Strategies that have no notion of a seed peak see only the
    /// peaks inside the range.
    pub fn deconvolute_around(
        &self,
        spectrum: &Spectrum,
        seed_range: MzRange,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        check_range(&seed_range)?;
        let algorithm = self.algorithm()?;
        if spectrum.is_empty() {
            return Ok(Vec::new());
        }
        let envelopes = algorithm.deconvolute_seeded(spectrum, &seed_range);
        let n = envelopes.len();
        let envelopes = deduplicate_envelopes(envelopes);
        debug!(
            "{} produced {} envelopes ({} duplicates) seeded in {}",
            algorithm.algorithm(),
            envelopes.len(),
            n - envelopes.len(),
            seed_range
        );
        Ok(envelopes)
    }

    /// Deconvolve the spectrum of `scan`. Identical to calling [`Deconvoluter::deconvolute`]
    /// on [`Scan::spectrum`].
    pub fn deconvolute_scan(
        &self,
        scan: &Scan,
        mz_range: Option<MzRange>,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        self.deconvolute(&scan.spectrum, mz_range)
    }

    /// Wrap each peak of an already charge-assigned spectrum in an envelope of its
    /// own, keeping those whose m/z at their charge lies inside `mz_range`.
    ///
    /// No algorithm runs, but the configuration must still be valid. Peaks without
    /// a charge, which only deserialized spectra can carry, are skipped.
    pub fn deconvolute_neutral_mass_spectrum(
        &self,
        spectrum: &NeutralMassSpectrum,
        mz_range: Option<MzRange>,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        if let Some(range) = mz_range.as_ref() {
            check_range(range)?;
        }
        let algorithm = self.algorithm_type();
        let mut skipped = 0usize;
        let envelopes = spectrum
            .iter()
            .filter_map(|peak| {
                if peak.charge == 0 {
                    skipped += 1;
                    return None;
                }
                let mz = mass_to_mz(peak.neutral_mass, peak.charge);
                if !mz_range.map_or(true, |r| r.contains(mz)) {
                    return None;
                }
                Some(IsotopicEnvelope::new(
                    peak.neutral_mass,
                    peak.neutral_mass,
                    peak.charge,
                    vec![MzPeak::new(mz, peak.intensity)],
                    peak.intensity,
                    algorithm,
                ))
            })
            .collect();
        if skipped > 0 {
            warn!("Skipped {skipped} neutral mass peaks without a charge");
        }
        Ok(envelopes)
    }
}

fn check_range(range: &MzRange) -> Result<(), DeconvolutionError> {
    if range.min > range.max || range.min.is_nan() || range.max.is_nan() {
        Err(DeconvolutionError::ConfigurationError(format!(
            "Invalid m/z range {range}"
        )))
    } else {
        Ok(())
    }
}

/// Whether two envelopes describe the same species: equal charge, the same
/// monoisotopic mass and at least one input peak in common
pub fn is_duplicate_envelope(a: &IsotopicEnvelope, b: &IsotopicEnvelope) -> bool {
    a.charge == b.charge
        && isclose(
            a.monoisotopic_mass,
            b.monoisotopic_mass,
            a.monoisotopic_mass.abs().max(1.0) * DUPLICATE_MASS_TOLERANCE,
        )
        && a.shares_peaks_with(b)
}

/// Drop every envelope that duplicates one earlier in the list
pub fn deduplicate_envelopes(envelopes: Vec<IsotopicEnvelope>) -> Vec<IsotopicEnvelope> {
    let mut kept: Vec<IsotopicEnvelope> = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        if !kept.iter().any(|k| is_duplicate_envelope(k, &envelope)) {
            kept.push(envelope);
        }
    }
    kept
}

/// Deconvolve a spectrum or scan in one call.
///
/// This builds a [`Deconvoluter`] for `params` and calls [`Deconvoluter::deconvolute`].
/// Prefer holding a [`Deconvoluter`] when processing many spectra with the same
/// parameters so validation happens once.
pub fn deconvolute<S: AsRef<Spectrum>>(
    input: &S,
    params: &DeconvolutionParameters,
    mz_range: Option<MzRange>,
) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
    Deconvoluter::new(*params)?.deconvolute(input.as_ref(), mz_range)
}

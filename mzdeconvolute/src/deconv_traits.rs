/*! Traits and errors shared by all deconvolution strategies */
use thiserror::Error;

use crate::envelope::IsotopicEnvelope;
use crate::params::DeconvolutionType;
use crate::spectrum::Spectrum;
use crate::tolerance::MzRange;

/// An error that might occur while configuring or running deconvolution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvolutionError {
    /// A parameter value or parameter/algorithm pairing is invalid
    #[error("Invalid deconvolution configuration: {0}")]
    ConfigurationError(String),
    /// The parallel arrays a spectrum was built from disagree in length
    #[error(
        "Peak arrays differ in length: {mz} m/z values, {intensity} intensities, {} charges",
        .charge.map(|c| c.to_string()).unwrap_or_else(|| "no".to_string())
    )]
    InputShapeError {
        mz: usize,
        intensity: usize,
        charge: Option<usize>,
    },
    /// The algorithm is recognized but has no implementation
    #[error("The {0} deconvolution algorithm is not implemented")]
    NotImplemented(DeconvolutionType),
    /// The algorithm tag does not name any known algorithm
    #[error("Unsupported deconvolution algorithm {0:?}")]
    UnsupportedAlgorithm(String),
}

/// The shared contract of every deconvolution strategy.
///
/// Implementations are constructed from their own parameter type and must be
/// deterministic: the same spectrum always produces the same envelopes in the
/// same order. They hold no mutable state, so a single instance may be shared
/// across threads.
pub trait DeconvolutionAlgorithm: Send + Sync {
    /// Which algorithm this is, used to tag produced envelopes
    fn algorithm(&self) -> DeconvolutionType;

    /// Find the isotopic envelopes present in `spectrum`.
    ///
    /// Every peak of `spectrum` is a candidate, range restriction happens
    /// before this is called.
    fn deconvolute(&self, spectrum: &Spectrum) -> Vec<IsotopicEnvelope>;

    /// Find the envelopes whose most abundant peak lies inside `seed_range`.
    ///
    /// Strategies that search outward from a seed peak may use peaks of `spectrum`
    /// outside `seed_range` to complete an envelope or corroborate its charge. The
    /// default restricts `spectrum` to `seed_range` and calls
    /// [`DeconvolutionAlgorithm::deconvolute`].
    fn deconvolute_seeded(
        &self,
        spectrum: &Spectrum,
        seed_range: &MzRange,
    ) -> Vec<IsotopicEnvelope> {
        self.deconvolute(&spectrum.filtered_to_range(seed_range))
    }
}

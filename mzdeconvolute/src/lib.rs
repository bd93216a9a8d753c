//! Recover neutral masses and charge states from centroided mass spectra.
//!
//! Three strategies share one contract, [`DeconvolutionAlgorithm`]:
//! - [`classic`]: averagine envelope matching seeded on intense peaks
//! - [`log_clustering`]: charge ladder detection in log m/z space
//! - [`isodec`]: isotope pattern template matching
//!
//! The variant of [`DeconvolutionParameters`] selects the strategy, and
//! [`Deconvoluter`] runs it with optional m/z range restriction and duplicate removal.
pub mod charge;
pub mod deconv_traits;
pub mod envelope;
pub mod isotopic_model;
pub mod params;
pub mod scorer;
pub mod spectrum;
pub mod tolerance;

pub mod classic;
pub mod isodec;
pub mod log_clustering;

pub mod deconvoluter;
pub mod scan;

pub use crate::charge::Polarity;
pub use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
pub use crate::deconvoluter::{deconvolute, Deconvoluter};
pub use crate::envelope::IsotopicEnvelope;
pub use crate::params::{
    ClassicDeconvolutionParameters, DeconvolutionParameters, DeconvolutionType,
    IsoDecParameters, LogClusteringParameters, SpectralDeconvolutionParameters,
};
pub use crate::scan::{IsolationWindow, Scan};
pub use crate::spectrum::{MzPeak, NeutralMassSpectrum, Spectrum};
pub use crate::tolerance::{MzRange, Tolerance};

pub mod prelude {
    pub use crate::charge::Polarity;
    pub use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
    pub use crate::deconvoluter::{deconvolute, Deconvoluter};
    pub use crate::envelope::IsotopicEnvelope;
    pub use crate::params::{DeconvolutionParameters, DeconvolutionType};
    pub use crate::spectrum::{MzPeak, Spectrum};
    pub use crate::tolerance::{MzRange, Tolerance};
}

//! Scans, precursor selection metadata and tools for evaluating isolation windows
use crate::charge::Polarity;
use crate::deconv_traits::DeconvolutionError;
use crate::deconvoluter::Deconvoluter;
use crate::envelope::IsotopicEnvelope;
use crate::params::DeconvolutionParameters;
use crate::spectrum::Spectrum;
use crate::tolerance::MzRange;

/// How far beyond an isolation window an isotopic envelope overlapping it may extend
pub const ISOLATION_MARGIN: f64 = 8.5;

/// The m/z interval selected for fragmentation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsolationWindow {
    pub target: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl IsolationWindow {
    /// A window of total width `width` centered on `target`
    pub fn around(target: f64, width: f64) -> Self {
        Self {
            target,
            lower_bound: target - width / 2.0,
            upper_bound: target + width / 2.0,
        }
    }

    pub fn from_bounds(lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            target: (lower_bound + upper_bound) / 2.0,
            lower_bound,
            upper_bound,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    pub fn contains(&self, mz: f64) -> bool {
        self.lower_bound <= mz && mz <= self.upper_bound
    }

    pub fn range(&self) -> MzRange {
        MzRange::new(self.lower_bound, self.upper_bound)
    }
}

/// The ion selected from a precursor spectrum
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectedIon {
    pub mz: f64,
    pub intensity: Option<f64>,
    pub charge: Option<i32>,
}

/// A spectrum and the acquisition metadata needed to interpret it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    pub index: usize,
    pub ms_level: u8,
    pub polarity: Polarity,
    pub spectrum: Spectrum,
    pub selected_ion: Option<SelectedIon>,
    pub isolation_window: Option<IsolationWindow>,
}

impl Scan {
    pub fn new(index: usize, ms_level: u8, polarity: Polarity, spectrum: Spectrum) -> Self {
        Self {
            index,
            ms_level,
            polarity,
            spectrum,
            selected_ion: None,
            isolation_window: None,
        }
    }

    /// Record the selected ion. A charge guess whose sign disagrees with the scan's
    /// polarity is flipped to match.
    pub fn with_selected_ion(
        mut self,
        mz: f64,
        intensity: Option<f64>,
        charge: Option<i32>,
    ) -> Self {
        let charge = charge.map(|z| self.polarity.signed(z));
        self.selected_ion = Some(SelectedIon {
            mz,
            intensity,
            charge,
        });
        self
    }

    /// Record an isolation window of total width `width` around `target`
    pub fn with_isolation(mut self, target: f64, width: f64) -> Self {
        self.isolation_window = Some(IsolationWindow::around(target, width));
        self
    }

    pub fn isolation_range(&self) -> Option<MzRange> {
        self.isolation_window.map(|w| w.range())
    }

    /// Snap the selected ion to the closest peak of `precursor_spectrum`, taking
    /// its m/z and intensity
    pub fn refine_selected_ion(
        &mut self,
        precursor_spectrum: &Spectrum,
    ) -> Result<(), DeconvolutionError> {
        let Some(ion) = self.selected_ion.as_mut() else {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "Scan {} has no selected ion to refine",
                self.index
            )));
        };
        let Some(peak) = precursor_spectrum.closest_peak(ion.mz) else {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "Cannot refine the selected ion of scan {} against an empty spectrum",
                self.index
            )));
        };
        ion.mz = peak.mz;
        ion.intensity = Some(peak.intensity);
        Ok(())
    }

    /// Deconvolve `precursor_spectrum` around this scan's isolation window and keep
    /// the envelopes with at least one peak inside the window.
    ///
    /// Envelopes are seeded from the window widened by [`ISOLATION_MARGIN`] on both
    /// sides, and draw their isotopes and other charge states from the whole
    /// precursor spectrum (see [`Deconvoluter::deconvolute_around`]). A scan without
    /// an isolation window yields nothing.
    pub fn isolated_masses_and_charges(
        &self,
        precursor_spectrum: &Spectrum,
        params: &DeconvolutionParameters,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        let Some(window) = self.isolation_window else {
            return Ok(Vec::new());
        };
        let deconvoluter = Deconvoluter::new(*params)?;
        let search_range = window.range().widen(ISOLATION_MARGIN);
        let envelopes = deconvoluter.deconvolute_around(precursor_spectrum, search_range)?;
        Ok(envelopes
            .into_iter()
            .filter(|e| e.peaks.iter().any(|p| window.contains(p.mz)))
            .collect())
    }

    /// As [`Scan::isolated_masses_and_charges`] with the spectrum of a precursor scan
    pub fn isolated_masses_and_charges_from_scan(
        &self,
        precursor_scan: &Scan,
        params: &DeconvolutionParameters,
    ) -> Result<Vec<IsotopicEnvelope>, DeconvolutionError> {
        self.isolated_masses_and_charges(&precursor_scan.spectrum, params)
    }
}

impl AsRef<Spectrum> for Scan {
    fn as_ref(&self) -> &Spectrum {
        &self.spectrum
    }
}

/// A precursor ion co-isolated in an isolation window
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub struct Coisolation {
    /// The estimated neutral mass of the ion
    pub neutral_mass: f64,
    /// The total intensity of the ion's isotopic pattern
    pub intensity: f64,
    pub charge: i32,
}

impl Coisolation {
    pub fn new(neutral_mass: f64, intensity: f64, charge: i32) -> Self {
        Self {
            neutral_mass,
            intensity,
            charge,
        }
    }
}

/// An estimator of precursor selection purity
#[derive(Debug, Clone)]
pub struct PrecursorPurityEstimator {
    /// How far below the lower bound of the isolation window to search for
    /// co-isolating envelopes
    pub lower_extension: f64,
    /// The half width assumed for an isolation window when none is known
    pub default_width: f64,
}

impl Default for PrecursorPurityEstimator {
    fn default() -> Self {
        Self {
            lower_extension: 1.5,
            default_width: 1.5,
        }
    }
}

impl PrecursorPurityEstimator {
    pub fn new(lower_extension: f64, default_width: f64) -> Self {
        Self {
            lower_extension,
            default_width,
        }
    }

    fn infer_isolation_interval(
        &self,
        precursor: &IsotopicEnvelope,
        isolation_window: Option<&IsolationWindow>,
    ) -> MzRange {
        match isolation_window {
            Some(window) if window.lower_bound > 0.0 => window.range(),
            _ => {
                let mz = precursor.monoisotopic_mz();
                MzRange::new(mz - self.default_width, mz + self.default_width)
            }
        }
    }

    /// Find the other envelopes whose monoisotopic m/z falls in the isolation window
    /// of `precursor`, extended downwards by `lower_extension`.
    ///
    /// Envelopes less intense than `relative_intensity_threshold` times the precursor's
    /// intensity are ignored, as are singly charged ones if `ignore_singly_charged`.
    pub fn coisolation(
        &self,
        envelopes: &[IsotopicEnvelope],
        precursor: &IsotopicEnvelope,
        isolation_window: Option<&IsolationWindow>,
        relative_intensity_threshold: f64,
        ignore_singly_charged: bool,
    ) -> Vec<Coisolation> {
        let window = self.infer_isolation_interval(precursor, isolation_window);
        let window = MzRange::new(window.min - self.lower_extension, window.max);
        let intensity_threshold = precursor.total_intensity * relative_intensity_threshold;
        envelopes
            .iter()
            .filter(|e| {
                window.contains(e.monoisotopic_mz())
                    && e.total_intensity > intensity_threshold
                    && *e != precursor
                    && (!ignore_singly_charged || e.charge.abs() > 1)
            })
            .map(|e| Coisolation::new(e.monoisotopic_mass, e.total_intensity, e.charge))
            .collect()
    }

    /// The fraction of the signal in the isolation window that the precursor's
    /// envelope accounts for. An empty window has a purity of zero.
    pub fn precursor_purity(
        &self,
        spectrum: &Spectrum,
        precursor: &IsotopicEnvelope,
        isolation_window: Option<&IsolationWindow>,
    ) -> f64 {
        let window = self.infer_isolation_interval(precursor, isolation_window);
        let assigned: f64 = precursor
            .peaks
            .iter()
            .filter(|p| window.contains(p.mz))
            .map(|p| p.intensity)
            .sum();
        let total: f64 = spectrum
            .extract(window.min, window.max)
            .map(|p| p.intensity)
            .sum();
        if total == 0.0 {
            0.0
        } else {
            assigned / total
        }
    }
}

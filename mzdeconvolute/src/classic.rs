//! Averagine envelope matching.
//!
//! Every sufficiently intense peak is assumed in turn to be the most abundant isotope of
//! some species. For each charge state its neighbors suggest, the closest averagine
//! distribution is aligned on it and the remaining isotopes are looked up from most to
//! least abundant until one is missing or has an implausible intensity. Other charge
//! states of the same mass corroborate a fit, and the monoisotopic mass is refined by
//! the median of the estimates every matched peak implies.
use std::collections::BTreeSet;
use std::ops::Range;

use tracing::{debug, trace};

use crate::charge::{candidate_charges_from_spacing, Polarity};
use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
use crate::envelope::IsotopicEnvelope;
use crate::isotopic_model::{
    averagine_table, mass_to_mz, mz_to_mass, AveragineEntry, AveragineTable,
};
use crate::params::{ClassicDeconvolutionParameters, DeconvolutionParameters, DeconvolutionType};
use crate::spectrum::{descending_intensity, MzPeak, Spectrum};
use crate::tolerance::MzRange;

/// Seeds more than this many times less intense than the base peak are skipped
const SEED_INTENSITY_FACTOR: f64 = 100.0;

/// Score an envelope from its summed intensity, the spread of its theoretical to
/// observed intensity ratios and its charge.
///
/// Envelopes of fewer than two peaks score zero. A zero or undefined spread is clamped
/// to the smallest positive value so perfectly proportional envelopes stay finite.
pub fn envelope_score(total_intensity: f64, ratios: &[f64], charge: i32) -> f64 {
    let n = ratios.len();
    if n < 2 {
        return 0.0;
    }
    let mean = ratios.iter().sum::<f64>() / n as f64;
    let variance = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let mut spread = variance.sqrt();
    if !(spread > 0.0) {
        spread = f64::MIN_POSITIVE;
    }
    total_intensity / spread.powf(0.13) * (n as f64).powf(0.4)
        / (charge.abs() as f64).powf(0.06)
}

/// Whether a second peak's intensity is within `ratio_limit`-fold of what the first
/// peak and the theoretical abundances predict for it
fn satisfies_ratio(
    theoretical_first: f64,
    theoretical_second: f64,
    observed_first: f64,
    observed_second: f64,
    ratio_limit: f64,
) -> bool {
    let expected = observed_first / theoretical_first * theoretical_second;
    !(observed_second < expected / ratio_limit || observed_second > expected * ratio_limit)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// The peaks of `span` at least 1/[`SEED_INTENSITY_FACTOR`] as intense as the most
/// intense peak of `span`, most intense first. Equal intensities keep m/z order.
fn select_seeds(spectrum: &Spectrum, span: Range<usize>) -> Vec<usize> {
    let max_intensity = span
        .clone()
        .map(|i| spectrum.intensity(i))
        .fold(0.0, f64::max);
    let mut seeds: Vec<usize> = span
        .filter(|i| spectrum.intensity(*i) * SEED_INTENSITY_FACTOR >= max_intensity)
        .collect();
    seeds.sort_by(|a, b| {
        descending_intensity(spectrum.intensity(*a), spectrum.intensity(*b)).then(a.cmp(b))
    });
    seeds
}

#[derive(Debug, Clone)]
struct EnvelopeFit {
    peaks: Vec<usize>,
    monoisotopic_mass: f64,
    most_abundant_mass: f64,
    charge: i32,
    total_intensity: f64,
    score: f64,
}

impl EnvelopeFit {
    /// Whether this fit should replace `incumbent` as the best for its seed. A higher
    /// score wins, and equal scores go to the lower charge magnitude.
    fn is_better_than(&self, incumbent: Option<&EnvelopeFit>) -> bool {
        match incumbent {
            None => true,
            Some(other) => match self.score.total_cmp(&other.score) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => self.charge.abs() < other.charge.abs(),
            },
        }
    }

    fn into_envelope(self, spectrum: &Spectrum) -> IsotopicEnvelope {
        let peaks: Vec<MzPeak> = self.peaks.iter().filter_map(|i| spectrum.get(*i)).collect();
        IsotopicEnvelope::new(
            self.monoisotopic_mass,
            self.most_abundant_mass,
            self.charge,
            peaks,
            self.score,
            DeconvolutionType::Classic,
        )
    }
}

/// The per-spectrum search state
struct ClassicSearch<'a> {
    spectrum: &'a Spectrum,
    table: &'a AveragineTable,
    params: &'a ClassicDeconvolutionParameters,
}

impl ClassicSearch<'_> {
    /// Align `entry` so that its most abundant isotope sits on the peak at `seed_index`
    /// with `charge`, then collect the other isotopes in abundance order, stopping at
    /// the first one not found. Each matched peak contributes a monoisotopic mass
    /// estimate to `predictions`.
    fn find_isotopic_envelope(
        &self,
        entry: &AveragineEntry,
        seed_index: usize,
        seed_mass: f64,
        charge: i32,
        predictions: &mut Vec<f64>,
    ) -> EnvelopeFit {
        let seed_intensity = self.spectrum.intensity(seed_index);
        let mut by_abundance = entry.by_abundance();
        let apex = by_abundance.next().copied();
        let mut peaks = vec![seed_index];
        let mut ratios = Vec::new();
        let mut total_intensity = seed_intensity;
        let monoisotopic_mass = seed_mass - entry.diff_to_monoisotopic();
        predictions.push(monoisotopic_mass);

        if let Some(apex) = apex {
            ratios.push(apex.abundance / seed_intensity);
            let shift = seed_mass - apex.mass;
            for isotope in by_abundance {
                let expected_mass = isotope.mass + shift;
                let Some(index) = self
                    .spectrum
                    .closest_peak_index(mass_to_mz(expected_mass, charge))
                else {
                    break;
                };
                let observed_mass = mz_to_mass(self.spectrum.mz(index), charge);
                let observed_intensity = self.spectrum.intensity(index);
                if self.params.tolerance.within(observed_mass, expected_mass)
                    && satisfies_ratio(
                        apex.abundance,
                        isotope.abundance,
                        seed_intensity,
                        observed_intensity,
                        self.params.intensity_ratio_limit,
                    )
                    && !peaks.contains(&index)
                {
                    peaks.push(index);
                    total_intensity += observed_intensity;
                    ratios.push(isotope.abundance / observed_intensity);
                    predictions.push(monoisotopic_mass + observed_mass - expected_mass);
                } else {
                    break;
                }
            }
        }

        let score = envelope_score(total_intensity, &ratios, charge);
        EnvelopeFit {
            peaks,
            monoisotopic_mass,
            most_abundant_mass: seed_mass,
            charge,
            total_intensity,
            score,
        }
    }

    /// Look for the species of `fit` at charge `charge`, adding the score of what is
    /// found to `fit`. Returns whether that charge state was observed.
    fn find_charge_state_of_mass(
        &self,
        fit: &mut EnvelopeFit,
        entry: &AveragineEntry,
        most_abundant_mass: f64,
        charge: i32,
        predictions: &mut Vec<f64>,
    ) -> bool {
        let Some(index) = self
            .spectrum
            .closest_peak_index(mass_to_mz(most_abundant_mass, charge))
        else {
            return false;
        };
        let observed_mass = mz_to_mass(self.spectrum.mz(index), charge);
        if !self.params.tolerance.within(observed_mass, most_abundant_mass) {
            return false;
        }
        let test = self.find_isotopic_envelope(entry, index, observed_mass, charge, predictions);
        if test.score != 0.0 {
            fit.score += test.score;
            true
        } else {
            predictions.pop();
            false
        }
    }

    /// Count the contiguous run of charge states below and above `fit`'s charge at
    /// which its mass is also observed
    fn observe_adjacent_charge_states(
        &self,
        fit: &mut EnvelopeFit,
        entry: &AveragineEntry,
        predictions: &mut Vec<f64>,
    ) -> usize {
        let polarity = Polarity::of_charge(fit.charge).unwrap_or_default();
        let low = self.params.min_charge.abs().min(self.params.max_charge.abs());
        let high = self.params.min_charge.abs().max(self.params.max_charge.abs());
        let z = fit.charge.abs();
        let most_abundant_mass = fit.most_abundant_mass;
        let mut observed = 0;
        for lower in (low..z).rev() {
            if self.find_charge_state_of_mass(
                fit,
                entry,
                most_abundant_mass,
                polarity.signed(lower),
                predictions,
            ) {
                observed += 1;
            } else {
                break;
            }
        }
        for higher in (z + 1)..=high {
            if self.find_charge_state_of_mass(
                fit,
                entry,
                most_abundant_mass,
                polarity.signed(higher),
                predictions,
            ) {
                observed += 1;
            } else {
                break;
            }
        }
        observed
    }

    /// The best scoring envelope with the peak at `seed_index` as its most abundant
    /// isotope, if any charge state fits
    fn best_fit_for_seed(&self, seed_index: usize) -> Option<EnvelopeFit> {
        let charges = candidate_charges_from_spacing(
            self.spectrum,
            seed_index,
            (self.params.min_charge, self.params.max_charge),
            self.params.polarity,
        );
        let seed_mz = self.spectrum.mz(seed_index);
        let mut best: Option<EnvelopeFit> = None;
        for charge in charges {
            let seed_mass = mz_to_mass(seed_mz, charge);
            let Some(entry) = self
                .table
                .closest_by_most_abundant(seed_mass)
                .and_then(|i| self.table.get(i))
            else {
                continue;
            };
            let mut predictions = Vec::new();
            let mut fit = self.find_isotopic_envelope(
                entry,
                seed_index,
                seed_mass,
                charge,
                &mut predictions,
            );
            if fit.peaks.len() < self.params.min_peaks {
                continue;
            }
            let num_other_charges =
                self.observe_adjacent_charge_states(&mut fit, entry, &mut predictions);
            if fit.is_better_than(best.as_ref())
                && (charge.abs() / 5) as usize <= num_other_charges
            {
                if let Some(mass) = median(&predictions) {
                    fit.monoisotopic_mass = mass;
                }
                trace!(
                    "Seed {seed_mz:0.4} fits charge {charge} with score {:0.3} and {} other \
                     charge states",
                    fit.score,
                    num_other_charges
                );
                best = Some(fit);
            }
        }
        best
    }

    /// Fit every seed drawn from `seed_span`. Isotopes and other charge states are
    /// looked up across the whole spectrum.
    fn run(&self, seed_span: Range<usize>) -> Vec<EnvelopeFit> {
        let seeds = select_seeds(self.spectrum, seed_span);

        let fits: Vec<EnvelopeFit> = seeds
            .iter()
            .filter_map(|seed| self.best_fit_for_seed(*seed))
            .collect();

        let mut by_score: Vec<usize> = (0..fits.len()).collect();
        by_score.sort_by(|a, b| fits[*b].score.total_cmp(&fits[*a].score).then(a.cmp(b)));
        let mut seen = BTreeSet::new();
        let mut keep = vec![false; fits.len()];
        for i in by_score {
            let fit = &fits[i];
            if fit.peaks.iter().any(|p| seen.contains(p)) {
                continue;
            }
            seen.extend(fit.peaks.iter().copied());
            keep[i] = true;
        }
        debug!(
            "Retained {} of {} seed envelopes from {} seeds",
            keep.iter().filter(|k| **k).count(),
            fits.len(),
            seeds.len()
        );
        fits.into_iter()
            .zip(keep)
            .filter_map(|(fit, keep)| keep.then_some(fit))
            .collect()
    }
}

/// Averagine envelope matching, see the [module documentation](self)
#[derive(Debug, Clone)]
pub struct ClassicDeconvolutionAlgorithm {
    params: ClassicDeconvolutionParameters,
    table: &'static AveragineTable,
}

impl ClassicDeconvolutionAlgorithm {
    pub fn new(params: ClassicDeconvolutionParameters) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        Ok(Self {
            params,
            table: averagine_table(params.isotopic_model),
        })
    }

    pub fn params(&self) -> &ClassicDeconvolutionParameters {
        &self.params
    }
}

impl TryFrom<DeconvolutionParameters> for ClassicDeconvolutionAlgorithm {
    type Error = DeconvolutionError;

    fn try_from(value: DeconvolutionParameters) -> Result<Self, Self::Error> {
        match value {
            DeconvolutionParameters::Classic(params) => Self::new(params),
            other => Err(DeconvolutionError::ConfigurationError(format!(
                "Cannot run the classic algorithm with {} parameters",
                other.algorithm()
            ))),
        }
    }
}

impl DeconvolutionAlgorithm for ClassicDeconvolutionAlgorithm {
    fn algorithm(&self) -> DeconvolutionType {
        DeconvolutionType::Classic
    }

    #[tracing::instrument(skip_all, level = "trace")]
    fn deconvolute(&self, spectrum: &Spectrum) -> Vec<IsotopicEnvelope> {
        self.search(spectrum, 0..spectrum.len())
    }

    #[tracing::instrument(skip_all, level = "trace")]
    fn deconvolute_seeded(
        &self,
        spectrum: &Spectrum,
        seed_range: &MzRange,
    ) -> Vec<IsotopicEnvelope> {
        self.search(spectrum, spectrum.extract_indices(seed_range.min, seed_range.max))
    }
}

impl ClassicDeconvolutionAlgorithm {
    fn search(&self, spectrum: &Spectrum, seed_span: Range<usize>) -> Vec<IsotopicEnvelope> {
        if seed_span.is_empty() {
            return Vec::new();
        }
        let search = ClassicSearch {
            spectrum,
            table: self.table,
            params: &self.params,
        };
        search
            .run(seed_span)
            .into_iter()
            .map(|fit| fit.into_envelope(spectrum))
            .collect()
    }
}

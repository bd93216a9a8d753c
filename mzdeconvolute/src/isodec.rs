//! Isotope pattern template matching.
//!
//! Peaks are visited from most to least intense. Each one is tried as the most
//! abundant isotope, or one of its neighbors, of the precomputed averagine template
//! closest in mass at every charge in range. The template's isotopes are looked up
//! among the peaks not yet claimed, the observed and theoretical patterns are compared
//! with an [`IsotopicPatternScorer`], and the best accepted fit claims its peaks.
use std::ops::Range;

use tracing::{debug, trace};

use crate::charge::ChargeRangeIter;
use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
use crate::envelope::IsotopicEnvelope;
use crate::isotopic_model::{
    averagine_table, mass_to_mz, mz_to_mass, AveragineEntry, AveragineTable,
};
use crate::params::{DeconvolutionParameters, DeconvolutionType, IsoDecParameters};
use crate::scorer::{IsotopicPatternScorer, ScoreType};
use crate::spectrum::{descending_intensity, MzPeak, Spectrum};
use crate::tolerance::MzRange;

/// A template aligned against the spectrum at one charge
#[derive(Debug, Clone)]
struct TemplateMatch {
    charge: i32,
    /// Matched peak indices, paired with the index of the template isotope they matched
    matched: Vec<(usize, usize)>,
    score: ScoreType,
}

struct IsoDecSearch<'a> {
    spectrum: &'a Spectrum,
    table: &'a AveragineTable,
    params: &'a IsoDecParameters,
    consumed: Vec<bool>,
}

impl IsoDecSearch<'_> {
    fn find_peak(&self, mz: f64, taken: &[(usize, usize)]) -> Option<usize> {
        let index = self.spectrum.closest_peak_index(mz)?;
        if self.consumed[index] || taken.iter().any(|(i, _)| *i == index) {
            return None;
        }
        self.params
            .tolerance
            .within(self.spectrum.mz(index), mz)
            .then_some(index)
    }

    /// Align the template isotope at `anchor` on the seed peak and match the rest
    fn align(
        &self,
        entry: &AveragineEntry,
        seed_index: usize,
        anchor: usize,
        charge: i32,
    ) -> TemplateMatch {
        let seed_mass = mz_to_mass(self.spectrum.mz(seed_index), charge);
        let shift = seed_mass - entry.isotopes[anchor].mass;
        let mut matched = Vec::with_capacity(entry.len());
        let mut experimental = Vec::with_capacity(entry.len());
        let mut theoretical = Vec::with_capacity(entry.len());
        for (j, isotope) in entry.isotopes.iter().enumerate() {
            let expected_mz = mass_to_mz(isotope.mass + shift, charge);
            theoretical.push(MzPeak::new(expected_mz, isotope.abundance));
            let found = if j == anchor {
                Some(seed_index)
            } else {
                self.find_peak(expected_mz, &matched)
            };
            match found {
                Some(index) => {
                    matched.push((index, j));
                    experimental.push(MzPeak::new(
                        self.spectrum.mz(index),
                        self.spectrum.intensity(index),
                    ));
                }
                None => experimental.push(MzPeak::new(expected_mz, 0.0)),
            }
        }
        let score = self.params.scorer.score(&experimental, &theoretical);
        TemplateMatch {
            charge,
            matched,
            score,
        }
    }

    fn best_match_for_seed(
        &self,
        seed_index: usize,
    ) -> Option<(TemplateMatch, &AveragineEntry)> {
        let seed_mz = self.spectrum.mz(seed_index);
        let mut best: Option<(TemplateMatch, &AveragineEntry)> = None;
        let charges = ChargeRangeIter::new(
            self.params.min_charge,
            self.params.max_charge,
            self.params.polarity,
        );
        for charge in charges {
            let Some(entry) = self
                .table
                .closest_by_most_abundant(mz_to_mass(seed_mz, charge))
                .and_then(|i| self.table.get(i))
            else {
                continue;
            };
            let apex = entry.most_abundant_index();
            let mut anchors = vec![apex];
            if self.params.check_off_by_one {
                if apex > 0 {
                    anchors.push(apex - 1);
                }
                if apex + 1 < entry.len() {
                    anchors.push(apex + 1);
                }
            }
            for anchor in anchors {
                let fit = self.align(entry, seed_index, anchor, charge);
                if fit.matched.len() < self.params.min_peaks || fit.score < self.params.min_score {
                    continue;
                }
                if best.as_ref().map_or(true, |(b, _)| fit.score > b.score) {
                    best = Some((fit, entry));
                }
            }
        }
        best
    }

    fn to_envelope(
        &self,
        fit: &TemplateMatch,
        entry: &AveragineEntry,
    ) -> Option<IsotopicEnvelope> {
        let mut weighted = 0.0;
        let mut weight = 0.0;
        let mut apex: Option<(usize, f64)> = None;
        for (index, j) in fit.matched.iter() {
            let intensity = self.spectrum.intensity(*index);
            let observed_mass = mz_to_mass(self.spectrum.mz(*index), fit.charge);
            let offset = entry.isotopes[*j].mass - entry.monoisotopic_mass;
            weighted += (observed_mass - offset) * intensity;
            weight += intensity;
            if apex.map_or(true, |(_, best)| intensity > best) {
                apex = Some((*index, intensity));
            }
        }
        let (apex_index, _) = apex?;
        let monoisotopic_mass = if weight > 0.0 {
            weighted / weight
        } else {
            return None;
        };
        let peaks = fit
            .matched
            .iter()
            .filter_map(|(i, _)| self.spectrum.get(*i))
            .collect();
        Some(IsotopicEnvelope::new(
            monoisotopic_mass,
            mz_to_mass(self.spectrum.mz(apex_index), fit.charge),
            fit.charge,
            peaks,
            fit.score,
            DeconvolutionType::IsoDec,
        ))
    }

    /// Visit the peaks of `seed_span` as seeds. Template isotopes may match any
    /// unclaimed peak of the spectrum.
    fn run(&mut self, seed_span: Range<usize>) -> Vec<IsotopicEnvelope> {
        let mut seeds: Vec<usize> = seed_span.collect();
        seeds.sort_by(|a, b| {
            descending_intensity(self.spectrum.intensity(*a), self.spectrum.intensity(*b))
                .then(a.cmp(b))
        });
        let mut envelopes = Vec::new();
        for seed in seeds {
            if self.consumed[seed] || !(self.spectrum.intensity(seed) > 0.0) {
                continue;
            }
            let Some((fit, entry)) = self.best_match_for_seed(seed) else {
                continue;
            };
            trace!(
                "Seed {:0.4} matched charge {} with score {:0.3} over {} peaks",
                self.spectrum.mz(seed),
                fit.charge,
                fit.score,
                fit.matched.len()
            );
            if let Some(envelope) = self.to_envelope(&fit, entry) {
                for (i, _) in fit.matched.iter() {
                    self.consumed[*i] = true;
                }
                envelopes.push(envelope);
            }
        }
        debug!(
            "Matched {} templates, claiming {} of {} peaks",
            envelopes.len(),
            self.consumed.iter().filter(|c| **c).count(),
            self.spectrum.len()
        );
        envelopes
    }
}

/// Isotope pattern template matching, see the [module documentation](self)
#[derive(Debug, Clone)]
pub struct IsoDecAlgorithm {
    params: IsoDecParameters,
    table: &'static AveragineTable,
}

impl IsoDecAlgorithm {
    pub fn new(params: IsoDecParameters) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        Ok(Self {
            params,
            table: averagine_table(params.isotopic_model),
        })
    }

    pub fn params(&self) -> &IsoDecParameters {
        &self.params
    }
}

impl TryFrom<DeconvolutionParameters> for IsoDecAlgorithm {
    type Error = DeconvolutionError;

    fn try_from(value: DeconvolutionParameters) -> Result<Self, Self::Error> {
        match value {
            DeconvolutionParameters::IsoDec(params) => Self::new(params),
            other => Err(DeconvolutionError::ConfigurationError(format!(
                "Cannot run the pattern matching algorithm with {} parameters",
                other.algorithm()
            ))),
        }
    }
}

impl DeconvolutionAlgorithm for IsoDecAlgorithm {
    fn algorithm(&self) -> DeconvolutionType {
        DeconvolutionType::IsoDec
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

impl IsoDecAlgorithm {
    fn search(&self, spectrum: &Spectrum, seed_span: Range<usize>) -> Vec<IsotopicEnvelope> {
        if seed_span.is_empty() {
            return Vec::new();
        }
        let mut search = IsoDecSearch {
            spectrum,
            table: self.table,
            params: &self.params,
            consumed: vec![false; spectrum.len()],
        };
        search.run(seed_span)
    }
}

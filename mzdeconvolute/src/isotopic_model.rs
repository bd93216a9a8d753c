/*! Isotopic models and the shared averagine tables the algorithms match against */
use std::sync::OnceLock;

#[doc(hidden)]
pub use chemical_elements::isotopic_pattern::{
    BafflingRecursiveIsotopicPatternGenerator, TheoreticalIsotopicPattern,
};

use chemical_elements::{ChemicalComposition, ElementSpecification, PROTON as _PROTON};

use mzpeaks::prelude::*;
use num_traits::Float;
use tracing::{debug, warn};

pub(crate) fn isclose<T: Float>(a: T, b: T, delta: T) -> bool {
    (a - b).abs() < delta
}

/// The mass of H+, a hydrogen atom minus an electron
pub const PROTON: f64 = _PROTON;

/// The mass difference between isotopes `C[13]` and `C[12]`. Not precisely universal, but the
/// majority of expected applications are carbon-based
pub const NEUTRON_SHIFT: f64 = 1.0033548378;

/// The number of entries in each averagine table. Entry `i` is built from `(i + 1) / 2`
/// average monomers, so the tables span roughly 55 Da to 80 kDa for peptides.
pub const AVERAGINE_TABLE_SIZE: usize = 1500;

/// Get the m/z difference between isotopic peaks at a given charge state
#[inline(always)]
pub fn isotopic_shift(charge: i32) -> f64 {
    NEUTRON_SHIFT / charge.abs() as f64
}

/// Convert an m/z to a neutral mass. The sign of `charge` carries the polarity.
#[inline(always)]
pub fn mz_to_mass(mz: f64, charge: i32) -> f64 {
    mz * charge.abs() as f64 - charge as f64 * PROTON
}

/// Convert a neutral mass to an m/z. The sign of `charge` carries the polarity.
#[inline(always)]
pub fn mass_to_mz(mass: f64, charge: i32) -> f64 {
    (mass + charge as f64 * PROTON) / charge.abs() as f64
}

/// A set of named average monomer isotopic models for biomolecules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsotopicModels {
    #[default]
    Peptide,
    Glycan,
    Glycopeptide,
    PermethylatedGlycan,
    Heparin,
    HeparanSulfate,
}

impl IsotopicModels {
    /// The fractional elemental composition of one average monomer
    pub fn base_composition(&self) -> &'static [(&'static str, f64)] {
        match self {
            IsotopicModels::Peptide => &[
                ("H", 7.7583),
                ("C", 4.9384),
                ("S", 0.0417),
                ("O", 1.4773),
                ("N", 1.3577),
            ],
            IsotopicModels::Glycan => &[("H", 11.8333), ("C", 7.0), ("O", 5.16666), ("N", 0.5)],
            IsotopicModels::Glycopeptide => &[
                ("H", 15.75),
                ("C", 10.93),
                ("S", 0.02054),
                ("O", 6.4773),
                ("N", 1.6577),
            ],
            IsotopicModels::PermethylatedGlycan => {
                &[("C", 12.0), ("H", 21.8333), ("N", 0.5), ("O", 5.16666)]
            }
            IsotopicModels::Heparin => {
                &[("H", 10.5), ("C", 6.0), ("S", 0.5), ("O", 5.5), ("N", 0.5)]
            }
            IsotopicModels::HeparanSulfate => &[
                ("H", 10.667),
                ("C", 6.0),
                ("S", 1.333),
                ("O", 9.0),
                ("N", 0.667),
            ],
        }
    }
}

/// A model for converting a number of average monomers into an elemental composition.
///
/// This is an implementation of Senko's Averagine [^1]
///
/// # References
/// [^1]: Senko M, Beu S, McLafferty F: Determination of Monoisotopic Masses and Ion
///       Populations for Large Biomolecules from Resolved Isotopic Distributions.
///       Journal of the American Society for Mass Spectrometry 1995, 6:229-233
///       <https://doi.org/10.1016/1044-0305(95)00017-8>
#[derive(Debug, Clone)]
pub struct AveragineModel {
    base_composition: Vec<(ElementSpecification<'static>, f64)>,
    /// The mass of the average monomer
    pub base_mass: f64,
}

impl AveragineModel {
    pub fn new(model: IsotopicModels) -> Self {
        let mut base_composition = Vec::new();
        for (symbol, count) in model.base_composition() {
            match symbol.parse::<ElementSpecification<'static>>() {
                Ok(elt) => base_composition.push((elt, *count)),
                Err(e) => warn!("Failed to parse element {symbol} of {model:?}: {e:?}"),
            }
        }
        let base_mass = base_composition
            .iter()
            .map(|(e, c)| e.element.most_abundant_mass * *c)
            .sum();
        Self {
            base_composition,
            base_mass,
        }
    }

    /// The integer composition of `units` average monomers, each element count rounded
    /// to the nearest whole atom
    pub fn composition_of(&self, units: f64) -> ChemicalComposition<'static> {
        let mut scaled = ChemicalComposition::new();
        for (elt, count) in self.base_composition.iter() {
            let n = (*count * units).round() as i32;
            if n > 0 {
                scaled.set(*elt, n);
            }
        }
        scaled
    }
}

/// One isotopic peak of a theoretical distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TheoreticalIsotope {
    /// The neutral mass of this isotopologue
    pub mass: f64,
    /// The fraction of the distribution's total abundance in this peak
    pub abundance: f64,
}

/// The theoretical isotopic distribution of one averagine composition
#[derive(Debug, Clone, PartialEq)]
pub struct AveragineEntry {
    pub monoisotopic_mass: f64,
    pub most_abundant_mass: f64,
    /// Isotopic peaks in ascending mass order
    pub isotopes: Vec<TheoreticalIsotope>,
    /// Indices into `isotopes` from most to least abundant
    pub abundance_order: Vec<usize>,
}

impl AveragineEntry {
    fn new(monoisotopic_mass: f64, mut isotopes: Vec<TheoreticalIsotope>) -> Option<Self> {
        let total: f64 = isotopes.iter().map(|p| p.abundance).sum();
        if isotopes.is_empty() || total <= 0.0 {
            return None;
        }
        isotopes.iter_mut().for_each(|p| p.abundance /= total);
        isotopes.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        let mut abundance_order: Vec<usize> = (0..isotopes.len()).collect();
        abundance_order.sort_by(|a, b| {
            isotopes[*b]
                .abundance
                .total_cmp(&isotopes[*a].abundance)
                .then(a.cmp(b))
        });
        let most_abundant_mass = isotopes[abundance_order[0]].mass;
        Some(Self {
            monoisotopic_mass,
            most_abundant_mass,
            isotopes,
            abundance_order,
        })
    }

    /// The mass gap between the most abundant isotope and the monoisotopic mass
    pub fn diff_to_monoisotopic(&self) -> f64 {
        self.most_abundant_mass - self.monoisotopic_mass
    }

    /// The position of the most abundant isotope in mass order
    pub fn most_abundant_index(&self) -> usize {
        self.abundance_order[0]
    }

    /// Iterate over the isotopes from most to least abundant
    pub fn by_abundance(&self) -> impl Iterator<Item = &TheoreticalIsotope> + '_ {
        self.abundance_order.iter().map(|i| &self.isotopes[*i])
    }

    pub fn len(&self) -> usize {
        self.isotopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isotopes.is_empty()
    }
}

/// A precomputed series of averagine isotopic distributions at increasing mass.
///
/// Tables are built once per [`IsotopicModels`] and shared read-only for the life of
/// the process, see [`averagine_table`].
#[derive(Debug, Clone)]
pub struct AveragineTable {
    pub model: IsotopicModels,
    entries: Vec<AveragineEntry>,
}

impl AveragineTable {
    /// Generate `size` theoretical distributions for `model`
    pub fn build(model: IsotopicModels, size: usize) -> Self {
        let averagine = AveragineModel::new(model);
        let mut generator = BafflingRecursiveIsotopicPatternGenerator::new();
        let mut entries = Vec::with_capacity(size);
        for i in 0..size {
            let units = (i + 1) as f64 / 2.0;
            let composition = averagine.composition_of(units);
            let monoisotopic_mass = composition.mass();
            let peaks = generator.isotopic_variants(composition, 0, 1, PROTON);
            let pattern = TheoreticalIsotopicPattern::from(peaks)
                .truncate_after(0.9999)
                .ignore_below(0.0001);
            let isotopes = pattern
                .iter()
                .map(|p| TheoreticalIsotope {
                    mass: p.mz() - PROTON,
                    abundance: p.intensity,
                })
                .collect();
            match AveragineEntry::new(monoisotopic_mass, isotopes) {
                Some(entry) => entries.push(entry),
                None => warn!("Empty isotopic pattern for {units} units of {model:?}"),
            }
        }
        debug!("Built {} averagine entries for {model:?}", entries.len());
        Self { model, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AveragineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&AveragineEntry> {
        self.entries.get(index)
    }

    fn closest_by<F: Fn(&AveragineEntry) -> f64>(&self, mass: f64, key: F) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let i = self.entries.partition_point(|e| key(e) < mass);
        if i == 0 {
            Some(0)
        } else if i >= self.entries.len() {
            Some(self.entries.len() - 1)
        } else if mass - key(&self.entries[i - 1]) > key(&self.entries[i]) - mass {
            Some(i)
        } else {
            Some(i - 1)
        }
    }

    /// The index of the entry whose most abundant isotope mass is closest to `mass`
    pub fn closest_by_most_abundant(&self, mass: f64) -> Option<usize> {
        self.closest_by(mass, |e| e.most_abundant_mass)
    }

    /// The index of the entry whose monoisotopic mass is closest to `mass`
    pub fn closest_by_monoisotopic(&self, mass: f64) -> Option<usize> {
        self.closest_by(mass, |e| e.monoisotopic_mass)
    }
}

static PEPTIDE_TABLE: OnceLock<AveragineTable> = OnceLock::new();
static GLYCAN_TABLE: OnceLock<AveragineTable> = OnceLock::new();
static GLYCOPEPTIDE_TABLE: OnceLock<AveragineTable> = OnceLock::new();
static PERMETHYLATED_GLYCAN_TABLE: OnceLock<AveragineTable> = OnceLock::new();
static HEPARIN_TABLE: OnceLock<AveragineTable> = OnceLock::new();
static HEPARAN_SULFATE_TABLE: OnceLock<AveragineTable> = OnceLock::new();

/// Get the process-wide averagine table for `model`, building it on first use.
///
/// Concurrent first callers block until the single build completes, and the
/// table is never modified afterwards.
pub fn averagine_table(model: IsotopicModels) -> &'static AveragineTable {
    let cell = match model {
        IsotopicModels::Peptide => &PEPTIDE_TABLE,
        IsotopicModels::Glycan => &GLYCAN_TABLE,
        IsotopicModels::Glycopeptide => &GLYCOPEPTIDE_TABLE,
        IsotopicModels::PermethylatedGlycan => &PERMETHYLATED_GLYCAN_TABLE,
        IsotopicModels::Heparin => &HEPARIN_TABLE,
        IsotopicModels::HeparanSulfate => &HEPARAN_SULFATE_TABLE,
    };
    cell.get_or_init(|| AveragineTable::build(model, AVERAGINE_TABLE_SIZE))
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    #[test]
    fn test_mass_conversion() {
        let mass = 1000.0;
        let mz = mass_to_mz(mass, 2);
        assert_is_close!(mz, (mass + 2.0 * PROTON) / 2.0, 1e-9, "m/z");
        assert_is_close!(mz_to_mass(mz, 2), mass, 1e-9, "mass");

        let mz = mass_to_mz(mass, -2);
        assert_is_close!(mz, (mass - 2.0 * PROTON) / 2.0, 1e-9, "m/z");
        assert_is_close!(mz_to_mass(mz, -2), mass, 1e-9, "mass");

        assert_is_close!(isotopic_shift(-2), isotopic_shift(2), 1e-12, "shift");
        assert_is_close!(isotopic_shift(2), 0.5016774189, 1e-9, "shift");
    }

    #[test]
    fn test_model_composition() {
        let model = AveragineModel::new(IsotopicModels::Peptide);
        assert_is_close!(model.base_mass, 111.1254, 0.01, "averagine mass");
        let comp = model.composition_of(10.0);
        assert_is_close!(comp.mass(), 1111.25, 2.0, "scaled mass");
    }

    #[test]
    fn test_table_entries() {
        let table = AveragineTable::build(IsotopicModels::Peptide, 40);
        assert_eq!(table.len(), 40);
        for entry in table.entries() {
            let total: f64 = entry.isotopes.iter().map(|p| p.abundance).sum();
            assert_is_close!(total, 1.0, 1e-9, "abundance");
            assert!(entry.diff_to_monoisotopic() > -1e-6);
            assert!(entry
                .isotopes
                .windows(2)
                .all(|w| w[0].mass < w[1].mass));
            let gap = entry.isotopes[1].mass - entry.isotopes[0].mass;
            assert_is_close!(gap, NEUTRON_SHIFT, 0.01, "isotope spacing");
        }
        assert!(table
            .entries()
            .windows(2)
            .all(|w| w[0].most_abundant_mass < w[1].most_abundant_mass));

        let small = &table.entries()[1];
        assert_eq!(small.most_abundant_index(), 0);
        assert_is_close!(small.diff_to_monoisotopic(), 0.0, 1e-6, "mono offset");
        let large = &table.entries()[39];
        assert_eq!(large.most_abundant_index(), 1);
    }

    #[test]
    fn test_closest_entry() {
        let table = AveragineTable::build(IsotopicModels::Peptide, 20);
        let entry = &table.entries()[10];
        assert_eq!(
            table.closest_by_monoisotopic(entry.monoisotopic_mass + 1.0),
            Some(10)
        );
        assert_eq!(table.closest_by_most_abundant(entry.most_abundant_mass), Some(10));
        assert_eq!(table.closest_by_monoisotopic(0.0), Some(0));
        assert_eq!(table.closest_by_monoisotopic(1e9), Some(19));
    }

    #[test]
    fn test_shared_table() {
        let a = averagine_table(IsotopicModels::Peptide);
        let b = averagine_table(IsotopicModels::Peptide);
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.len(), AVERAGINE_TABLE_SIZE);
        let entry = &a.entries()[a.closest_by_monoisotopic(14037.9).unwrap()];
        assert!(entry.diff_to_monoisotopic() > 5.0);
    }
}

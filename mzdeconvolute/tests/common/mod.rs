#![allow(dead_code)]
use mzdeconvolute::isotopic_model::{averagine_table, mass_to_mz, AveragineEntry, IsotopicModels};
use mzdeconvolute::{MzPeak, Spectrum};

/// The neutral mass of the intact proteoform fixture
pub const PROTEOFORM_MASS: f64 = 14037.926829;
/// The precursor m/z selected from the proteoform at charge 24
pub const SELECTED_ION_MZ: f64 = 586.2143122;

/// The averagine entry whose most abundant isotope best explains a species of
/// monoisotopic mass `mass`
pub fn entry_for(mass: f64) -> &'static AveragineEntry {
    let table = averagine_table(IsotopicModels::Peptide);
    let mut index = table.closest_by_monoisotopic(mass).unwrap();
    for _ in 0..10 {
        let entry = &table.entries()[index];
        let next = table
            .closest_by_most_abundant(mass + entry.diff_to_monoisotopic())
            .unwrap();
        if next == index {
            break;
        }
        index = next;
    }
    &table.entries()[index]
}

/// Render every isotope of the species of mass `mass` at each charge, with
/// intensities peaking at `apex_charge` and a mild deterministic ripple
pub fn charge_ladder_peaks(
    mass: f64,
    charges: impl Iterator<Item = i32>,
    apex_charge: i32,
    sign: i32,
) -> Vec<MzPeak> {
    let entry = entry_for(mass);
    let mut peaks = Vec::new();
    let mut i = 0usize;
    for z in charges {
        let height = 1e6 * (-((z - apex_charge) as f64).powi(2) / 32.0).exp();
        for iso in entry.isotopes.iter() {
            let iso_mass = iso.mass - entry.monoisotopic_mass + mass;
            let ripple = 1.0 + 0.03 * (i as f64).sin();
            peaks.push(MzPeak::new(
                mass_to_mz(iso_mass, z * sign),
                iso.abundance * height * ripple,
            ));
            i += 1;
        }
    }
    peaks
}

/// The 14 kDa proteoform observed over charges 13 to 30
pub fn proteoform_spectrum() -> Spectrum {
    charge_ladder_peaks(PROTEOFORM_MASS, 13..=30, 24, 1)
        .into_iter()
        .collect()
}

/// The same proteoform in negative mode
pub fn negative_proteoform_spectrum() -> Spectrum {
    charge_ladder_peaks(PROTEOFORM_MASS, 13..=30, 24, -1)
        .into_iter()
        .collect()
}

/// Two small species at low charge, well separated in m/z
pub fn small_molecule_spectrum() -> Spectrum {
    let mut peaks = charge_ladder_peaks(1200.0, 2..=2, 2, 1);
    peaks.extend(charge_ladder_peaks(2500.0, 3..=3, 3, 1));
    peaks.into_iter().collect()
}

use rayon::prelude::*;

use mzdeconvolute::prelude::*;
use mzdeconvolute::scan::ISOLATION_MARGIN;
use mzdeconvolute::{
    ClassicDeconvolutionParameters, IsoDecParameters, LogClusteringParameters, Scan,
    SpectralDeconvolutionParameters,
};

mod common;

use common::{
    negative_proteoform_spectrum, proteoform_spectrum, small_molecule_spectrum, PROTEOFORM_MASS,
    SELECTED_ION_MZ,
};

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

fn envelope_at_charge(
    envelopes: &[IsotopicEnvelope],
    charge: i32,
    mz: f64,
) -> &IsotopicEnvelope {
    envelopes
        .iter()
        .filter(|e| e.charge == charge && e.peaks.iter().any(|p| (p.mz - mz).abs() < 0.01))
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .unwrap_or_else(|| panic!("No envelope at charge {charge} covering {mz}"))
}

fn top_scoring(envelopes: &[IsotopicEnvelope]) -> &IsotopicEnvelope {
    envelopes
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .expect("At least one envelope")
}

#[test_log::test]
fn test_proteoform_classic() {
    let spectrum = proteoform_spectrum();
    let envelopes = deconvolute(&spectrum, &DeconvolutionParameters::default(), None).unwrap();
    assert!(!envelopes.is_empty());

    // The most intense seed comes first
    let first = &envelopes[0];
    assert_is_close!(first.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "first envelope mass");
    assert!((13..=30).contains(&first.charge));
    assert!(first.peaks.len() > 10);

    let top = top_scoring(&envelopes);
    assert_is_close!(top.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "top envelope mass");
    assert!((13..=30).contains(&top.charge));

    for env in envelopes.iter().filter(|e| e.score >= first.score) {
        assert_is_close!(env.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "outranking mass");
    }

    let env = envelope_at_charge(&envelopes, 24, SELECTED_ION_MZ);
    assert_is_close!(env.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "charge 24 mass");
}

#[test]
fn test_proteoform_negative_mirror() {
    let positive =
        deconvolute(&proteoform_spectrum(), &DeconvolutionParameters::default(), None).unwrap();
    let params: DeconvolutionParameters = ClassicDeconvolutionParameters {
        min_charge: -1,
        max_charge: -60,
        polarity: Polarity::Negative,
        ..Default::default()
    }
    .into();
    let spectrum = negative_proteoform_spectrum();
    let negative = deconvolute(&spectrum, &params, None).unwrap();

    let neg = top_scoring(&negative);
    let pos = top_scoring(&positive);
    assert_is_close!(neg.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "monoisotopic mass");
    assert_is_close!(neg.monoisotopic_mass, pos.monoisotopic_mass, 0.0005, "mirrored mass");
    assert_is_close!(
        negative[0].monoisotopic_mass,
        PROTEOFORM_MASS,
        0.0005,
        "first envelope mass"
    );

    let selected = SELECTED_ION_MZ - 2.0 * mzdeconvolute::isotopic_model::PROTON;
    let neg = envelope_at_charge(&negative, -24, selected);
    assert_is_close!(neg.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "charge -24 mass");
    assert!(negative.iter().all(|e| e.charge < 0));
}

#[test]
fn test_repeatable() {
    let spectra = [proteoform_spectrum(), small_molecule_spectrum()];
    for params in [
        DeconvolutionParameters::default(),
        LogClusteringParameters::default().into(),
        IsoDecParameters::default().into(),
    ] {
        let deconvoluter = Deconvoluter::new(params).unwrap();
        for spectrum in spectra.iter() {
            let first = deconvoluter.deconvolute(spectrum, None).unwrap();
            let second = deconvoluter.deconvolute(spectrum, None).unwrap();
            assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                assert_eq!(a.monoisotopic_mass, b.monoisotopic_mass);
                assert_eq!(
                    a.most_abundant_observed_isotopic_mass,
                    b.most_abundant_observed_isotopic_mass
                );
                assert_eq!(a.charge, b.charge);
            }
        }
    }
}

#[test]
fn test_parallel_batch_matches_serial() {
    let spectra = vec![
        proteoform_spectrum(),
        small_molecule_spectrum(),
        negative_proteoform_spectrum(),
        Spectrum::default(),
    ];
    let deconvoluter = Deconvoluter::new(IsoDecParameters::default().into()).unwrap();
    let serial: Vec<_> = spectra
        .iter()
        .map(|s| deconvoluter.deconvolute(s, None).unwrap())
        .collect();
    let parallel: Vec<_> = spectra
        .par_iter()
        .map(|s| deconvoluter.deconvolute(s, None).unwrap())
        .collect();
    assert_eq!(serial, parallel);
}

#[test]
fn test_range_filter_is_exact() {
    let spectrum = proteoform_spectrum();
    let range = MzRange::new(580.0, 640.0);
    for params in [
        DeconvolutionParameters::default(),
        LogClusteringParameters::default().into(),
        IsoDecParameters::default().into(),
    ] {
        let envelopes = deconvolute(&spectrum, &params, Some(range)).unwrap();
        for env in envelopes.iter() {
            assert!(
                env.peaks.iter().all(|p| range.contains(p.mz)),
                "{} envelope at {} escaped {range}",
                params.algorithm(),
                env.monoisotopic_mass
            );
        }
    }
}

#[test]
fn test_empty_input() {
    let empty = Spectrum::new(Vec::new(), Vec::new()).unwrap();
    for algorithm in [
        DeconvolutionType::Classic,
        DeconvolutionType::LogClustering,
        DeconvolutionType::IsoDec,
    ] {
        let params = DeconvolutionParameters::default_for(algorithm);
        assert!(deconvolute(&empty, &params, None).unwrap().is_empty());
        assert!(deconvolute(&empty, &params, Some(MzRange::new(0.0, 1000.0)))
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_unavailable_algorithms() {
    let spectrum = small_molecule_spectrum();
    let err = deconvolute(
        &spectrum,
        &SpectralDeconvolutionParameters::default().into(),
        None,
    )
    .unwrap_err();
    assert_eq!(err, DeconvolutionError::NotImplemented(DeconvolutionType::Spectral));
    assert!(err.to_string().contains("not implemented"));

    let err = "averagine-2".parse::<DeconvolutionType>().unwrap_err();
    assert!(matches!(err, DeconvolutionError::UnsupportedAlgorithm(_)));
    let err = DeconvolutionType::try_from(9i32).unwrap_err();
    assert!(matches!(err, DeconvolutionError::UnsupportedAlgorithm(_)));
}

#[test]
fn test_scan_and_isolation() {
    let spectrum = proteoform_spectrum();
    let precursor = Scan::new(0, 1, Polarity::Positive, spectrum.clone());
    let product = Scan::new(1, 2, Polarity::Positive, Spectrum::default())
        .with_selected_ion(SELECTED_ION_MZ, None, Some(24))
        .with_isolation(SELECTED_ION_MZ, 2.0);

    let params: DeconvolutionParameters = IsoDecParameters::default().into();
    assert_eq!(
        deconvolute(&precursor, &params, None).unwrap(),
        deconvolute(&spectrum, &params, None).unwrap()
    );

    let window = product.isolation_window.unwrap();
    let isolated = product
        .isolated_masses_and_charges_from_scan(&precursor, &params)
        .unwrap();
    assert!(!isolated.is_empty());
    assert!(isolated
        .iter()
        .all(|e| e.peaks.iter().any(|p| window.contains(p.mz))));
    let env = envelope_at_charge(&isolated, 24, SELECTED_ION_MZ);
    assert_is_close!(env.monoisotopic_mass, PROTEOFORM_MASS, 0.001, "monoisotopic mass");

    let unisolated = precursor
        .isolated_masses_and_charges(&spectrum, &params)
        .unwrap();
    assert!(unisolated.is_empty());
}

#[test_log::test]
fn test_isolated_masses_classic() {
    let precursor = Scan::new(0, 1, Polarity::Positive, proteoform_spectrum());
    let product = Scan::new(1, 2, Polarity::Positive, Spectrum::default())
        .with_selected_ion(SELECTED_ION_MZ, None, Some(24))
        .with_isolation(SELECTED_ION_MZ, 2.0);
    let window = product.isolation_window.unwrap();

    let isolated = product
        .isolated_masses_and_charges_from_scan(&precursor, &DeconvolutionParameters::default())
        .unwrap();
    assert!(!isolated.is_empty());
    assert!(isolated
        .iter()
        .all(|e| e.peaks.iter().any(|p| window.contains(p.mz))));
    assert_eq!(isolated[0].charge, 24);
    assert_is_close!(
        isolated[0].monoisotopic_mass,
        PROTEOFORM_MASS,
        0.0005,
        "isolated mass"
    );
    let top = top_scoring(&isolated);
    assert_eq!(top.charge, 24);
    assert_is_close!(top.monoisotopic_mass, PROTEOFORM_MASS, 0.0005, "top isolated mass");

    // Restricting the spectrum itself hides the other charge states the classic
    // search needs to accept a charge 24 fit
    let window_only = precursor
        .spectrum
        .filtered_to_range(&window.range().widen(ISOLATION_MARGIN));
    let restricted = deconvolute(&window_only, &DeconvolutionParameters::default(), None).unwrap();
    assert!(restricted.iter().all(|e| e.charge != 24));
}

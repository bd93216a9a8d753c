//! Charge ladder detection in log m/z space.
//!
//! For a fixed neutral mass the peaks of consecutive charge states are separated in
//! log m/z by close to `ln((z + 1) / z)`, independent of the mass itself. Peaks are
//! log transformed, walked from high to low m/z looking for runs of such steps, and
//! each run is turned back into a set of neutral mass estimates. Runs whose estimates
//! agree are kept, and the consensus mass of the largest agreeing subset becomes an
//! envelope.
//!
//! The intermediate stages are exposed as free functions so they can be composed and
//! checked on their own.
use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::charge::Polarity;
use crate::deconv_traits::{DeconvolutionAlgorithm, DeconvolutionError};
use crate::envelope::IsotopicEnvelope;
use crate::isotopic_model::mz_to_mass;
use crate::params::{DeconvolutionParameters, DeconvolutionType, LogClusteringParameters};
use crate::spectrum::{MzPeak, Spectrum};

/// The peaks of a spectrum that survived an intensity threshold, with their m/z
/// replaced by its natural logarithm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogTransformedSpectrum {
    pub log_mz: Vec<f64>,
    pub intensity: Vec<f64>,
    /// The index of each retained peak in the source spectrum
    pub source_index: Vec<usize>,
}

impl LogTransformedSpectrum {
    pub fn len(&self) -> usize {
        self.log_mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_mz.is_empty()
    }
}

/// Drop every peak whose intensity is not strictly above `intensity_threshold` or
/// whose m/z is not positive, then take the natural logarithm of the m/z of the rest
pub fn log_transform_spectrum(
    spectrum: &Spectrum,
    intensity_threshold: f64,
) -> LogTransformedSpectrum {
    let mut result = LogTransformedSpectrum::default();
    for (i, peak) in spectrum.iter().enumerate() {
        if peak.intensity > intensity_threshold && peak.mz > 0.0 {
            result.log_mz.push(peak.mz.ln());
            result.intensity.push(peak.intensity);
            result.source_index.push(i);
        }
    }
    result
}

/// The half width in log space of a `tolerance_ppm` window around `exp(log_mz)`.
///
/// A fixed relative window maps to a near constant width in log space, growing
/// very slightly with m/z.
pub fn log_mz_dependent_tolerance(log_mz: f64, tolerance_ppm: f64) -> f64 {
    let m = log_mz.exp();
    let upper = m + m * tolerance_ppm / 1e6;
    upper.ln() - log_mz
}

/// The expected log m/z step between the peaks of charge `z` and `z + 1`, for every
/// `z` from `min_charge` up to but not including `max_charge`, in magnitude
pub fn charge_ladder_steps(min_charge: i32, max_charge: i32) -> Vec<f64> {
    let low = min_charge.abs().min(max_charge.abs()).max(1);
    let high = min_charge.abs().max(max_charge.abs());
    (low..high)
        .map(|z| ((z + 1) as f64).ln() - (z as f64).ln())
        .collect()
}

/// A run of peaks whose log m/z spacing matches consecutive charge states, ordered
/// from high to low m/z, so from low to high charge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeLadderGroup {
    pub log_mz: Vec<f64>,
    pub intensity: Vec<f64>,
    /// The charge magnitude assigned to each peak
    pub charges: Vec<i32>,
    /// The index of each peak in the log transformed spectrum
    pub indices: Vec<usize>,
}

impl ChargeLadderGroup {
    pub fn len(&self) -> usize {
        self.log_mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_mz.is_empty()
    }
}

/// Walk a ladder starting from the peak at `start` (in descending order) assumed to
/// carry charge `start_charge`, taking the first peak at each expected step
fn walk_ladder(
    sorted_log_mz: &[f64],
    start: usize,
    start_charge: i32,
    max_charge: i32,
    tolerance_ppm: f64,
) -> (Vec<usize>, Vec<i32>) {
    let mut members = vec![start];
    let mut charges = vec![start_charge];
    let mut prev = start;
    let mut z = start_charge;
    while z < max_charge {
        let expected = ((z + 1) as f64).ln() - (z as f64).ln();
        let prev_value = sorted_log_mz[prev];
        let tolerance = log_mz_dependent_tolerance(prev_value, tolerance_ppm);
        let mut found = None;
        for (next, value) in sorted_log_mz.iter().enumerate().skip(prev + 1) {
            let diff = prev_value - value;
            if (diff - expected).abs() <= tolerance {
                found = Some(next);
                break;
            }
            if diff > expected + tolerance {
                break;
            }
        }
        match found {
            Some(next) => {
                z += 1;
                members.push(next);
                charges.push(z);
                prev = next;
            }
            None => break,
        }
    }
    (members, charges)
}

/// Find charge ladders in a log transformed peak list.
///
/// Every peak but the lowest in m/z is tried as the lowest charge rung at every charge
/// magnitude in `[min_charge, max_charge]`. The longest ladder of at least two peaks
/// from each starting peak is reported, ties going to the lower starting charge.
pub fn find_matching_groups(
    log_mz: &[f64],
    intensity: &[f64],
    min_charge: i32,
    max_charge: i32,
    tolerance_ppm: f64,
) -> Vec<ChargeLadderGroup> {
    let n = log_mz.len().min(intensity.len());
    let low = min_charge.abs().min(max_charge.abs()).max(1);
    let high = min_charge.abs().max(max_charge.abs());

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| log_mz[*b].total_cmp(&log_mz[*a]).then(a.cmp(b)));
    let sorted_log_mz: Vec<f64> = order.iter().map(|i| log_mz[*i]).collect();

    let mut groups = Vec::new();
    for start in 0..n.saturating_sub(1) {
        let mut best: Option<(Vec<usize>, Vec<i32>)> = None;
        for start_charge in low..high {
            let (members, charges) =
                walk_ladder(&sorted_log_mz, start, start_charge, high, tolerance_ppm);
            if members.len() > 1 && best.as_ref().map_or(true, |(b, _)| members.len() > b.len()) {
                best = Some((members, charges));
            }
        }
        if let Some((members, charges)) = best {
            let indices: Vec<usize> = members.iter().map(|i| order[*i]).collect();
            groups.push(ChargeLadderGroup {
                log_mz: indices.iter().map(|i| log_mz[*i]).collect(),
                intensity: indices.iter().map(|i| intensity[*i]).collect(),
                charges,
                indices,
            });
        }
    }
    groups
}

/// Remove every group whose log m/z values all have a match in a strictly longer
/// group. The surviving groups keep their order.
pub fn remove_subset_groups(
    groups: Vec<ChargeLadderGroup>,
    tolerance_ppm: f64,
) -> Vec<ChargeLadderGroup> {
    let mut by_length: Vec<usize> = (0..groups.len()).collect();
    by_length.sort_by_key(|i| groups[*i].len());

    let mut subsets = BTreeSet::new();
    for (k, i) in by_length.iter().enumerate() {
        let group = &groups[*i];
        let is_subset = by_length[k + 1..].iter().any(|j| {
            let other = &groups[*j];
            other.len() > group.len()
                && group.log_mz.iter().all(|x| {
                    let tol = log_mz_dependent_tolerance(*x, tolerance_ppm);
                    other.log_mz.iter().any(|o| (o - x).abs() <= tol)
                })
        });
        if is_subset {
            subsets.insert(*i);
        }
    }
    groups
        .into_iter()
        .enumerate()
        .filter_map(|(i, g)| (!subsets.contains(&i)).then_some(g))
        .collect()
}

/// The neutral masses a charge ladder implies, one per rung
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeutralMassGroup {
    pub neutral_mass: Vec<f64>,
    pub intensity: Vec<f64>,
    /// Signed charges
    pub charges: Vec<i32>,
    /// The index of each rung's peak in the log transformed spectrum
    pub indices: Vec<usize>,
}

impl NeutralMassGroup {
    pub fn new(neutral_mass: Vec<f64>, intensity: Vec<f64>) -> Self {
        let n = neutral_mass.len();
        Self {
            neutral_mass,
            intensity,
            charges: vec![1; n],
            indices: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.neutral_mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neutral_mass.is_empty()
    }
}

/// Convert each rung `(log_mz, z)` of each ladder to the neutral mass it implies at
/// the charge sign given by `polarity`
pub fn create_neutral_mass_intensity_groups(
    groups: &[ChargeLadderGroup],
    polarity: Polarity,
) -> Vec<NeutralMassGroup> {
    groups
        .iter()
        .map(|group| {
            let charges: Vec<i32> = group.charges.iter().map(|z| polarity.signed(*z)).collect();
            NeutralMassGroup {
                neutral_mass: group
                    .log_mz
                    .iter()
                    .zip(charges.iter())
                    .map(|(x, z)| mz_to_mass(x.exp(), *z))
                    .collect(),
                intensity: group.intensity.clone(),
                charges,
                indices: group.indices.clone(),
            }
        })
        .collect()
}

/// The outcome of [`filter_mass_intensity_groups_by_ppm_tolerance`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PpmPartition {
    pub likely_correct: Vec<NeutralMassGroup>,
    pub likely_incorrect: Vec<NeutralMassGroup>,
    /// How many groups were neither and were dropped
    pub ambiguous: usize,
}

fn pairwise_ppm(a: f64, b: f64) -> f64 {
    (a - b).abs() / ((a + b) / 2.0) * 1e6
}

/// Split groups by how well their mass estimates agree.
///
/// Every pair of masses in a group is compared. A group is likely correct when at
/// least `correct_fraction` of its pairs lie within `correct_ppm_tolerance` and fewer
/// than `1 - correct_fraction` of them lie beyond `incorrect_ppm_tolerance`, and
/// likely incorrect when more than `1 - correct_fraction` of them lie beyond it.
/// Anything else is ambiguous and lands in neither list. Groups of fewer than two
/// masses are likely correct.
pub fn filter_mass_intensity_groups_by_ppm_tolerance(
    groups: Vec<NeutralMassGroup>,
    correct_ppm_tolerance: f64,
    incorrect_ppm_tolerance: f64,
    correct_fraction: f64,
) -> PpmPartition {
    let mut partition = PpmPartition::default();
    for group in groups {
        let masses = &group.neutral_mass;
        if masses.len() < 2 {
            partition.likely_correct.push(group);
            continue;
        }
        let mut close = 0usize;
        let mut far = 0usize;
        let mut total = 0usize;
        for (i, a) in masses.iter().enumerate() {
            for b in masses[i + 1..].iter() {
                let ppm = pairwise_ppm(*a, *b);
                if ppm <= correct_ppm_tolerance {
                    close += 1;
                }
                if ppm > incorrect_ppm_tolerance {
                    far += 1;
                }
                total += 1;
            }
        }
        let total = total as f64;
        if close as f64 >= correct_fraction * total
            && (far as f64) < (1.0 - correct_fraction) * total
        {
            partition.likely_correct.push(group);
        } else if far as f64 > (1.0 - correct_fraction) * total {
            partition.likely_incorrect.push(group);
        } else {
            partition.ambiguous += 1;
        }
    }
    partition
}

/// The consensus of a mass group's largest agreeing subset
#[derive(Debug, Clone, PartialEq)]
pub struct NeutralMassConsensus {
    pub neutral_mass: f64,
    pub summed_intensity: f64,
    /// Positions in the group of the masses that agreed
    pub members: Vec<usize>,
}

/// Cluster the masses of each group greedily, each mass joining the first cluster
/// whose founding mass is within `ppm_tolerance` of it, and report the mean mass and
/// summed intensity of the largest cluster. Ties go to the earliest cluster.
/// Empty groups produce nothing.
pub fn get_most_common_neutral_mass_and_summed_intensity(
    groups: &[NeutralMassGroup],
    ppm_tolerance: f64,
) -> Vec<NeutralMassConsensus> {
    groups
        .iter()
        .filter_map(|group| most_common_neutral_mass(group, ppm_tolerance))
        .collect()
}

fn most_common_neutral_mass(
    group: &NeutralMassGroup,
    ppm_tolerance: f64,
) -> Option<NeutralMassConsensus> {
    let masses = &group.neutral_mass;
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (i, mass) in masses.iter().enumerate() {
        let home = clusters.iter_mut().find(|cluster| {
            let reference = masses[cluster[0]];
            (mass - reference).abs() / reference * 1e6 <= ppm_tolerance
        });
        match home {
            Some(cluster) => cluster.push(i),
            None => clusters.push(vec![i]),
        }
    }
    let mut mode: Option<Vec<usize>> = None;
    for cluster in clusters {
        if mode.as_ref().map_or(true, |m| cluster.len() > m.len()) {
            mode = Some(cluster);
        }
    }
    let members = mode?;
    let neutral_mass = members.iter().map(|i| masses[*i]).sum::<f64>() / members.len() as f64;
    let summed_intensity = members
        .iter()
        .filter_map(|i| group.intensity.get(*i))
        .sum();
    Some(NeutralMassConsensus {
        neutral_mass,
        summed_intensity,
        members,
    })
}

/// Charge ladder clustering, see the [module documentation](self)
#[derive(Debug, Clone)]
pub struct LogClusteringAlgorithm {
    params: LogClusteringParameters,
}

impl LogClusteringAlgorithm {
    pub fn new(params: LogClusteringParameters) -> Result<Self, DeconvolutionError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LogClusteringParameters {
        &self.params
    }

    fn build_envelope(
        &self,
        spectrum: &Spectrum,
        transformed: &LogTransformedSpectrum,
        group: &NeutralMassGroup,
        consensus: &NeutralMassConsensus,
    ) -> Option<IsotopicEnvelope> {
        let apex = consensus.members.iter().copied().max_by(|a, b| {
            group.intensity[*a]
                .total_cmp(&group.intensity[*b])
                .then(b.cmp(a))
        })?;
        let peaks: Vec<MzPeak> = consensus
            .members
            .iter()
            .filter_map(|i| {
                let source = transformed.source_index.get(*group.indices.get(*i)?)?;
                spectrum.get(*source)
            })
            .collect();
        if peaks.is_empty() {
            return None;
        }
        let score =
            consensus.summed_intensity * consensus.members.len() as f64 / group.len() as f64;
        Some(
            IsotopicEnvelope::new(
                consensus.neutral_mass,
                group.neutral_mass[apex],
                group.charges[apex],
                peaks,
                score,
                DeconvolutionType::LogClustering,
            )
            .with_total_intensity(consensus.summed_intensity),
        )
    }
}

impl TryFrom<DeconvolutionParameters> for LogClusteringAlgorithm {
    type Error = DeconvolutionError;

    fn try_from(value: DeconvolutionParameters) -> Result<Self, Self::Error> {
        match value {
            DeconvolutionParameters::LogClustering(params) => Self::new(params),
            other => Err(DeconvolutionError::ConfigurationError(format!(
                "Cannot run the log clustering algorithm with {} parameters",
                other.algorithm()
            ))),
        }
    }
}

impl DeconvolutionAlgorithm for LogClusteringAlgorithm {
    fn algorithm(&self) -> DeconvolutionType {
        DeconvolutionType::LogClustering
    }

    #[tracing::instrument(skip_all, level = "trace")]
    fn deconvolute(&self, spectrum: &Spectrum) -> Vec<IsotopicEnvelope> {
        let params = &self.params;
        let transformed = log_transform_spectrum(spectrum, params.intensity_threshold);
        if transformed.len() < 2 {
            return Vec::new();
        }
        let groups = find_matching_groups(
            &transformed.log_mz,
            &transformed.intensity,
            params.min_charge,
            params.max_charge,
            params.log_mz_tolerance_ppm,
        );
        let n_ladders = groups.len();
        let groups = remove_subset_groups(groups, params.log_mz_tolerance_ppm);
        trace!("Kept {} of {n_ladders} charge ladders", groups.len());

        let mass_groups = create_neutral_mass_intensity_groups(&groups, params.polarity);
        let partition = filter_mass_intensity_groups_by_ppm_tolerance(
            mass_groups,
            params.correct_ppm_tolerance,
            params.incorrect_ppm_tolerance,
            params.correct_fraction,
        );
        debug!(
            "{} likely correct, {} likely incorrect and {} ambiguous mass groups dropped",
            partition.likely_correct.len(),
            partition.likely_incorrect.len(),
            partition.ambiguous
        );

        let consensus = get_most_common_neutral_mass_and_summed_intensity(
            &partition.likely_correct,
            params.consensus_ppm_tolerance,
        );
        partition
            .likely_correct
            .iter()
            .filter(|g| !g.is_empty())
            .zip(consensus.iter())
            .filter_map(|(group, consensus)| {
                self.build_envelope(spectrum, &transformed, group, consensus)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::isotopic_model::{mass_to_mz, PROTON};

    fn ladder_spectrum(mass: f64, charges: std::ops::RangeInclusive<i32>, apex: i32) -> Spectrum {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = charges
            .map(|z| {
                let height = 1000.0 / (1.0 + ((z - apex) as f64).powi(2));
                (mass_to_mz(mass, z), height)
            })
            .unzip();
        Spectrum::new(mz, intensity).unwrap()
    }

    #[test]
    fn test_log_transform_filters_first() {
        let spectrum = Spectrum::new(vec![100.0, 200.0, 300.0], vec![0.005, 0.02, 0.5]).unwrap();
        let result = log_transform_spectrum(&spectrum, 0.01);
        assert_eq!(result.len(), 2);
        assert_eq!(result.intensity, vec![0.02, 0.5]);
        assert_eq!(result.source_index, vec![1, 2]);
        assert!(result.log_mz.iter().all(|x| *x > 0.0));
        assert!((result.log_mz[0] - 200.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_transform_skips_nonpositive_mz() {
        let spectrum = Spectrum::new(vec![-5.0, 0.0, 150.0], vec![10.0, 10.0, 10.0]).unwrap();
        let result = log_transform_spectrum(&spectrum, 0.0);
        assert_eq!(result.source_index, vec![2]);
        assert!(result.log_mz.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_ladder_steps() {
        let steps = charge_ladder_steps(1, 6);
        assert_eq!(steps.len(), 5);
        assert!((steps[0] - 2.0f64.ln()).abs() < 1e-10);
        assert!(steps.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(charge_ladder_steps(-1, -6), steps);
    }

    #[test]
    fn test_log_mz_dependent_tolerance() {
        let t = log_mz_dependent_tolerance(1000.0f64.ln(), 250.0);
        assert!(t > 0.0);
        assert!((t - (1.0 + 250e-6f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_find_matching_groups() {
        let log_mz = [100.0f64.ln(), 200.0f64.ln(), 300.0f64.ln()];
        let intensity = [10.0, 20.0, 30.0];
        let groups = find_matching_groups(&log_mz, &intensity, 1, 3, 250.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].indices, vec![2, 1]);
        assert_eq!(groups[0].charges, vec![2, 3]);
        assert_eq!(groups[0].intensity, vec![30.0, 20.0]);
        assert_eq!(groups[1].indices, vec![1, 0]);
        assert_eq!(groups[1].charges, vec![1, 2]);
        assert!(groups.iter().all(|g| g.len() > 1));
    }

    #[test]
    fn test_longest_ladder_per_start() {
        let spectrum = ladder_spectrum(20000.0, 10..=20, 15);
        let transformed = log_transform_spectrum(&spectrum, 0.0);
        let groups =
            find_matching_groups(&transformed.log_mz, &transformed.intensity, 1, 60, 250.0);
        assert_eq!(groups[0].len(), 11);
        assert_eq!(groups[0].charges.first(), Some(&10));
        assert_eq!(groups[0].charges.last(), Some(&20));
        let groups = remove_subset_groups(groups, 250.0);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_remove_subset_groups() {
        let make = |xs: &[f64]| ChargeLadderGroup {
            log_mz: xs.to_vec(),
            intensity: xs.iter().map(|x| x * 10.0).collect(),
            charges: (1..=xs.len() as i32).collect(),
            indices: (0..xs.len()).collect(),
        };
        let groups = vec![make(&[1.0, 2.0]), make(&[1.0, 2.0, 3.0])];
        let kept = remove_subset_groups(groups, 250.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].len(), 3);

        let groups = vec![make(&[1.0, 2.0]), make(&[1.0, 2.0])];
        assert_eq!(remove_subset_groups(groups, 250.0).len(), 2);
    }

    #[test]
    fn test_create_neutral_mass_groups() {
        let groups = vec![ChargeLadderGroup {
            log_mz: vec![100.0f64.ln()],
            intensity: vec![10.0],
            charges: vec![1],
            indices: vec![0],
        }];
        let result = create_neutral_mass_intensity_groups(&groups, Polarity::Positive);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].neutral_mass.len(), 1);
        assert!((result[0].neutral_mass[0] - (100.0 - PROTON)).abs() < 1e-9);

        let result = create_neutral_mass_intensity_groups(&groups, Polarity::Negative);
        assert_eq!(result[0].charges, vec![-1]);
        assert!((result[0].neutral_mass[0] - (100.0 + PROTON)).abs() < 1e-9);
    }

    #[test]
    fn test_ppm_partition() {
        let groups = vec![
            NeutralMassGroup::new(vec![1000.0, 1000.01], vec![10.0, 20.0]),
            NeutralMassGroup::new(vec![1000.0, 2000.0], vec![10.0, 20.0]),
        ];
        let partition = filter_mass_intensity_groups_by_ppm_tolerance(groups, 20_000.0, 10.0, 0.7);
        assert_eq!(partition.likely_correct.len(), 1);
        assert_eq!(partition.likely_incorrect.len(), 1);
        assert_eq!(partition.ambiguous, 0);
        assert_eq!(partition.likely_correct[0].neutral_mass[1], 1000.01);
    }

    #[test]
    fn test_ppm_partition_ambiguous() {
        // 100 ppm apart is neither close at 25 ppm nor far at 250 ppm
        let groups = vec![
            NeutralMassGroup::new(vec![10000.0, 10001.0], vec![1.0, 1.0]),
            NeutralMassGroup::new(vec![5000.0], vec![1.0]),
        ];
        let partition = filter_mass_intensity_groups_by_ppm_tolerance(groups, 25.0, 250.0, 0.7);
        assert_eq!(partition.ambiguous, 1);
        assert_eq!(partition.likely_correct.len(), 1);
        assert!(partition.likely_incorrect.is_empty());
    }

    #[test]
    fn test_most_common_mass() {
        let groups = vec![NeutralMassGroup::new(
            vec![1000.0, 1000.01, 2000.0],
            vec![10.0, 20.0, 30.0],
        )];
        let result = get_most_common_neutral_mass_and_summed_intensity(&groups, 20.0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].summed_intensity, 30.0);
        assert_eq!(result[0].members, vec![0, 1]);
        assert!((result[0].neutral_mass - 1000.005).abs() < 1e-9);

        let empty = vec![NeutralMassGroup::default()];
        assert!(get_most_common_neutral_mass_and_summed_intensity(&empty, 20.0).is_empty());
    }

    #[test_log::test]
    fn test_deconvolute_ladder() {
        let mass = 20000.0;
        let spectrum = ladder_spectrum(mass, 10..=20, 15);
        let algo = LogClusteringAlgorithm::new(Default::default()).unwrap();
        let envelopes = algo.deconvolute(&spectrum);
        assert_eq!(envelopes.len(), 1);
        let env = &envelopes[0];
        assert_eq!(env.charge, 15);
        assert_eq!(env.peaks.len(), 11);
        assert!((env.monoisotopic_mass - mass).abs() / mass * 1e6 < 1.0);
        assert!((env.most_abundant_observed_isotopic_mass - mass).abs() < 1e-6);
        assert!((env.total_intensity - spectrum.total_intensity()).abs() < 1e-9);
        assert_eq!(env.algorithm, DeconvolutionType::LogClustering);
    }

    #[test]
    fn test_deconvolute_two_rungs() {
        let mass = 10000.0;
        let spectrum = Spectrum::new(
            vec![mass_to_mz(mass, 2), mass_to_mz(mass, 1)],
            vec![40.0, 100.0],
        )
        .unwrap();
        let algo = LogClusteringAlgorithm::new(Default::default()).unwrap();
        let envelopes = algo.deconvolute(&spectrum);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].charge, 1);
    }

    #[test]
    fn test_deconvolute_negative() {
        let mass = 20000.0;
        let (mz, intensity): (Vec<f64>, Vec<f64>) = (10..=20)
            .map(|z| (mass_to_mz(mass, -z), 100.0 + z as f64))
            .unzip();
        let spectrum = Spectrum::new(mz, intensity).unwrap();
        let algo = LogClusteringAlgorithm::new(LogClusteringParameters {
            min_charge: -1,
            max_charge: -60,
            polarity: Polarity::Negative,
            ..Default::default()
        })
        .unwrap();
        let envelopes = algo.deconvolute(&spectrum);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].charge, -20);
        assert!((envelopes[0].monoisotopic_mass - mass).abs() / mass * 1e6 < 1.0);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let algo = LogClusteringAlgorithm::new(Default::default()).unwrap();
        assert!(algo.deconvolute(&Spectrum::default()).is_empty());
        let err = LogClusteringAlgorithm::try_from(DeconvolutionParameters::default()).unwrap_err();
        assert!(matches!(err, DeconvolutionError::ConfigurationError(_)));
    }
}

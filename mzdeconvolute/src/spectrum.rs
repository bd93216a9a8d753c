//! Peak list representations consumed by the deconvolution algorithms
use std::cmp::Ordering;
use std::ops::Range;

use itertools::Itertools;
use mzpeaks::prelude::*;
use mzpeaks::{CentroidLike, CoordinateLike, IntensityMeasurement, KnownCharge, Mass, MZ};
use tracing::trace;

use crate::deconv_traits::DeconvolutionError;
use crate::tolerance::{MzRange, Tolerance};

/// A single centroided peak
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MzPeak {
    pub mz: f64,
    pub intensity: f64,
}

impl MzPeak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

impl CoordinateLike<MZ> for MzPeak {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for MzPeak {
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

impl From<(f64, f64)> for MzPeak {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// Sort `keys` ascending, applying the same permutation to `values`
fn sort_parallel<T: Copy>(keys: &mut Vec<f64>, values: &mut Vec<T>) {
    if keys.windows(2).all(|w| w[0] <= w[1]) {
        return;
    }
    trace!("Re-sorting {} unordered peaks", keys.len());
    let order: Vec<usize> = (0..keys.len())
        .sorted_by(|a, b| keys[*a].total_cmp(&keys[*b]))
        .collect();
    *keys = order.iter().map(|i| keys[*i]).collect();
    *values = order.iter().map(|i| values[*i]).collect();
}

/// A centroided m/z spectrum stored as two parallel arrays sorted by ascending m/z.
///
/// The arrays are owned, so the caller's buffers are never aliased. After construction
/// only the explicitly named in-place transforms modify the peaks, and each of them
/// refreshes the cached statistics.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spectrum {
    mz: Vec<f64>,
    intensity: Vec<f64>,
    total_intensity: f64,
    base_peak_index: Option<usize>,
}

impl Spectrum {
    /// Build a spectrum from parallel m/z and intensity arrays, sorting them by m/z
    /// if they are not already in order.
    ///
    /// # Errors
    /// [`DeconvolutionError::InputShapeError`] if the arrays differ in length.
    pub fn new(mut mz: Vec<f64>, mut intensity: Vec<f64>) -> Result<Self, DeconvolutionError> {
        if mz.len() != intensity.len() {
            return Err(DeconvolutionError::InputShapeError {
                mz: mz.len(),
                intensity: intensity.len(),
                charge: None,
            });
        }
        sort_parallel(&mut mz, &mut intensity);
        let mut this = Self {
            mz,
            intensity,
            total_intensity: 0.0,
            base_peak_index: None,
        };
        this.update_summaries();
        Ok(this)
    }

    /// Copy the peaks of any centroided peak collection
    pub fn from_peaks<C: CentroidLike>(peaks: &[C]) -> Self {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = peaks
            .iter()
            .map(|p| (p.mz(), p.intensity() as f64))
            .unzip();
        let mut mz = mz;
        let mut intensity = intensity;
        sort_parallel(&mut mz, &mut intensity);
        let mut this = Self {
            mz,
            intensity,
            total_intensity: 0.0,
            base_peak_index: None,
        };
        this.update_summaries();
        this
    }

    fn update_summaries(&mut self) {
        self.total_intensity = self.intensity.iter().sum();
        self.base_peak_index = self
            .intensity
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, y)| match best {
                Some((_, b)) if b >= *y => best,
                _ => Some((i, *y)),
            })
            .map(|(i, _)| i);
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn mz_array(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity_array(&self) -> &[f64] {
        &self.intensity
    }

    #[inline]
    pub fn mz(&self, index: usize) -> f64 {
        self.mz[index]
    }

    #[inline]
    pub fn intensity(&self, index: usize) -> f64 {
        self.intensity[index]
    }

    pub fn get(&self, index: usize) -> Option<MzPeak> {
        Some(MzPeak::new(
            *self.mz.get(index)?,
            *self.intensity.get(index)?,
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = MzPeak> + '_ {
        self.mz
            .iter()
            .zip(self.intensity.iter())
            .map(|(mz, inten)| MzPeak::new(*mz, *inten))
    }

    pub fn total_intensity(&self) -> f64 {
        self.total_intensity
    }

    pub fn first_mz(&self) -> Option<f64> {
        self.mz.first().copied()
    }

    pub fn last_mz(&self) -> Option<f64> {
        self.mz.last().copied()
    }

    pub fn range(&self) -> Option<MzRange> {
        Some(MzRange::new(self.first_mz()?, self.last_mz()?))
    }

    pub fn base_peak_index(&self) -> Option<usize> {
        self.base_peak_index
    }

    /// The most intense peak; the lowest m/z wins ties
    pub fn base_peak(&self) -> Option<MzPeak> {
        self.base_peak_index.and_then(|i| self.get(i))
    }

    pub fn max_intensity(&self) -> f64 {
        self.base_peak().map(|p| p.intensity).unwrap_or(0.0)
    }

    /// The index span of peaks with `min_mz <= mz <= max_mz`
    pub fn extract_indices(&self, min_mz: f64, max_mz: f64) -> Range<usize> {
        let start = self.mz.partition_point(|x| *x < min_mz);
        let end = self.mz.partition_point(|x| *x <= max_mz);
        if end < start {
            start..start
        } else {
            start..end
        }
    }

    /// Iterate over the peaks with `min_mz <= mz <= max_mz`
    pub fn extract(&self, min_mz: f64, max_mz: f64) -> impl Iterator<Item = MzPeak> + Clone + '_ {
        let span = self.extract_indices(min_mz, max_mz);
        span.map(|i| MzPeak::new(self.mz[i], self.intensity[i]))
    }

    /// Count the peaks with `min_mz <= mz <= max_mz`
    pub fn num_peaks_within_range(&self, min_mz: f64, max_mz: f64) -> usize {
        self.extract_indices(min_mz, max_mz).len()
    }

    /// Find the index of the peak nearest to `mz`.
    ///
    /// Targets beyond either end of the spectrum resolve to the nearest end, and
    /// an exact midpoint resolves to the lower peak.
    pub fn closest_peak_index(&self, mz: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.mz.partition_point(|x| *x < mz);
        if i == 0 {
            return Some(0);
        }
        if i >= self.len() {
            return Some(self.len() - 1);
        }
        if mz - self.mz[i - 1] > self.mz[i] - mz {
            Some(i)
        } else {
            Some(i - 1)
        }
    }

    pub fn closest_peak(&self, mz: f64) -> Option<MzPeak> {
        self.closest_peak_index(mz).and_then(|i| self.get(i))
    }

    /// Find the index of the closest peak to `mz` if it is within `tolerance` of it
    pub fn has_peak(&self, mz: f64, tolerance: Tolerance) -> Option<usize> {
        self.closest_peak_index(mz)
            .filter(|i| tolerance.within(self.mz[*i], mz))
    }

    /// Iterate over the peaks with `min_intensity <= intensity <= max_intensity`
    pub fn filter_by_intensity(
        &self,
        min_intensity: f64,
        max_intensity: f64,
    ) -> impl Iterator<Item = MzPeak> + '_ {
        self.iter()
            .filter(move |p| min_intensity <= p.intensity && p.intensity <= max_intensity)
    }

    /// Iterate over the `top_n` most intense peaks in m/z order. Peaks tied with the
    /// weakest selected peak are included too.
    pub fn filter_by_number_of_most_intense(
        &self,
        top_n: usize,
    ) -> impl Iterator<Item = MzPeak> + '_ {
        let cutoff = if top_n == 0 {
            f64::INFINITY
        } else {
            self.intensity
                .iter()
                .copied()
                .sorted_by(|a, b| b.total_cmp(a))
                .nth(top_n - 1)
                .unwrap_or(f64::NEG_INFINITY)
        };
        self.iter().filter(move |p| p.intensity >= cutoff)
    }

    /// A new spectrum holding only the peaks inside `range`
    pub fn filtered_to_range(&self, range: &MzRange) -> Self {
        let span = self.extract_indices(range.min, range.max);
        let mut this = Self {
            mz: self.mz[span.clone()].to_vec(),
            intensity: self.intensity[span].to_vec(),
            total_intensity: 0.0,
            base_peak_index: None,
        };
        this.update_summaries();
        this
    }

    fn retain_indices<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = (0..self.len())
            .filter(|i| keep(*i))
            .map(|i| (self.mz[i], self.intensity[i]))
            .unzip();
        self.mz = mz;
        self.intensity = intensity;
        self.update_summaries();
    }

    /// Split the spectrum's m/z span into `num_windows` equal windows and keep at most
    /// `top_n` of the most intense peaks in each, replacing the backing arrays.
    pub fn filter_top_n_per_window(&mut self, top_n: usize, num_windows: usize) {
        let Some(range) = self.range() else {
            return;
        };
        let num_windows = num_windows.max(1);
        let width = range.width() / num_windows as f64;
        let window_of = |mz: f64| -> usize {
            if width <= 0.0 {
                0
            } else {
                (((mz - range.min) / width) as usize).min(num_windows - 1)
            }
        };
        let mut keep = vec![false; self.len()];
        let groups = (0..self.len()).group_by(|i| window_of(self.mz[*i]));
        for (_, members) in &groups {
            members
                .sorted_by(|a, b| {
                    self.intensity[*b]
                        .total_cmp(&self.intensity[*a])
                        .then(a.cmp(b))
                })
                .take(top_n)
                .for_each(|i| keep[i] = true);
        }
        let before = self.len();
        self.retain_indices(|i| keep[i]);
        trace!(
            "Kept {} of {before} peaks over {num_windows} windows",
            self.len()
        );
    }

    /// Remove every peak within `discard_width` of `precursor_mz`, replacing the
    /// backing arrays.
    pub fn exclude_precursor(&mut self, precursor_mz: f64, discard_width: f64) {
        let window = MzRange::new(precursor_mz - discard_width, precursor_mz + discard_width);
        let mz = self.mz.clone();
        self.retain_indices(|i| !window.contains(mz[i]));
    }

    /// The normalized dot product of this spectrum's intensities with `other`'s,
    /// pairing peaks within `tolerance` of each other in a single merge pass.
    /// Unpaired peaks contribute against zero.
    pub fn dot_product_similarity(&self, other: &Spectrum, tolerance: Tolerance) -> f64 {
        let mut i = 0;
        let mut j = 0;
        let mut numerator = 0.0;
        while i < self.len() && j < other.len() {
            let a = self.mz[i];
            let b = other.mz[j];
            if tolerance.within(a, b) {
                numerator += self.intensity[i] * other.intensity[j];
                i += 1;
                j += 1;
            } else if a > b {
                j += 1;
            } else {
                i += 1;
            }
        }
        let norm_a = self.intensity.iter().map(|y| y * y).sum::<f64>().sqrt();
        let norm_b = other.intensity.iter().map(|y| y * y).sum::<f64>().sqrt();
        let denominator = norm_a * norm_b;
        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }
}

impl AsRef<Spectrum> for Spectrum {
    fn as_ref(&self) -> &Spectrum {
        self
    }
}

impl FromIterator<MzPeak> for Spectrum {
    fn from_iter<T: IntoIterator<Item = MzPeak>>(iter: T) -> Self {
        let peaks: Vec<MzPeak> = iter.into_iter().collect();
        Self::from_peaks(&peaks)
    }
}

/// A peak that already carries a neutral mass and charge
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeutralMassPeak {
    pub neutral_mass: f64,
    pub intensity: f64,
    pub charge: i32,
}

impl CoordinateLike<Mass> for NeutralMassPeak {
    fn coordinate(&self) -> f64 {
        self.neutral_mass
    }
}

impl IntensityMeasurement for NeutralMassPeak {
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

impl KnownCharge for NeutralMassPeak {
    fn charge(&self) -> i32 {
        self.charge
    }
}

/// A spectrum whose peaks have already been charge-assigned upstream, stored as
/// three parallel arrays sorted by ascending neutral mass.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeutralMassSpectrum {
    mass: Vec<f64>,
    intensity: Vec<f64>,
    charge: Vec<i32>,
}

impl NeutralMassSpectrum {
    /// # Errors
    /// [`DeconvolutionError::InputShapeError`] if the three arrays differ in length, and
    /// [`DeconvolutionError::ConfigurationError`] if any charge is zero.
    pub fn new(
        mut mass: Vec<f64>,
        intensity: Vec<f64>,
        charge: Vec<i32>,
    ) -> Result<Self, DeconvolutionError> {
        if mass.len() != intensity.len() || mass.len() != charge.len() {
            return Err(DeconvolutionError::InputShapeError {
                mz: mass.len(),
                intensity: intensity.len(),
                charge: Some(charge.len()),
            });
        }
        if let Some(i) = charge.iter().position(|z| *z == 0) {
            return Err(DeconvolutionError::ConfigurationError(format!(
                "Neutral mass peak {i} at {} has charge 0",
                mass[i]
            )));
        }
        let mut paired: Vec<(f64, i32)> = intensity.into_iter().zip(charge).collect();
        sort_parallel(&mut mass, &mut paired);
        let (intensity, charge) = paired.into_iter().unzip();
        Ok(Self {
            mass,
            intensity,
            charge,
        })
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NeutralMassPeak> {
        Some(NeutralMassPeak {
            neutral_mass: *self.mass.get(index)?,
            intensity: *self.intensity.get(index)?,
            charge: *self.charge.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = NeutralMassPeak> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().sum()
    }

    /// The peaks with `min_mass <= neutral_mass <= max_mass`
    pub fn extract(
        &self,
        min_mass: f64,
        max_mass: f64,
    ) -> impl Iterator<Item = NeutralMassPeak> + '_ {
        let start = self.mass.partition_point(|x| *x < min_mass);
        let end = self.mass.partition_point(|x| *x <= max_mass).max(start);
        (start..end).filter_map(|i| self.get(i))
    }
}

/// Compare two intensities so that the larger sorts first, NaN last
#[inline]
pub(crate) fn descending_intensity(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod test {
    use super::*;
    use mzpeaks::CentroidPeak;

    fn make_spectrum() -> Spectrum {
        Spectrum::new(
            vec![100.0, 200.0, 300.0, 400.0, 500.0],
            vec![10.0, 50.0, 20.0, 50.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            DeconvolutionError::InputShapeError {
                mz: 2,
                intensity: 1,
                charge: None
            }
        );
        let err = NeutralMassSpectrum::new(vec![1.0, 2.0], vec![1.0, 2.0], vec![1]).unwrap_err();
        assert!(matches!(
            err,
            DeconvolutionError::InputShapeError {
                charge: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn test_resorts_input() {
        let spec = Spectrum::new(vec![300.0, 100.0, 200.0], vec![3.0, 1.0, 2.0]).unwrap();
        assert_eq!(spec.mz_array(), &[100.0, 200.0, 300.0]);
        assert_eq!(spec.intensity_array(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_summaries() {
        let spec = make_spectrum();
        assert_eq!(spec.total_intensity(), 135.0);
        assert_eq!(spec.base_peak_index(), Some(1));
        assert_eq!(spec.max_intensity(), 50.0);
        assert_eq!(spec.range(), Some(MzRange::new(100.0, 500.0)));

        let empty = Spectrum::default();
        assert!(empty.base_peak().is_none());
        assert!(empty.range().is_none());
        assert_eq!(empty.total_intensity(), 0.0);
    }

    #[test]
    fn test_closest_peak() {
        let spec = make_spectrum();
        assert_eq!(spec.closest_peak_index(50.0), Some(0));
        assert_eq!(spec.closest_peak_index(1000.0), Some(4));
        assert_eq!(spec.closest_peak_index(240.0), Some(1));
        assert_eq!(spec.closest_peak_index(260.0), Some(2));
        assert_eq!(spec.closest_peak_index(250.0), Some(1));
        assert_eq!(spec.closest_peak_index(300.0), Some(2));
        assert_eq!(spec.closest_peak(499.0).unwrap().mz, 500.0);
        assert!(Spectrum::default().closest_peak(100.0).is_none());

        assert_eq!(spec.has_peak(200.001, Tolerance::Ppm(10.0)), Some(1));
        assert_eq!(spec.has_peak(200.01, Tolerance::Ppm(10.0)), None);
    }

    #[test]
    fn test_extract() {
        let spec = make_spectrum();
        let found: Vec<_> = spec.extract(200.0, 400.0).map(|p| p.mz).collect();
        assert_eq!(found, vec![200.0, 300.0, 400.0]);
        let it = spec.extract(150.0, 350.0);
        assert_eq!(it.clone().count(), 2);
        assert_eq!(it.count(), 2);
        assert_eq!(spec.extract(600.0, 700.0).count(), 0);
        assert_eq!(spec.extract(400.0, 200.0).count(), 0);

        assert_eq!(spec.num_peaks_within_range(300.0, 300.0), 1);
        assert_eq!(spec.num_peaks_within_range(301.0, 301.0), 0);
        assert_eq!(spec.num_peaks_within_range(0.0, 1000.0), 5);
        assert_eq!(spec.num_peaks_within_range(0.0, 50.0), 0);
    }

    #[test]
    fn test_intensity_filters() {
        let spec = make_spectrum();
        let kept: Vec<_> = spec.filter_by_intensity(10.0, 20.0).map(|p| p.mz).collect();
        assert_eq!(kept, vec![100.0, 300.0]);

        let kept: Vec<_> = spec.filter_by_number_of_most_intense(2).map(|p| p.mz).collect();
        assert_eq!(kept, vec![200.0, 400.0]);
        let kept: Vec<_> = spec.filter_by_number_of_most_intense(3).map(|p| p.mz).collect();
        assert_eq!(kept, vec![200.0, 300.0, 400.0]);
        assert_eq!(spec.filter_by_number_of_most_intense(0).count(), 0);
        assert_eq!(spec.filter_by_number_of_most_intense(50).count(), 5);
    }

    #[test]
    fn test_in_place_transforms() {
        let mut spec = make_spectrum();
        spec.filter_top_n_per_window(1, 2);
        assert_eq!(spec.mz_array(), &[200.0, 400.0]);
        assert_eq!(spec.total_intensity(), 100.0);

        let mut spec = make_spectrum();
        spec.exclude_precursor(300.0, 1.5);
        assert_eq!(spec.mz_array(), &[100.0, 200.0, 400.0, 500.0]);
        assert_eq!(spec.base_peak_index(), Some(1));
    }

    #[test]
    fn test_dot_product() {
        let spec = make_spectrum();
        let same = spec.dot_product_similarity(&spec, Tolerance::Ppm(10.0));
        assert!((same - 1.0).abs() < 1e-12);

        let other = Spectrum::new(vec![1000.0], vec![5.0]).unwrap();
        assert_eq!(spec.dot_product_similarity(&other, Tolerance::Ppm(10.0)), 0.0);
    }

    #[test]
    fn test_from_centroids() {
        let peaks = vec![
            CentroidPeak::new(250.0, 4.0, 0),
            CentroidPeak::new(150.0, 8.0, 1),
        ];
        let spec = Spectrum::from_peaks(&peaks);
        assert_eq!(spec.mz_array(), &[150.0, 250.0]);
        assert_eq!(spec.intensity_array(), &[8.0, 4.0]);
    }

    #[test]
    fn test_neutral_mass_spectrum() {
        let spec =
            NeutralMassSpectrum::new(vec![2000.0, 1000.0], vec![5.0, 10.0], vec![2, 1]).unwrap();
        let first = spec.get(0).unwrap();
        assert_eq!(first.neutral_mass, 1000.0);
        assert_eq!(first.charge, 1);
        assert_eq!(spec.extract(1500.0, 2500.0).count(), 1);
        assert_eq!(spec.total_intensity(), 15.0);

        let err = NeutralMassSpectrum::new(vec![1000.0, 2000.0], vec![5.0, 10.0], vec![1, 0])
            .unwrap_err();
        assert!(matches!(err, DeconvolutionError::ConfigurationError(_)));
        assert!(err.to_string().contains("charge 0"));
    }
}

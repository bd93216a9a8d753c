//! Polarity and charge state enumeration
use std::cmp;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::deconv_traits::DeconvolutionError;
use crate::spectrum::Spectrum;

/// The ion polarity of a spectrum, which fixes the sign of every charge state in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    #[inline]
    pub fn sign(&self) -> i32 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
        }
    }

    /// Give `charge` this polarity's sign
    #[inline]
    pub fn signed(&self, charge: i32) -> i32 {
        charge.abs() * self.sign()
    }

    pub fn of_charge(charge: i32) -> Option<Self> {
        match charge.cmp(&0) {
            cmp::Ordering::Greater => Some(Self::Positive),
            cmp::Ordering::Less => Some(Self::Negative),
            cmp::Ordering::Equal => None,
        }
    }
}

impl Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Positive => f.write_str("positive"),
            Polarity::Negative => f.write_str("negative"),
        }
    }
}

impl FromStr for Polarity {
    type Err = DeconvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "+" | "pos" => Ok(Self::Positive),
            "negative" | "-" | "neg" => Ok(Self::Negative),
            _ => Err(DeconvolutionError::ConfigurationError(format!(
                "Unknown polarity {s:?}"
            ))),
        }
    }
}

pub type ChargeRange = (i32, i32);

/// Check that `(min_charge, max_charge)` describes a usable range for `polarity`.
///
/// Neither bound may be zero, both must share `polarity`'s sign (unsigned
/// positive values are accepted for negative polarity and flipped later), and
/// `|min_charge| <= |max_charge|`.
pub fn validate_charge_range(
    min_charge: i32,
    max_charge: i32,
    polarity: Polarity,
) -> Result<(), DeconvolutionError> {
    if min_charge == 0 || max_charge == 0 {
        return Err(DeconvolutionError::ConfigurationError(
            "A charge state of 0 is invalid".to_string(),
        ));
    }
    if min_charge.signum() != max_charge.signum() {
        return Err(DeconvolutionError::ConfigurationError(format!(
            "Charge range bounds {min_charge} and {max_charge} have different signs"
        )));
    }
    if polarity == Polarity::Positive && min_charge < 0 {
        return Err(DeconvolutionError::ConfigurationError(format!(
            "Negative charge range {min_charge}..={max_charge} with positive polarity"
        )));
    }
    if min_charge.abs() > max_charge.abs() {
        return Err(DeconvolutionError::ConfigurationError(format!(
            "Minimum charge {min_charge} exceeds maximum charge {max_charge}"
        )));
    }
    Ok(())
}

/// Iterate over the charge states between two bounds inclusive, in ascending
/// absolute value, with a fixed sign.
#[derive(Debug, Clone)]
pub struct ChargeRangeIter {
    pub min: i32,
    pub max: i32,
    pub sign: i32,
    index: usize,
    size: usize,
}

impl ChargeRangeIter {
    pub fn new(min: i32, max: i32, polarity: Polarity) -> ChargeRangeIter {
        let low = cmp::min(min.abs(), max.abs()).max(1);
        let high = cmp::max(min.abs(), max.abs());
        let size = if high >= low {
            (high - low + 1) as usize
        } else {
            0
        };
        ChargeRangeIter {
            min: low,
            max: high,
            sign: polarity.sign(),
            index: 0,
            size,
        }
    }

    pub fn next_charge(&mut self) -> Option<i32> {
        if self.index >= self.size {
            None
        } else {
            let i = (self.min + self.index as i32) * self.sign;
            self.index += 1;
            Some(i)
        }
    }
}

impl Iterator for ChargeRangeIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.next_charge()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.size.saturating_sub(self.index);
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for ChargeRangeIter {}

/// Guess the charge states a seed peak might carry from the m/z spacing of the
/// peaks up to 1.1 Th above it.
///
/// A spacing of `d` suggests `floor(1 / d)` and `floor(1 / d) + 1`, and only
/// candidates within `[min_charge, max_charge]` by absolute value are kept. The
/// result is ordered by ascending absolute value and carries `polarity`'s sign.
pub fn candidate_charges_from_spacing(
    spectrum: &Spectrum,
    seed_index: usize,
    charge_range: ChargeRange,
    polarity: Polarity,
) -> Vec<i32> {
    let low = cmp::min(charge_range.0.abs(), charge_range.1.abs());
    let high = cmp::max(charge_range.0.abs(), charge_range.1.abs());
    let seed_mz = spectrum.mz(seed_index);
    let mut charges = BTreeSet::new();
    for mz in spectrum.mz_array().iter().skip(seed_index + 1) {
        let diff = mz - seed_mz;
        if diff > 1.1 {
            break;
        }
        if diff <= 0.0 {
            continue;
        }
        let guess = (1.0 / diff).floor();
        if guess > high as f64 {
            continue;
        }
        let guess = guess as i32;
        for z in [guess, guess + 1] {
            if low <= z && z <= high {
                charges.insert(z);
            }
        }
    }
    charges.into_iter().map(|z| polarity.signed(z)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_range_iter() {
        let charges: Vec<_> = ChargeRangeIter::new(1, 5, Polarity::Positive).collect();
        assert_eq!(charges, vec![1, 2, 3, 4, 5]);
        let charges: Vec<_> = ChargeRangeIter::new(-1, -3, Polarity::Negative).collect();
        assert_eq!(charges, vec![-1, -2, -3]);
        let charges: Vec<_> = ChargeRangeIter::new(2, 4, Polarity::Negative).collect();
        assert_eq!(charges, vec![-2, -3, -4]);
        assert_eq!(ChargeRangeIter::new(3, 3, Polarity::Positive).len(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(validate_charge_range(1, 10, Polarity::Positive).is_ok());
        assert!(validate_charge_range(-1, -10, Polarity::Negative).is_ok());
        assert!(validate_charge_range(1, 10, Polarity::Negative).is_ok());
        assert!(validate_charge_range(0, 10, Polarity::Positive).is_err());
        assert!(validate_charge_range(5, 2, Polarity::Positive).is_err());
        assert!(validate_charge_range(-2, 5, Polarity::Positive).is_err());
        assert!(validate_charge_range(-1, -5, Polarity::Positive).is_err());
    }

    #[test]
    fn test_spacing_charges() {
        let spectrum = Spectrum::new(
            vec![500.0, 500.334, 500.5017, 500.669, 502.0],
            vec![100.0, 80.0, 70.0, 60.0, 50.0],
        )
        .unwrap();
        let charges = candidate_charges_from_spacing(&spectrum, 0, (1, 10), Polarity::Positive);
        assert_eq!(charges, vec![1, 2, 3]);

        let charges = candidate_charges_from_spacing(&spectrum, 0, (3, 10), Polarity::Negative);
        assert_eq!(charges, vec![-3]);

        let charges = candidate_charges_from_spacing(&spectrum, 4, (1, 10), Polarity::Positive);
        assert!(charges.is_empty());
    }

    #[test]
    fn test_polarity() {
        assert_eq!(Polarity::Negative.signed(3), -3);
        assert_eq!(Polarity::Positive.signed(-3), 3);
        assert_eq!(Polarity::of_charge(-2), Some(Polarity::Negative));
        assert_eq!(Polarity::of_charge(0), None);
        assert_eq!("negative".parse::<Polarity>().unwrap(), Polarity::Negative);
        assert!("sideways".parse::<Polarity>().is_err());
    }
}

//! Mass accuracy windows and m/z intervals
use std::fmt::Display;
use std::str::FromStr;

use crate::deconv_traits::DeconvolutionError;

/// An inclusive interval over the m/z (or mass) axis
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MzRange {
    pub min: f64,
    pub max: f64,
}

impl MzRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn mean(&self) -> f64 {
        (self.max + self.min) / 2.0
    }

    pub fn is_overlapping(&self, other: &MzRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Whether `self` lies entirely within `other`
    pub fn is_sub_range(&self, other: &MzRange) -> bool {
        other.min <= self.min && self.max <= other.max
    }

    pub fn is_super_range(&self, other: &MzRange) -> bool {
        other.is_sub_range(self)
    }

    /// Grow the interval by `amount` on both sides
    pub fn widen(&self, amount: f64) -> Self {
        Self::new(self.min - amount, self.max + amount)
    }

    /// Whether the majority of `values` fall within the interval
    pub fn contains_majority(&self, values: &[f64]) -> bool {
        let inside = values.iter().filter(|v| self.contains(**v)).count();
        inside > values.len() / 2
    }
}

impl From<(f64, f64)> for MzRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl Display for MzRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{};{}]", self.min, self.max)
    }
}

/// A window around an expected value within which an observed value is
/// considered a match.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tolerance {
    /// Parts-per-million relative to the expected value
    Ppm(f64),
    /// A fixed width in the units of the values compared
    Absolute(f64),
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::Ppm(10.0)
    }
}

impl Tolerance {
    pub fn value(&self) -> f64 {
        match self {
            Tolerance::Ppm(v) => *v,
            Tolerance::Absolute(v) => *v,
        }
    }

    /// The equivalent [`mzpeaks::Tolerance`], which carries out the arithmetic
    pub fn as_mzpeaks(&self) -> mzpeaks::Tolerance {
        match self {
            Tolerance::Ppm(v) => mzpeaks::Tolerance::PPM(v.abs()),
            Tolerance::Absolute(v) => mzpeaks::Tolerance::Da(v.abs()),
        }
    }

    /// Test whether `observed` lies within this tolerance of `expected`
    #[inline]
    pub fn within(&self, observed: f64, expected: f64) -> bool {
        self.as_mzpeaks().test(observed, expected)
    }

    /// The interval of values matching `center` under this tolerance
    #[inline]
    pub fn range(&self, center: f64) -> MzRange {
        let (low, high) = self.as_mzpeaks().bounds(center);
        MzRange::new(low.min(high), low.max(high))
    }

    /// The signed error of `observed` relative to `expected` in this tolerance's units
    pub fn error(&self, observed: f64, expected: f64) -> f64 {
        self.as_mzpeaks().call(observed, expected)
    }

    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        let v = self.value();
        if !v.is_finite() || v < 0.0 {
            Err(DeconvolutionError::ConfigurationError(format!(
                "Tolerance value must be a finite non-negative number, got {v}"
            )))
        } else {
            Ok(())
        }
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tolerance::Ppm(v) => write!(f, "{v} PPM"),
            Tolerance::Absolute(v) => write!(f, "{v} Absolute"),
        }
    }
}

impl FromStr for Tolerance {
    type Err = DeconvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let (value, unit) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(value), Some(unit), None) => (value, unit),
            _ => {
                return Err(DeconvolutionError::ConfigurationError(format!(
                    "Could not parse tolerance from {s:?}, expected \"<value> <unit>\""
                )))
            }
        };
        let value: f64 = value.parse().map_err(|e| {
            DeconvolutionError::ConfigurationError(format!(
                "Could not parse tolerance value {value:?}: {e}"
            ))
        })?;
        match unit.to_ascii_lowercase().as_str() {
            "ppm" => Ok(Self::Ppm(value)),
            "absolute" | "da" | "th" => Ok(Self::Absolute(value)),
            _ => Err(DeconvolutionError::ConfigurationError(format!(
                "Unknown tolerance unit {unit:?}"
            ))),
        }
    }
}

impl From<Tolerance> for mzpeaks::Tolerance {
    fn from(value: Tolerance) -> Self {
        match value {
            Tolerance::Ppm(v) => mzpeaks::Tolerance::PPM(v),
            Tolerance::Absolute(v) => mzpeaks::Tolerance::Da(v),
        }
    }
}

impl From<mzpeaks::Tolerance> for Tolerance {
    fn from(value: mzpeaks::Tolerance) -> Self {
        match value {
            mzpeaks::Tolerance::PPM(v) => Tolerance::Ppm(v),
            mzpeaks::Tolerance::Da(v) => Tolerance::Absolute(v),
        }
    }
}

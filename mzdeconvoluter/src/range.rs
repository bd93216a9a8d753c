use std::{error::Error, fmt::Display, num::ParseFloatError};

use mzdeconvolute::MzRange;

#[derive(Debug)]
pub enum MzRangeParseError {
    MalformedStart(ParseFloatError),
    MalformedEnd(ParseFloatError),
    Inverted(f64, f64),
}

impl Display for MzRangeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MzRangeParseError::MalformedStart(e) => {
                write!(f, "Failed to parse m/z range start {e}")
            }
            MzRangeParseError::MalformedEnd(e) => {
                write!(f, "Failed to parse m/z range end {e}")
            }
            MzRangeParseError::Inverted(start, end) => {
                write!(f, "The m/z range start {start} is greater than its end {end}")
            }
        }
    }
}

impl Error for MzRangeParseError {}

/// Parse an m/z interval denoted `(start?)-(end?)`, `(start?):(end?)` or
/// `(start?) (end?)`. A missing start is 0, a missing end is unbounded.
pub fn parse_mz_range(s: &str) -> Result<MzRange, MzRangeParseError> {
    let s = s.trim();
    let mut tokens = if s.contains(' ') {
        s.splitn(2, ' ')
    } else if s.contains(':') {
        s.splitn(2, ':')
    } else if s.contains('-') {
        s.splitn(2, '-')
    } else {
        s.splitn(2, ' ')
    };
    let start_s = tokens.next().unwrap_or_default().trim();
    let start = if start_s.is_empty() {
        0.0
    } else {
        start_s.parse().map_err(MzRangeParseError::MalformedStart)?
    };
    let end_s = tokens.next().unwrap_or_default().trim();
    let end = if end_s.is_empty() {
        f64::INFINITY
    } else {
        end_s.parse().map_err(MzRangeParseError::MalformedEnd)?
    };
    if start > end {
        return Err(MzRangeParseError::Inverted(start, end));
    }
    Ok(MzRange::new(start, end))
}

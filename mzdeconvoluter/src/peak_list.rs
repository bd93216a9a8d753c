//! Reading tab-separated peak lists.
//!
//! Each non-empty line holds an m/z and an intensity separated by whitespace.
//! Blank lines separate spectra and lines starting with `#` are ignored.
use std::io::BufRead;

use mzdeconvolute::Spectrum;

use crate::driver::MZDeconvoluterError;

pub struct PeakListReader<R: BufRead> {
    handle: R,
    line_number: usize,
    buffer: String,
    done: bool,
}

impl<R: BufRead> PeakListReader<R> {
    pub fn new(handle: R) -> Self {
        Self {
            handle,
            line_number: 0,
            buffer: String::new(),
            done: false,
        }
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn malformed(&self, message: String) -> MZDeconvoluterError {
        MZDeconvoluterError::MalformedPeakList {
            line: self.line_number,
            message,
        }
    }

    fn parse_field(&self, field: Option<&str>, name: &str) -> Result<f64, MZDeconvoluterError> {
        let field = field.ok_or_else(|| self.malformed(format!("missing {name} column")))?;
        let value: f64 = field
            .parse()
            .map_err(|e| self.malformed(format!("invalid {name} {field:?}: {e}")))?;
        if !value.is_finite() {
            return Err(self.malformed(format!("{name} must be finite, got {field}")));
        }
        Ok(value)
    }

    /// Read the next block of peaks, returning `None` once the input is exhausted
    pub fn read_next(&mut self) -> Option<Result<Spectrum, MZDeconvoluterError>> {
        if self.done {
            return None;
        }
        let mut mz_array = Vec::new();
        let mut intensity_array = Vec::new();
        loop {
            self.buffer.clear();
            let n = match self.handle.read_line(&mut self.buffer) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if n == 0 {
                self.done = true;
                break;
            }
            self.line_number += 1;
            let line = self.buffer.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                if mz_array.is_empty() {
                    continue;
                }
                break;
            }
            let mut fields = line.split_whitespace();
            let mz = match self.parse_field(fields.next(), "m/z") {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let intensity = match self.parse_field(fields.next(), "intensity") {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            mz_array.push(mz);
            intensity_array.push(intensity);
        }
        if mz_array.is_empty() {
            return None;
        }
        Some(Spectrum::new(mz_array, intensity_array).map_err(MZDeconvoluterError::from))
    }
}

impl<R: BufRead> Iterator for PeakListReader<R> {
    type Item = Result<Spectrum, MZDeconvoluterError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn test_read_blocks() {
        let text = "# header\n100.0\t5.0\n101.0\t3.0\n\n\n200.5 7.0\n199.5 1.0\n";
        let reader = PeakListReader::new(io::Cursor::new(text));
        let spectra: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra[0].mz_array(), &[100.0, 101.0]);
        assert_eq!(spectra[1].mz_array(), &[199.5, 200.5]);
        assert_eq!(spectra[1].intensity_array(), &[1.0, 7.0]);
    }

    #[test]
    fn test_empty_input() {
        let mut reader = PeakListReader::new(io::Cursor::new("\n# nothing\n\n"));
        assert!(reader.next().is_none());
        assert_eq!(reader.line_number(), 3);
    }

    #[test]
    fn test_malformed_line() {
        let text = "100.0\t5.0\n101.0\n";
        let mut reader = PeakListReader::new(io::Cursor::new(text));
        let err = reader.next().unwrap().unwrap_err();
        match err {
            MZDeconvoluterError::MalformedPeakList { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("intensity"));
            }
            other => panic!("Unexpected error {other}"),
        }
        assert!(reader.next().is_none());

        let mut reader = PeakListReader::new(io::Cursor::new("abc\t1.0\n"));
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}

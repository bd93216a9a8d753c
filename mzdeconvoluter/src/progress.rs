use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub spectra: usize,
    pub peaks: usize,
    pub envelopes: usize,
    pub empty_spectra: usize,
}

impl ProgressRecord {
    pub fn for_spectrum(peaks: usize, envelopes: usize) -> Self {
        Self {
            spectra: 1,
            peaks,
            envelopes,
            empty_spectra: usize::from(envelopes == 0),
        }
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.spectra += rhs.spectra;
        self.peaks += rhs.peaks;
        self.envelopes += rhs.envelopes;
        self.empty_spectra += rhs.empty_spectra;
    }
}

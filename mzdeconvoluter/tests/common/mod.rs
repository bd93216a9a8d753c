#![allow(dead_code)]
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use mzdeconvolute::isotopic_model::{averagine_table, mass_to_mz, IsotopicModels};

/// A species taken directly from the averagine table near `approximate_mass`,
/// returned with its exact monoisotopic mass and its peaks at `charge`
pub fn averagine_species(approximate_mass: f64, charge: i32, scale: f64) -> (f64, Vec<(f64, f64)>) {
    let table = averagine_table(IsotopicModels::Peptide);
    let entry = &table.entries()[table.closest_by_monoisotopic(approximate_mass).unwrap()];
    let peaks = entry
        .isotopes
        .iter()
        .map(|iso| (mass_to_mz(iso.mass, charge), iso.abundance * scale))
        .collect();
    (entry.monoisotopic_mass, peaks)
}

pub fn write_peak_list<W: Write>(writer: &mut W, spectra: &[Vec<(f64, f64)>]) -> io::Result<()> {
    writeln!(writer, "# m/z\tintensity")?;
    for (i, peaks) in spectra.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        for (mz, intensity) in peaks {
            writeln!(writer, "{mz}\t{intensity}")?;
        }
    }
    Ok(())
}

pub fn tmp_path(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("mzdeconvoluter");
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Write two spectra to `name`: a 1.2 kDa species at charge 2, then a 2.5 kDa
/// species at charge 3. Returns the path and both monoisotopic masses.
pub fn two_spectrum_peak_list(name: &str) -> (PathBuf, [f64; 2]) {
    let (first_mass, first) = averagine_species(1200.0, 2, 1e4);
    let (second_mass, second) = averagine_species(2500.0, 3, 5e3);
    let path = tmp_path(name);
    let mut handle = fs::File::create(&path).unwrap();
    write_peak_list(&mut handle, &[first, second]).unwrap();
    (path, [first_mass, second_mass])
}

/// Parse the envelope table written by the driver into (spectrum index, neutral mass, charge)
pub fn read_envelope_table(text: &str) -> Vec<(usize, f64, i32)> {
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("spectrum_index\tneutral_mass\tcharge"));
    lines
        .map(|line| {
            let fields: Vec<_> = line.split('\t').collect();
            (
                fields[0].parse().unwrap(),
                fields[1].parse().unwrap(),
                fields[2].parse().unwrap(),
            )
        })
        .collect()
}

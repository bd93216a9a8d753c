use std::io::BufRead;
use std::time::Instant;

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use mzdeconvolute::{Deconvoluter, IsotopicEnvelope, MzRange, Spectrum};

use crate::driver::MZDeconvoluterError;
use crate::peak_list::PeakListReader;
use crate::progress::ProgressRecord;

#[instrument(level = "debug", skip(deconvoluter, spectrum))]
fn deconvolution_transform(
    deconvoluter: &Deconvoluter,
    spectrum_idx: usize,
    spectrum: &Spectrum,
    mz_range: Option<MzRange>,
) -> Result<Vec<IsotopicEnvelope>, MZDeconvoluterError> {
    let envelopes = deconvoluter.deconvolute(spectrum, mz_range)?;
    if envelopes.is_empty() && !spectrum.is_empty() {
        debug!(
            "No envelopes found among {} peaks of spectrum {spectrum_idx}",
            spectrum.len()
        );
    }
    Ok(envelopes)
}

/// Deconvolve every spectrum `reader` yields on the current thread pool, sending
/// each result tagged with its position in the input.
///
/// Stops at the first malformed spectrum or failed deconvolution.
pub(crate) fn prepare_processing<R: BufRead + Send>(
    reader: PeakListReader<R>,
    deconvoluter: &Deconvoluter,
    mz_range: Option<MzRange>,
    sender: Sender<(usize, Vec<IsotopicEnvelope>)>,
) -> Result<ProgressRecord, MZDeconvoluterError> {
    let started = Instant::now();
    let prog = reader
        .enumerate()
        .par_bridge()
        .map(|(spectrum_idx, spectrum)| {
            let spectrum = spectrum?;
            let envelopes =
                deconvolution_transform(deconvoluter, spectrum_idx, &spectrum, mz_range)?;
            let prog = ProgressRecord::for_spectrum(spectrum.len(), envelopes.len());
            if let Err(e) = sender.send((spectrum_idx, envelopes)) {
                warn!("Failed to send spectrum {spectrum_idx}: {e}");
            }
            Ok(prog)
        })
        .try_reduce(ProgressRecord::default, |a, b| Ok(a + b));
    debug!(
        "Deconvolution finished in {:0.3?}",
        Instant::now() - started
    );
    prog
}

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use itertools::Itertools;
use mzpeaks::{DeconvolutedPeak, IntensityMeasurement, KnownCharge};
use tracing::{debug, error, info};

use mzdeconvolute::IsotopicEnvelope;

pub const OUTPUT_COLUMNS: [&str; 9] = [
    "spectrum_index",
    "neutral_mass",
    "charge",
    "monoisotopic_mz",
    "most_abundant_mass",
    "intensity",
    "score",
    "num_peaks",
    "algorithm",
];

/// Re-orders values received out of order by their key
#[derive(Debug)]
pub struct Collator<T: Send> {
    pub waiting: HashMap<usize, T>,
    pub next_key: usize,
    pub done: bool,
}

impl<T: Send> Default for Collator<T> {
    fn default() -> Self {
        Self {
            waiting: Default::default(),
            next_key: Default::default(),
            done: Default::default(),
        }
    }
}

impl<T: Send> Collator<T> {
    pub fn receive(&mut self, key: usize, value: T) {
        self.waiting.insert(key, value);
    }

    pub fn try_next(&mut self) -> Option<(usize, T)> {
        let item = self.waiting.remove_entry(&self.next_key)?;
        self.next_key += 1;
        Some(item)
    }

    /// Remove every waiting value in key order, skipping over gaps
    pub fn drain_sorted(&mut self) -> Vec<(usize, T)> {
        let items = std::mem::take(&mut self.waiting)
            .into_iter()
            .sorted_by_key(|(k, _)| *k)
            .collect_vec();
        if let Some((k, _)) = items.last() {
            self.next_key = k + 1;
        }
        items
    }
}

fn drain_channel<T: Send>(
    collator: &mut Collator<T>,
    channel: &Receiver<(usize, T)>,
    batch_size: usize,
) -> bool {
    for b in 0..batch_size {
        match channel.try_recv() {
            Ok((key, value)) => collator.receive(key, value),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                debug!("Work queue finished after draining {b} items from the work queue");
                collator.done = true;
                break;
            }
        }
    }
    collator.done
}

/// Forward values from `receiver` to `sender` in ascending key order, starting from 0.
///
/// Once `receiver` disconnects, anything still waiting behind a missing key is
/// sent in key order.
pub fn collate_results<T: Send>(receiver: Receiver<(usize, T)>, sender: Sender<(usize, T)>) {
    let mut collator = Collator::default();
    let mut has_work = true;
    while has_work {
        match receiver.recv() {
            Ok((key, value)) => {
                collator.receive(key, value);
                drain_channel(&mut collator, &receiver, 1000);
            }
            Err(_) => {
                collator.done = true;
            }
        }

        while let Some((key, value)) = collator.try_next() {
            if let Err(e) = sender.send((key, value)) {
                error!("Failed to send {key} for writing: {e}");
                return;
            }
        }

        if collator.done {
            let n = collator.waiting.len();
            if n > 0 {
                debug!("Draining output queue, {n} items");
            }
            for (key, value) in collator.drain_sorted() {
                if let Err(e) = sender.send((key, value)) {
                    error!("Failed to send {key} for writing: {e}");
                    break;
                }
            }
            has_work = false;
        }
    }
    debug!("Collator done");
}

pub fn write_header<W: Write>(writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", OUTPUT_COLUMNS.join("\t"))
}

/// Write one row per envelope, returning the number of rows written
pub fn write_envelopes<W: Write>(
    writer: &mut W,
    spectrum_idx: usize,
    envelopes: &[IsotopicEnvelope],
) -> io::Result<usize> {
    for envelope in envelopes {
        let peak = DeconvolutedPeak::from(envelope);
        writeln!(
            writer,
            "{spectrum_idx}\t{:.6}\t{}\t{:.6}\t{:.6}\t{:.3}\t{:.6}\t{}\t{}",
            peak.neutral_mass,
            peak.charge(),
            envelope.monoisotopic_mz(),
            envelope.most_abundant_observed_isotopic_mass,
            peak.intensity(),
            envelope.score,
            envelope.len(),
            envelope.algorithm,
        )?;
    }
    Ok(envelopes.len())
}

pub fn write_output<W: Write>(
    mut writer: W,
    receiver: Receiver<(usize, Vec<IsotopicEnvelope>)>,
) -> io::Result<usize> {
    let mut spectrum_counter = 0usize;
    let mut row_counter = 0usize;
    let mut last_report = Instant::now();
    write_header(&mut writer)?;
    while let Ok((spectrum_idx, envelopes)) = receiver.recv() {
        spectrum_counter += 1;
        row_counter += write_envelopes(&mut writer, spectrum_idx, &envelopes)?;
        if last_report.elapsed().as_secs_f64() > 10.0 {
            let queue_size = receiver.len();
            info!(
                "Completed {} | Spectra={spectrum_counter} Rows={row_counter} Queue={queue_size}",
                spectrum_idx + 1
            );
            last_report = Instant::now();
        }
    }
    writer.flush()?;
    info!("Finished | Spectra={spectrum_counter} Rows={row_counter}");
    Ok(row_counter)
}

#[cfg(test)]
mod test {
    use super::*;

    use crossbeam_channel::unbounded;
    use mzdeconvolute::{DeconvolutionType, MzPeak};

    #[test]
    fn test_collate_reorders() {
        let (send_in, recv_in) = unbounded();
        let (send_out, recv_out) = unbounded();
        for key in [2usize, 0, 3, 1, 5] {
            send_in.send((key, key * 10)).unwrap();
        }
        drop(send_in);
        collate_results(recv_in, send_out);
        let keys: Vec<_> = recv_out.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 5]);
    }

    #[test]
    fn test_write_envelopes() {
        let envelope = IsotopicEnvelope::new(
            998.0,
            999.0,
            2,
            vec![MzPeak::new(500.0, 10.0), MzPeak::new(500.5, 20.0)],
            0.95,
            DeconvolutionType::IsoDec,
        );
        let mut buffer = Vec::new();
        write_header(&mut buffer).unwrap();
        let n = write_envelopes(&mut buffer, 7, &[envelope]).unwrap();
        assert_eq!(n, 1);
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("spectrum_index\tneutral_mass"));
        let fields: Vec<_> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), OUTPUT_COLUMNS.len());
        assert_eq!(fields[0], "7");
        assert_eq!(fields[1], "998.000000");
        assert_eq!(fields[2], "2");
        assert_eq!(fields[5], "30.000");
        assert_eq!(fields[7], "2");
        assert_eq!(fields[8], "isodec");
    }
}

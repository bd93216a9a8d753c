use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzdeconvolute::{
    DeconvolutionError, DeconvolutionParameters, DeconvolutionType, Deconvoluter, MzRange,
    Polarity,
};

use crate::args::ArgChargeRange;
use crate::peak_list::PeakListReader;
use crate::proc::prepare_processing;
use crate::write::{collate_results, write_output};

pub const BUFFER_SIZE: usize = 10_000;

#[derive(Debug, Error)]
pub enum MZDeconvoluterError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to load the configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Failed to serialize the configuration: {0}")]
    ConfigurationSerializationError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
    #[error(transparent)]
    DeconvolutionError(#[from] DeconvolutionError),
    #[error("Malformed peak list at line {line}: {message}")]
    MalformedPeakList { line: usize, message: String },
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

/// The resolved configuration of a batch deconvolution run.
///
/// `algorithm`, `charge_range` and `polarity` adjust `parameters` when both are
/// given. Without `parameters`, the defaults of `algorithm` are used.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MZDeconvoluter {
    pub input_file: String,
    pub output_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub threads: i32,
    pub write_buffer_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<DeconvolutionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_range: Option<ArgChargeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz_range: Option<MzRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<DeconvolutionParameters>,
}

impl Default for MZDeconvoluter {
    fn default() -> Self {
        Self {
            input_file: "-".to_string(),
            output_file: PathBuf::from("-"),
            log_file: None,
            threads: -1,
            write_buffer_size: BUFFER_SIZE,
            algorithm: None,
            charge_range: None,
            polarity: None,
            mz_range: None,
            parameters: None,
        }
    }
}

impl MZDeconvoluter {
    /// Combine the configured algorithm, charge range and polarity into one
    /// validated set of deconvolution parameters
    pub fn resolve_parameters(&self) -> Result<DeconvolutionParameters, DeconvolutionError> {
        let mut params = match (self.parameters, self.algorithm) {
            (Some(params), Some(algorithm)) if params.algorithm() != algorithm => {
                return Err(DeconvolutionError::ConfigurationError(format!(
                    "Requested the {algorithm} algorithm but the parameters are for {}",
                    params.algorithm()
                )))
            }
            (Some(params), _) => params,
            (None, Some(algorithm)) => DeconvolutionParameters::default_for(algorithm),
            (None, None) => DeconvolutionParameters::default(),
        };
        if let Some(polarity) = self.polarity {
            params.set_polarity(polarity);
        }
        if let Some(ArgChargeRange(low, high)) = self.charge_range {
            let polarity = params.polarity();
            params.set_charge_range(polarity.signed(low), polarity.signed(high));
        }
        params.validate()?;
        Ok(params)
    }

    pub fn to_toml(&self) -> Result<String, MZDeconvoluterError> {
        Ok(toml::to_string(self)?)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZDeconvoluterError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    pub fn main(&self) -> Result<(), MZDeconvoluterError> {
        info!(
            "mzdeconvoluter v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());

        let params = self.resolve_parameters()?;
        let deconvoluter = Deconvoluter::new(params)?;
        // Fail before reading any input when the algorithm cannot run
        deconvoluter.algorithm()?;
        info!(
            "Algorithm: {} | Charge Range: {}..={}",
            params.algorithm(),
            params.min_charge(),
            params.max_charge()
        );
        if let Some(mz_range) = self.mz_range {
            info!("m/z Range: {mz_range}");
        }

        self.create_threadpool()?
            .install(|| self.reader_then(deconvoluter))
    }

    fn reader_then(&self, deconvoluter: Deconvoluter) -> Result<(), MZDeconvoluterError> {
        if self.input_file == "-" {
            let reader = PeakListReader::new(io::BufReader::new(io::stdin()));
            self.writer_then(reader, deconvoluter)
        } else {
            let handle = io::BufReader::new(fs::File::open(&self.input_file)?);
            self.writer_then(PeakListReader::new(handle), deconvoluter)
        }
    }

    fn writer_then<R: BufRead + Send>(
        &self,
        reader: PeakListReader<R>,
        deconvoluter: Deconvoluter,
    ) -> Result<(), MZDeconvoluterError> {
        if self.output_file == PathBuf::from("-") {
            let writer = io::BufWriter::new(io::stdout());
            self.run_workflow(reader, writer, deconvoluter)
        } else {
            let writer = io::BufWriter::new(fs::File::create(&self.output_file)?);
            self.run_workflow(reader, writer, deconvoluter)
        }
    }

    fn run_workflow<R: BufRead + Send, W: Write + Send + 'static>(
        &self,
        reader: PeakListReader<R>,
        writer: W,
        deconvoluter: Deconvoluter,
    ) -> Result<(), MZDeconvoluterError> {
        let buffer_size = self.write_buffer_size.max(1);
        let (send_solved, recv_solved) = bounded(buffer_size);
        let (send_collated, recv_collated) = bounded(buffer_size);

        let start = Instant::now();
        let collate_task = thread::spawn(move || collate_results(recv_solved, send_collated));
        let write_task = thread::spawn(move || write_output(writer, recv_collated));

        let processed = prepare_processing(reader, &deconvoluter, self.mz_range, send_solved);
        let processing_elapsed = start.elapsed();

        if let Err(e) = collate_task.join() {
            warn!("Failed to join collator task: {e:?}");
        }

        let written = match write_task.join() {
            Ok(o) => Some(o?),
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
                None
            }
        };

        let prog = processed?;
        info!("Spectra: {}", prog.spectra);
        info!("Peaks: {}", prog.peaks);
        info!(
            "Envelopes: {} | Spectra Without Envelopes: {}",
            prog.envelopes, prog.empty_spectra
        );
        if let Some(written) = written {
            debug!("Wrote {written} rows");
        }
        info!("Elapsed Time: {:0.3?}", processing_elapsed);
        let elapsed = start.elapsed();
        if (elapsed.as_secs_f64() - processing_elapsed.as_secs_f64()) > 2.0 {
            info!("Total Elapsed Time: {:0.3?}", elapsed);
        }
        Ok(())
    }
}

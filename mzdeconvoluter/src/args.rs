use std::fmt::Display;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use mzdeconvolute::{DeconvolutionType, MzRange, Polarity};

use crate::driver::{MZDeconvoluter, MZDeconvoluterError};
use crate::range::parse_mz_range;

/// The name of the configuration file read from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mzdeconvoluter.toml";
/// The prefix of environment variables read as configuration
pub const ENV_PREFIX: &str = "MZDECONV_";

/// A range of charge state magnitudes, denoted `(low)-(high)` or `(high)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgChargeRange(pub i32, pub i32);

impl ArgChargeRange {
    pub fn new(low: i32, high: i32) -> Self {
        Self(low, high)
    }
}

impl Display for ArgChargeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

impl FromStr for ArgChargeRange {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((low, high)) = s.split_once('-') {
            let low: i32 = low.trim().parse()?;
            let high: i32 = high.trim().parse()?;
            Ok(Self(low, high))
        } else {
            let high: i32 = s.trim().parse()?;
            Ok(Self(1, high))
        }
    }
}

impl From<ArgChargeRange> for (i32, i32) {
    fn from(value: ArgChargeRange) -> Self {
        (value.0, value.1)
    }
}

/// Charge state deconvolution of mass spectrum peak lists.
///
/// Read tab-separated m/z and intensity peak lists, one spectrum per block of
/// lines separated by blank lines, and write one tab-separated row per isotopic
/// envelope found.
#[derive(Parser, Debug, Default, Serialize)]
#[command(author, version)]
pub struct MZDeconvoluterArgs {
    /// The path to read the peak lists from, or if '-' is passed, read from STDIN
    #[arg()]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,

    /// The path to write the envelope table to, or if '-' is passed, write to STDOUT
    #[arg(short = 'o', long = "output-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzdeconvoluter.toml` in the working directory.
    /// Environment variables prefixed with `MZDECONV_` will be read too.
    #[arg(long = "config-file")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Write the effective configuration to STDOUT as TOML and exit
    #[arg(long = "print-config")]
    #[serde(skip)]
    pub print_config: bool,

    /// The size of the buffer for queueing results for writing
    #[arg(short = 'w', long = "write-buffer-size")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_buffer_size: Option<usize>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(short = 't', long = "threads", allow_negative_numbers = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<i32>,

    /// The deconvolution algorithm to use: classic, log-clustering or isodec
    #[arg(short = 'a', long = "algorithm", value_parser = DeconvolutionType::from_str)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<DeconvolutionType>,

    /// The range of charge states to consider for each peak denoted (low)-(high) or (high)
    #[arg(short = 'z', long = "charge-range")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_range: Option<ArgChargeRange>,

    /// The ion polarity of the spectra, positive or negative
    #[arg(short = 'p', long = "polarity", value_parser = Polarity::from_str)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,

    /// The m/z range to process, denoted (start?)-(end?)
    #[arg(
        short = 'r',
        long = "mz-range",
        value_parser = parse_mz_range,
        value_name = "BEGIN-END",
        long_help = r#"The m/z range to process, denoted (start?)-(end?)

If a start is not specified, processing begins from the lowest m/z.
If an end is not specified, processing continues to the highest m/z.
Only peaks inside the range are assigned to envelopes.
"#
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz_range: Option<MzRange>,
}

impl MZDeconvoluterArgs {
    /// Layer the configuration sources, later sources taking precedence:
    /// built-in defaults, `mzdeconvoluter.toml`, `--config-file`, `MZDECONV_`
    /// environment variables and finally the flags given on the command line.
    pub fn figment(&self) -> Figment {
        let mut config = Figment::from(Serialized::defaults(MZDeconvoluter::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        config
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(self))
    }

    pub fn load_config(&self) -> Result<MZDeconvoluter, MZDeconvoluterError> {
        let config: MZDeconvoluter = self.figment().extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_charge_range_fromstr() {
        assert_eq!("2-30".parse::<ArgChargeRange>().unwrap(), ArgChargeRange(2, 30));
        assert_eq!("12".parse::<ArgChargeRange>().unwrap(), ArgChargeRange(1, 12));
        assert!("a-3".parse::<ArgChargeRange>().is_err());
        assert_eq!(ArgChargeRange(1, 8).to_string(), "1-8");
    }

    #[test]
    fn test_parse_flags() {
        let args = MZDeconvoluterArgs::try_parse_from([
            "mzdeconvoluter",
            "peaks.tsv",
            "-a",
            "isodec",
            "-z",
            "1-20",
            "-p",
            "negative",
            "-r",
            "300-2000",
            "-t",
            "2",
        ])
        .unwrap();
        assert_eq!(args.input_file.as_deref(), Some("peaks.tsv"));
        assert_eq!(args.algorithm, Some(DeconvolutionType::IsoDec));
        assert_eq!(args.charge_range, Some(ArgChargeRange(1, 20)));
        assert_eq!(args.polarity, Some(Polarity::Negative));
        assert_eq!(args.mz_range, Some(MzRange::new(300.0, 2000.0)));
        assert_eq!(args.threads, Some(2));

        let err = MZDeconvoluterArgs::try_parse_from(["mzdeconvoluter", "-a", "averagine-2"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = MZDeconvoluterArgs::try_parse_from([
            "mzdeconvoluter",
            "peaks.tsv",
            "-a",
            "log-clustering",
            "-w",
            "16",
        ])
        .unwrap();
        let config = args.load_config().unwrap();
        assert_eq!(config.input_file, "peaks.tsv");
        assert_eq!(config.output_file, PathBuf::from("-"));
        assert_eq!(config.write_buffer_size, 16);
        assert_eq!(config.algorithm, Some(DeconvolutionType::LogClustering));
        assert!(config.charge_range.is_none());
        assert!(config.parameters.is_none());
    }
}

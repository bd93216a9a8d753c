mod args;
mod driver;
mod proc;
mod progress;
mod range;

pub mod peak_list;
pub mod write;

pub use args::*;
pub use driver::{MZDeconvoluter, MZDeconvoluterError, BUFFER_SIZE};
pub use progress::ProgressRecord;
pub use range::{parse_mz_range, MzRangeParseError};

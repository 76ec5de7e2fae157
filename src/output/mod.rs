//! Result persistence.
//!
//! - [`RunRecord`]: everything known about one run once it is finished
//! - [`ResultWriter`]: destination of records and samples, written as they arrive
//! - [`CsvResultWriter`]: `csv/data.csv` plus one `.sample` file per run

pub mod csv_writer;

use serde::{Deserialize, Serialize};

use crate::error::WriterError;
use crate::experiment::ExperimentCoordinates;
use crate::memory::MemoryStats;
use crate::stability::SimilarityResult;

pub use csv_writer::CsvResultWriter;

/// Size and quality of a parsed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleMetrics {
    pub size: usize,
    pub validity: f64,
    pub coverage: f64,
}

/// One finished run, ready to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub system: String,
    pub algorithm: String,
    pub coordinates: ExperimentCoordinates,
    pub terminated_in_time: bool,
    pub no_error_occurred: bool,
    pub runtime_millis: i64,
    /// `None` when the run produced no usable sample.
    pub sample_metrics: Option<SampleMetrics>,
    /// `None` when stability is disabled.
    pub similarity: Option<SimilarityResult>,
    pub memory: MemoryStats,
}

/// Receives results as soon as each run finishes.
pub trait ResultWriter: Send {
    fn write_run(&mut self, record: &RunRecord) -> Result<(), WriterError>;

    /// Persists a sample, one configuration per line.
    fn write_sample(
        &mut self,
        system: &str,
        algorithm: &str,
        coordinates: &ExperimentCoordinates,
        lines: &[String],
    ) -> Result<(), WriterError>;
}

/// Formats a number with at most five fraction digits and no grouping.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "-1".to_string();
    }
    let text = format!("{:.5}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

//! CSV result writer.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use tracing::debug;

use crate::error::WriterError;
use crate::experiment::ExperimentCoordinates;

use super::{format_number, ResultWriter, RunRecord};

/// File name of the results table inside the csv directory.
pub const DATA_FILE: &str = "data.csv";

const LEADING_COLUMNS: &[&str] = &[
    "System",
    "SystemIndex",
    "Algorithm",
    "AlgorithmIndex",
    "SystemIteration",
    "AlgorithmIteration",
    "InTime",
    "NoError",
    "Time",
    "Size",
    "Validity",
    "Coverage",
];
const STABILITY_COLUMNS: &[&str] = &["ROIC", "MSOC", "FIMDC", "ICST"];
const MEMORY_COLUMNS: &[&str] = &[
    "Runtime",
    "Throughput",
    "TotalCreatedBytes",
    "TotalPauseTime",
    "AveragePauseTime",
];

/// Writes `data.csv` row by row and samples as individual files.
pub struct CsvResultWriter {
    writer: Writer<File>,
    samples_dir: PathBuf,
    stability: bool,
}

impl CsvResultWriter {
    /// Creates `<csv_dir>/data.csv`, replacing an existing one, and writes
    /// the header.
    pub fn create(csv_dir: &Path, samples_dir: &Path, stability: bool) -> Result<Self, WriterError> {
        fs::create_dir_all(csv_dir)?;
        let path = csv_dir.join(DATA_FILE);
        let mut writer = WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(Self::header(stability))?;
        writer.flush()?;
        debug!("Writing results to {}", path.display());
        Ok(Self {
            writer,
            samples_dir: samples_dir.to_path_buf(),
            stability,
        })
    }

    /// Column names for the given stability setting.
    pub fn header(stability: bool) -> Vec<&'static str> {
        let mut header = LEADING_COLUMNS.to_vec();
        if stability {
            header.extend_from_slice(STABILITY_COLUMNS);
        }
        header.extend_from_slice(MEMORY_COLUMNS);
        header
    }

    /// Path of the sample file for one run.
    pub fn sample_path(&self, system: &str, algorithm: &str, coordinates: &ExperimentCoordinates) -> PathBuf {
        self.samples_dir.join(system).join(format!(
            "{}_{}_{}.sample",
            algorithm, coordinates.system_iteration, coordinates.algorithm_iteration
        ))
    }

    fn row(&self, record: &RunRecord) -> Vec<String> {
        let c = &record.coordinates;
        let mut row = vec![
            record.system.clone(),
            c.system_index.to_string(),
            record.algorithm.clone(),
            c.algorithm_index.to_string(),
            c.system_iteration.to_string(),
            c.algorithm_iteration.to_string(),
            record.terminated_in_time.to_string(),
            record.no_error_occurred.to_string(),
            record.runtime_millis.to_string(),
        ];
        match &record.sample_metrics {
            Some(m) => row.extend([
                m.size.to_string(),
                format_number(m.validity),
                format_number(m.coverage),
            ]),
            None => row.extend(["-1".to_string(), "-1".to_string(), "-1".to_string()]),
        }
        if self.stability {
            let s = record.similarity.unwrap_or_default();
            row.extend([s.roic, s.msoc, s.fimdc, s.icst].map(format_number));
        }
        let m = &record.memory;
        row.extend([
            format_number(m.total_runtime),
            format_number(m.throughput),
            m.total_allocated_bytes.to_string(),
            format_number(m.total_pause_time),
            format_number(m.avg_pause_time),
        ]);
        row
    }
}

impl ResultWriter for CsvResultWriter {
    fn write_run(&mut self, record: &RunRecord) -> Result<(), WriterError> {
        let row = self.row(record);
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_sample(
        &mut self,
        system: &str,
        algorithm: &str,
        coordinates: &ExperimentCoordinates,
        lines: &[String],
    ) -> Result<(), WriterError> {
        let path = self.sample_path(system, algorithm, coordinates);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut sorted = lines.to_vec();
        sorted.sort();
        let mut text = sorted.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStats;
    use crate::output::SampleMetrics;
    use crate::stability::SimilarityResult;
    use tempfile::TempDir;

    fn coords() -> ExperimentCoordinates {
        ExperimentCoordinates {
            system_index: 1,
            system_iteration: 2,
            algorithm_index: 0,
            algorithm_iteration: 3,
        }
    }

    fn record() -> RunRecord {
        RunRecord {
            system: "busybox".to_string(),
            algorithm: "yasa".to_string(),
            coordinates: coords(),
            terminated_in_time: true,
            no_error_occurred: true,
            runtime_millis: 1234,
            sample_metrics: Some(SampleMetrics {
                size: 7,
                validity: 1.0,
                coverage: 2.0 / 3.0,
            }),
            similarity: Some(SimilarityResult {
                roic: 0.5,
                msoc: 0.25,
                fimdc: 0.0,
                icst: 1.0,
            }),
            memory: MemoryStats::unavailable(),
        }
    }

    #[test]
    fn test_rows_follow_header() {
        let temp = TempDir::new().unwrap();
        let csv_dir = temp.path().join("csv");
        let mut writer = CsvResultWriter::create(&csv_dir, &temp.path().join("samples"), true).unwrap();
        writer.write_run(&record()).unwrap();

        let text = fs::read_to_string(csv_dir.join(DATA_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("System,SystemIndex,Algorithm"));
        assert!(lines[0].contains("ROIC,MSOC,FIMDC,ICST"));
        assert_eq!(
            lines[1],
            "busybox,1,yasa,0,2,3,true,true,1234,7,1,0.66667,0.5,0.25,0,1,-1,-1,-1,-1,-1"
        );
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }

    #[test]
    fn test_header_without_stability() {
        let header = CsvResultWriter::header(false);
        assert!(!header.contains(&"ROIC"));
        assert_eq!(header.len(), 17);
    }

    #[test]
    fn test_sample_file_is_sorted() {
        let temp = TempDir::new().unwrap();
        let mut writer =
            CsvResultWriter::create(&temp.path().join("csv"), &temp.path().join("samples"), false).unwrap();
        writer
            .write_sample("busybox", "yasa", &coords(), &["Root,B".to_string(), "Root,-B".to_string()])
            .unwrap();
        let path = temp.path().join("samples").join("busybox").join("yasa_2_3.sample");
        assert_eq!(fs::read_to_string(path).unwrap(), "Root,-B\nRoot,B\n");
    }
}

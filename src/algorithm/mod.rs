//! Pluggable sampling algorithms.
//!
//! Each algorithm is an external program. An implementation knows how to:
//! 1. Prepare its inputs for one run (write the model, build the argv)
//! 2. Consume the program's stdout while it runs
//! 3. Parse the sample and memory log it leaves behind
//! 4. Remove its per-run outputs

pub mod external;
pub mod registry;

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PluginError, ProcessError, ResultParseError};
use crate::memory::MemoryStats;
use crate::model::{Cnf, Variables};
use crate::sample::Sample;

pub use external::{parse_sample_lines, ExternalAlgorithm};
pub use registry::{AlgorithmFactory, PluginDefinition, PluginRegistry};

/// Scratch file the variant model is written to.
pub const MODEL_FILE: &str = "model.dimacs";
/// Scratch file algorithms write their sample to.
pub const SAMPLE_FILE: &str = "sample.csv";
/// Scratch file the JVM writes its GC log to.
pub const GC_LOG_FILE: &str = "runtimeGC.log";

/// Identity and resource limits of one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    pub name: String,
    pub t: usize,
    /// Declared repetition count, `None` to use the global default.
    pub iterations: Option<u32>,
    pub minimum_memory: Option<String>,
    pub maximum_memory: Option<String>,
}

/// Shared settings every algorithm instance is created with.
#[derive(Debug, Clone)]
pub struct AlgorithmContext {
    /// Coverage strength.
    pub t: usize,
    /// Scratch directory for per-run files.
    pub scratch_dir: PathBuf,
    /// JVM `-Xms` value.
    pub minimum_memory: Option<String>,
    /// JVM `-Xmx` value.
    pub maximum_memory: Option<String>,
}

impl AlgorithmContext {
    pub fn new(t: usize, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            t,
            scratch_dir: scratch_dir.into(),
            minimum_memory: None,
            maximum_memory: None,
        }
    }

    pub fn with_memory(mut self, minimum: Option<String>, maximum: Option<String>) -> Self {
        self.minimum_memory = minimum;
        self.maximum_memory = maximum;
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.scratch_dir.join(MODEL_FILE)
    }

    pub fn sample_path(&self) -> PathBuf {
        self.scratch_dir.join(SAMPLE_FILE)
    }

    pub fn gc_log_path(&self) -> PathBuf {
        self.scratch_dir.join(GC_LOG_FILE)
    }
}

/// One algorithm, driven through a single run at a time.
#[async_trait]
pub trait SamplingAlgorithm: Send + Sync {
    /// Short name, used in file names and the CSV.
    fn name(&self) -> &str;

    /// Human-readable name for logs.
    fn full_name(&self) -> &str {
        self.name()
    }

    /// Declared repetition count, `None` to use the global default.
    fn iterations(&self) -> Option<u32>;

    fn descriptor(&self) -> AlgorithmDescriptor;

    /// Checks that the program can be launched at all.
    fn check_available(&self) -> Result<(), PluginError>;

    /// Writes the run's inputs and builds the command line.
    async fn pre_process(&mut self, variant: &Cnf) -> Result<(), ProcessError>;

    /// Command line built by the last `pre_process`.
    fn command_elements(&self) -> &[String];

    /// Receives each stdout line of the running program.
    fn consume_line(&mut self, line: &str);

    /// Reads the produced sample, expressed in the numbering of `variables`.
    async fn parse_results(&mut self, variables: &Variables) -> Result<Option<Sample>, ResultParseError>;

    /// Reads the memory statistics of the last run.
    async fn parse_memory(&self) -> Result<MemoryStats, ResultParseError>;

    /// Deletes per-run outputs. Runs after every attempt.
    async fn post_process(&mut self) -> io::Result<()>;
}

/// Resolves `program` the way a shell would.
pub(crate) fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_paths() {
        let ctx = AlgorithmContext::new(2, "/tmp/out/temp");
        assert_eq!(ctx.model_path(), PathBuf::from("/tmp/out/temp/model.dimacs"));
        assert_eq!(ctx.sample_path(), PathBuf::from("/tmp/out/temp/sample.csv"));
        assert_eq!(ctx.gc_log_path(), PathBuf::from("/tmp/out/temp/runtimeGC.log"));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_program() {
        assert!(find_program("sh").is_some());
        assert!(find_program("definitely-not-a-real-program-xyz").is_none());
        assert!(find_program("/bin/sh").is_some());
    }
}

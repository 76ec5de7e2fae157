//! Process runner for algorithm invocations.
//!
//! # Architecture
//!
//! ```text
//! pre_process → spawn (own process group) → stdout/stderr readers → wait | deadline → parse → post_process
//! ```
//!
//! The runner:
//! 1. Asks the algorithm to write its inputs and build its argv
//! 2. Spawns the program with both output pipes drained concurrently
//! 3. Kills the whole process group when the deadline elapses
//! 4. Parses the sample and memory log, then lets the algorithm clean up
//!
//! # Example
//!
//! ```ignore
//! use twise_bench::runner::ProcessRunner;
//!
//! let runner = ProcessRunner::new(Some(Duration::from_secs(600)));
//! let result = runner.run(algorithm.as_mut(), &variant).await;
//! println!("in time: {}, runtime: {}ms", result.terminated_in_time, result.runtime_millis);
//! ```

pub mod executor;
pub mod result;

pub use executor::ProcessRunner;
pub use result::RunResult;

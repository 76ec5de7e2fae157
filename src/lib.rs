//! twise-bench: benchmark harness for t-wise sampling algorithms.
//!
//! Runs external sampling programs against randomized variants of feature
//! models and records runtime, memory behaviour, sample quality and the
//! stability of samples across consecutive systems.

// Core modules
pub mod algorithm;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod experiment;
pub mod memory;
pub mod model;
pub mod output;
pub mod prepare;
pub mod runner;
pub mod sample;
pub mod stability;

// Re-export commonly used types
pub use config::{ExperimentConfig, OutputLayout};
pub use error::{
    ConfigError, ModelError, PluginError, ProcessError, RandomizationError, RemapError,
    ResultParseError, StabilityError, WriterError,
};
pub use experiment::{Experiment, ExperimentCoordinates, ExperimentSummary};

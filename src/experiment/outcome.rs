//! Stage failures and the loop level each one abandons.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ModelError, PluginError, RandomizationError, RemapError, WriterError};

/// Loop body a failure is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Skip the rest of the system.
    System,
    /// Skip the remaining iterations of the system.
    Iteration,
    /// Skip the algorithm for the current iteration.
    Algorithm,
    /// Skip the current repetition only.
    Repetition,
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureScope::System => write!(f, "system"),
            FailureScope::Iteration => write!(f, "iteration"),
            FailureScope::Algorithm => write!(f, "algorithm"),
            FailureScope::Repetition => write!(f, "repetition"),
        }
    }
}

/// A recoverable failure of one scheduler stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("model could not be loaded: {0}")]
    ModelLoad(#[from] ModelError),

    #[error("algorithm list could not be prepared: {0}")]
    PluginResolution(#[from] PluginError),

    #[error("variant could not be derived: {0}")]
    Randomization(#[from] RandomizationError),

    #[error("algorithm unavailable: {0}")]
    AlgorithmUnavailable(PluginError),

    #[error("sample could not be remapped: {0}")]
    Remap(#[from] RemapError),

    #[error("result could not be written: {0}")]
    Writer(#[from] WriterError),
}

impl StageFailure {
    /// The isolation policy.
    pub fn scope(&self) -> FailureScope {
        match self {
            StageFailure::ModelLoad(_) | StageFailure::PluginResolution(_) => FailureScope::System,
            StageFailure::Randomization(_) => FailureScope::Iteration,
            StageFailure::AlgorithmUnavailable(_) => FailureScope::Algorithm,
            StageFailure::Remap(_) | StageFailure::Writer(_) => FailureScope::Repetition,
        }
    }
}

/// Counters reported at the end of an experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub systems_processed: usize,
    pub systems_skipped: usize,
    pub runs_completed: usize,
    pub runs_failed: usize,
}

impl ExperimentSummary {
    pub fn total_runs(&self) -> usize {
        self.runs_completed + self.runs_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert_eq!(
            StageFailure::from(ModelError::NotFound("x".into())).scope(),
            FailureScope::System
        );
        assert_eq!(
            StageFailure::from(PluginError::NotFound("x".into())).scope(),
            FailureScope::System
        );
        assert_eq!(
            StageFailure::from(RandomizationError::EmptyModel).scope(),
            FailureScope::Iteration
        );
        assert_eq!(
            StageFailure::AlgorithmUnavailable(PluginError::NotFound("x".into())).scope(),
            FailureScope::Algorithm
        );
        assert_eq!(
            StageFailure::from(RemapError::UnknownIndex {
                configuration: 0,
                literal: 9
            })
            .scope(),
            FailureScope::Repetition
        );
    }
}

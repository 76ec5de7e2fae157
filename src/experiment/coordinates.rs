//! Address of one run inside an experiment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(system, system iteration, algorithm, algorithm iteration)`.
///
/// Indices are 0-based, iterations 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentCoordinates {
    pub system_index: usize,
    pub system_iteration: u32,
    pub algorithm_index: usize,
    pub algorithm_iteration: u32,
}

impl ExperimentCoordinates {
    /// Coordinates of the first run of a system.
    pub fn system(system_index: usize) -> Self {
        Self {
            system_index,
            system_iteration: 1,
            algorithm_index: 0,
            algorithm_iteration: 1,
        }
    }

    pub fn with_system_iteration(self, system_iteration: u32) -> Self {
        Self {
            system_iteration,
            algorithm_index: 0,
            algorithm_iteration: 1,
            ..self
        }
    }

    pub fn with_algorithm(self, algorithm_index: usize) -> Self {
        Self {
            algorithm_index,
            algorithm_iteration: 1,
            ..self
        }
    }

    pub fn with_algorithm_iteration(self, algorithm_iteration: u32) -> Self {
        Self {
            algorithm_iteration,
            ..self
        }
    }
}

impl fmt::Display for ExperimentCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[system {} iteration {} algorithm {} repetition {}]",
            self.system_index, self.system_iteration, self.algorithm_index, self.algorithm_iteration
        )
    }
}

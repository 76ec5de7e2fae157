//! Outcome of one algorithm run.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryStats;
use crate::sample::Sample;

/// Complete result of running an algorithm once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The process exited before the deadline.
    pub terminated_in_time: bool,
    /// Nothing was written to stderr and no launch or parse step failed.
    pub no_error_occurred: bool,
    /// Wall-clock time from spawn to exit or kill, `-1` if never launched.
    pub runtime_millis: i64,
    /// Parsed sample in the numbering of the variant the run was given.
    pub sample: Option<Sample>,
    pub memory: Option<MemoryStats>,
    /// Exit code, `None` if killed by a signal or never launched.
    pub exit_code: Option<i32>,
    /// Captured stderr lines.
    pub errors: Vec<String>,
}

impl RunResult {
    /// A run that never reached the process launch.
    pub fn not_launched(reason: impl Into<String>) -> Self {
        Self {
            terminated_in_time: false,
            no_error_occurred: false,
            runtime_millis: -1,
            sample: None,
            memory: None,
            exit_code: None,
            errors: vec![reason.into()],
        }
    }

    /// Returns true if the run finished in time without errors.
    pub fn is_success(&self) -> bool {
        self.terminated_in_time && self.no_error_occurred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_launched() {
        let result = RunResult::not_launched("spawn failed");
        assert!(!result.is_success());
        assert_eq!(result.runtime_millis, -1);
        assert_eq!(result.errors, vec!["spawn failed".to_string()]);
    }
}

//! Command-line interface for twise-bench.
//!
//! Accepts an experiment file plus the `-alg`, `-t`, `-in` and `-out`
//! overrides, then runs the experiment.

mod commands;

pub use commands::{normalize_args, parse_cli, run, run_with_cli, Cli};

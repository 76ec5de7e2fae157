//! Command-line entry for running an experiment.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use crate::config::{CliOverrides, ExperimentConfig, OutputLayout};
use crate::experiment::{Experiment, ExperimentSummary};
use crate::model::FileModelReader;
use crate::prepare::prepare_models;

/// Run report written next to `data.csv`.
const SUMMARY_FILE: &str = "summary.json";

/// Single-dash long flags accepted for compatibility.
const LEGACY_FLAGS: &[(&str, &str)] = &[("-alg", "--alg"), ("-in", "--in"), ("-out", "--out")];

/// Benchmark harness for t-wise sampling algorithms.
#[derive(Parser, Debug)]
#[command(name = "twise-bench")]
#[command(about = "Run t-wise sampling algorithms against randomized feature-model variants")]
#[command(version)]
#[command(
    long_about = "twise-bench runs external t-wise sampling algorithms against randomized variants of feature models and records runtime, memory, sample quality and stability.\n\nModels given with -in must be DIMACS (*.dimacs); FeatureIDE *.xml models are found but must be converted to DIMACS first.\n\nExample usage:\n  twise-bench experiment.yaml -in ./models -out ./output -t 2"
)]
pub struct Cli {
    /// Experiment configuration file (YAML).
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Run only this algorithm.
    #[arg(long = "alg", value_name = "NAME")]
    pub algorithm: Option<String>,

    /// Coverage strength, 1 to 5.
    #[arg(short = 't', value_name = "T")]
    pub t: Option<String>,

    /// Directory of feature models (*.xml, *.dimacs) to prepare first.
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output root directory.
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            algorithm: self.algorithm.clone(),
            t: self.t.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

/// Rewrites `-alg`, `-in` and `-out` to their double-dash forms.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            LEGACY_FLAGS
                .iter()
                .find(|(legacy, _)| arg.to_str() == Some(*legacy))
                .map(|(_, modern)| OsString::from(*modern))
                .unwrap_or(arg)
        })
        .collect()
}

/// Parses process arguments.
pub fn parse_cli() -> Cli {
    Cli::parse_from(normalize_args(std::env::args_os()))
}

/// Parses process arguments and runs.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Validates the configuration, prepares inputs and runs the experiment.
///
/// Configuration errors are returned before any system is processed.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig::default(),
    };
    let registry = config.registry()?;
    let input = config.apply_overrides(&cli.overrides(), &registry)?;

    let layout = OutputLayout::new(&config.output_path);
    layout.create_all()?;
    if let Some(input) = input {
        let prepared = prepare_models(&input, &layout, &FileModelReader)?;
        info!("Prepared {} models", prepared.len());
    }

    let systems = config.resolve_systems(&layout)?;
    if systems.is_empty() {
        warn!("No systems to process, check `systems` or run with -in first");
    }

    let mut experiment = Experiment::new(config, registry, systems)?;
    let summary = experiment.run().await;
    write_summary(&experiment, &summary);

    println!(
        "Systems: {} processed, {} skipped | Runs: {} ({} completed, {} failed) | Results: {}",
        summary.systems_processed,
        summary.systems_skipped,
        summary.total_runs(),
        summary.runs_completed,
        summary.runs_failed,
        experiment.layout().csv.display()
    );
    Ok(())
}

fn write_summary(experiment: &Experiment, summary: &ExperimentSummary) {
    let path = experiment.layout().csv.join(SUMMARY_FILE);
    let report = serde_json::json!({
        "seed": experiment.seed(),
        "t": experiment.config().t,
        "summary": summary,
        "total_runs": summary.total_runs(),
    });
    let written = serde_json::to_string_pretty(&report)
        .map_err(|e| e.to_string())
        .and_then(|text| fs::write(&path, text).map_err(|e| e.to_string()));
    if let Err(e) = written {
        warn!("Could not write {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_legacy_flags() {
        let args = normalize_args(["twise-bench", "-alg", "yasa", "-t", "3", "-in", "m", "-out", "o"]);
        let args: Vec<&str> = args.iter().filter_map(|a| a.to_str()).collect();
        assert_eq!(
            args,
            vec!["twise-bench", "--alg", "yasa", "-t", "3", "--in", "m", "--out", "o"]
        );
    }

    #[test]
    fn test_cli_parses_normalized_flags() {
        let cli = Cli::parse_from(normalize_args([
            "twise-bench",
            "exp.yaml",
            "-alg",
            "yasa",
            "-t",
            "6",
            "-out",
            "/tmp/x",
        ]));
        assert_eq!(cli.config, Some(PathBuf::from("exp.yaml")));
        assert_eq!(cli.algorithm.as_deref(), Some("yasa"));
        assert_eq!(cli.t.as_deref(), Some("6"));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.log_level, "info");
    }

    #[tokio::test]
    async fn test_invalid_coverage_aborts_before_running() {
        let temp = tempfile::TempDir::new().unwrap();
        let out = temp.path().join("out");
        let cli = Cli::parse_from(normalize_args([
            "twise-bench".to_string(),
            "-t".to_string(),
            "6".to_string(),
            "-out".to_string(),
            out.display().to_string(),
        ]));
        let err = run_with_cli(cli).await.unwrap_err();
        assert!(err.to_string().contains("[-t]"));
        assert!(!out.join("csv").exists());
    }

    #[tokio::test]
    async fn test_empty_run_writes_summary() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("exp.yaml");
        fs::write(&config, "seed: 7\nt: 3\n").unwrap();
        let out = temp.path().join("out");
        let cli = Cli::parse_from(normalize_args([
            "twise-bench".to_string(),
            config.display().to_string(),
            "-out".to_string(),
            out.display().to_string(),
        ]));
        run_with_cli(cli).await.unwrap();

        let text = fs::read_to_string(out.join("csv").join(SUMMARY_FILE)).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["seed"], 7);
        assert_eq!(report["t"], 3);
        assert_eq!(report["summary"]["systems_processed"], 0);
        assert_eq!(report["total_runs"], 0);
        assert!(out.join("csv").join("data.csv").is_file());
    }
}

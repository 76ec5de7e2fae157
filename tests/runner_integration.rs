//! Process runner behaviour against real child processes.

#![cfg(unix)]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use twise_bench::algorithm::{AlgorithmDescriptor, SamplingAlgorithm};
use twise_bench::error::{PluginError, ProcessError, ResultParseError};
use twise_bench::memory::MemoryStats;
use twise_bench::model::{dimacs, Cnf, Variables};
use twise_bench::runner::ProcessRunner;
use twise_bench::sample::Sample;

struct ShellAlgorithm {
    command: Vec<String>,
    stdout: Vec<String>,
    cleaned: bool,
}

impl ShellAlgorithm {
    fn new(script: &str) -> Self {
        Self {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            stdout: Vec::new(),
            cleaned: false,
        }
    }
}

#[async_trait]
impl SamplingAlgorithm for ShellAlgorithm {
    fn name(&self) -> &str {
        "shell"
    }

    fn iterations(&self) -> Option<u32> {
        None
    }

    fn descriptor(&self) -> AlgorithmDescriptor {
        AlgorithmDescriptor {
            name: "shell".to_string(),
            t: 2,
            iterations: None,
            minimum_memory: None,
            maximum_memory: None,
        }
    }

    fn check_available(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn pre_process(&mut self, _variant: &Cnf) -> Result<(), ProcessError> {
        self.stdout.clear();
        Ok(())
    }

    fn command_elements(&self) -> &[String] {
        &self.command
    }

    fn consume_line(&mut self, line: &str) {
        self.stdout.push(line.to_string());
    }

    async fn parse_results(&mut self, _variables: &Variables) -> Result<Option<Sample>, ResultParseError> {
        Ok(None)
    }

    async fn parse_memory(&self) -> Result<MemoryStats, ResultParseError> {
        Ok(MemoryStats::unavailable())
    }

    async fn post_process(&mut self) -> std::io::Result<()> {
        self.cleaned = true;
        Ok(())
    }
}

fn variant() -> Cnf {
    dimacs::parse("c 1 A\nc 2 B\np cnf 2 1\n1 2 0\n").unwrap()
}

#[tokio::test]
async fn test_timeout_kills_whole_process_group() {
    // The background sleep inherits stdout and would hold it open
    let mut alg = ShellAlgorithm::new("echo started; sleep 30 & sleep 30");
    let runner = ProcessRunner::new(Some(Duration::from_millis(300)));

    let start = Instant::now();
    let result = runner.run(&mut alg, &variant()).await;
    let elapsed = start.elapsed();

    assert!(!result.terminated_in_time);
    assert!(result.no_error_occurred);
    assert!(result.runtime_millis >= 300);
    assert!(elapsed < Duration::from_millis(1900), "took {:?}", elapsed);
    assert_eq!(alg.stdout, vec!["started".to_string()]);
    assert!(alg.cleaned);
}

#[tokio::test]
async fn test_run_within_deadline_without_stderr() {
    let mut alg = ShellAlgorithm::new("printf 'a\\nb\\nc\\n'");
    let result = ProcessRunner::new(Some(Duration::from_secs(10)))
        .run(&mut alg, &variant())
        .await;

    assert!(result.terminated_in_time);
    assert!(result.no_error_occurred);
    assert!(result.errors.is_empty());
    assert!(result.runtime_millis >= 0);
    assert_eq!(alg.stdout.len(), 3);
}

#[tokio::test]
async fn test_stderr_output_marks_error() {
    let mut alg = ShellAlgorithm::new("echo 'out of memory' >&2; echo done");
    let result = ProcessRunner::new(None).run(&mut alg, &variant()).await;

    assert!(result.terminated_in_time);
    assert!(!result.no_error_occurred);
    assert_eq!(result.errors, vec!["out of memory".to_string()]);
    assert_eq!(alg.stdout, vec!["done".to_string()]);
}

#[tokio::test]
async fn test_large_output_does_not_stall_child() {
    let mut alg = ShellAlgorithm::new("i=0; while [ $i -lt 20000 ]; do echo line$i; echo err$i >&2; i=$((i+1)); done");
    let result = ProcessRunner::new(Some(Duration::from_secs(30)))
        .run(&mut alg, &variant())
        .await;

    assert!(result.terminated_in_time);
    assert_eq!(alg.stdout.len(), 20000);
    assert_eq!(result.errors.len(), 20000);
}

#[tokio::test]
async fn test_invalid_utf8_stdout_keeps_draining() {
    let mut alg = ShellAlgorithm::new(
        "printf 'Gr\\374n\\n'; i=0; while [ $i -lt 40000 ]; do echo line$i; i=$((i+1)); done",
    );
    let result = ProcessRunner::new(Some(Duration::from_secs(30)))
        .run(&mut alg, &variant())
        .await;

    assert!(result.terminated_in_time);
    assert!(result.no_error_occurred);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(alg.stdout.len(), 40001);
    assert_eq!(alg.stdout[0], "Gr\u{fffd}n");
    assert_eq!(alg.stdout[40000], "line39999");
}

#[tokio::test]
async fn test_invalid_utf8_stderr_is_an_error() {
    let mut alg = ShellAlgorithm::new("printf 'Fehler: Gr\\374n\\n' >&2");
    let result = ProcessRunner::new(None).run(&mut alg, &variant()).await;

    assert!(result.terminated_in_time);
    assert!(!result.no_error_occurred);
    assert_eq!(result.errors, vec!["Fehler: Gr\u{fffd}n".to_string()]);
}

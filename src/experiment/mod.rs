//! Experiment scheduler.
//!
//! Drives systems × system iterations × algorithms × repetitions strictly in
//! sequence. Each stage returns a [`StageFailure`] instead of unwinding; the
//! failure's [`FailureScope`] decides which loop body is abandoned:
//!
//! | Stage | Scope |
//! |---|---|
//! | model load, algorithm list | system |
//! | variant randomization | remaining iterations of the system |
//! | algorithm availability | that algorithm in the current iteration |
//! | remap, result writing | that repetition |

pub mod coordinates;
pub mod outcome;

use std::fs;
use std::io;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::algorithm::{AlgorithmDescriptor, PluginRegistry, SamplingAlgorithm};
use crate::analysis::{CnfAnalyzer, SampleAnalyzer};
use crate::config::{ExperimentConfig, OutputLayout};
use crate::error::ConfigError;
use crate::model::{iteration_seed, randomize, remap, Cnf, ModelRepository};
use crate::output::{CsvResultWriter, ResultWriter, RunRecord, SampleMetrics};
use crate::runner::{ProcessRunner, RunResult};
use crate::sample::{FeatureSample, Sample};
use crate::stability::{SimilarityResult, StabilityEvaluator};

pub use coordinates::ExperimentCoordinates;
pub use outcome::{ExperimentSummary, FailureScope, StageFailure};

/// One configured experiment, ready to run.
pub struct Experiment {
    config: ExperimentConfig,
    layout: OutputLayout,
    registry: PluginRegistry,
    systems: Vec<String>,
    seed: u64,
    runner: ProcessRunner,
    models: ModelRepository,
    analyzer: Box<dyn SampleAnalyzer>,
    writer: Box<dyn ResultWriter>,
    stability: StabilityEvaluator,
}

impl Experiment {
    /// Creates the output layout and the CSV writer.
    pub fn new(
        mut config: ExperimentConfig,
        registry: PluginRegistry,
        systems: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let layout = OutputLayout::new(&config.output_path);
        layout.create_all()?;
        let seed = config.resolve_seed();
        let stability = config.stability_enabled(&systems);
        let writer = CsvResultWriter::create(&layout.csv, &layout.samples, stability).map_err(|e| {
            ConfigError::InvalidValue {
                key: "output_path".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            runner: ProcessRunner::new(config.timeout()),
            models: ModelRepository::new(&layout.models),
            analyzer: Box::new(CnfAnalyzer::new()),
            writer: Box::new(writer),
            stability: StabilityEvaluator::new(stability),
            config,
            layout,
            registry,
            systems,
            seed,
        })
    }

    /// Replaces the result writer.
    pub fn with_writer(mut self, writer: Box<dyn ResultWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Replaces the model repository.
    pub fn with_models(mut self, models: ModelRepository) -> Self {
        self.models = models;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stability_enabled(&self) -> bool {
        self.stability.is_enabled()
    }

    /// Runs every system, then removes the scratch directory unless in
    /// debug mode. Never fails; every problem is logged and isolated.
    pub async fn run(&mut self) -> ExperimentSummary {
        let mut summary = ExperimentSummary::default();
        let names = self.config.algorithm_names();
        info!(
            "Running {} systems with {} algorithms (seed {}, stability {})",
            self.systems.len(),
            names.len(),
            self.seed,
            self.stability.is_enabled()
        );

        for system_index in 0..self.systems.len() {
            let system = self.systems[system_index].clone();
            let coords = ExperimentCoordinates::system(system_index);
            self.stability
                .begin_system(self.config.system_iterations as usize, names.len());

            match self.run_system(&system, coords, &names, &mut summary).await {
                Ok(()) => summary.systems_processed += 1,
                Err(failure) => {
                    error!(
                        "{} {}: {}, skipping {}",
                        system,
                        coords,
                        failure,
                        failure.scope()
                    );
                    summary.systems_skipped += 1;
                }
            }
        }

        self.dispose();
        info!(
            "Finished: {} systems processed, {} skipped, {} runs completed, {} failed",
            summary.systems_processed,
            summary.systems_skipped,
            summary.runs_completed,
            summary.runs_failed
        );
        summary
    }

    async fn run_system(
        &mut self,
        system: &str,
        coords: ExperimentCoordinates,
        names: &[String],
        summary: &mut ExperimentSummary,
    ) -> Result<(), StageFailure> {
        let model = self.models.load(system)?;
        let mut algorithms = self.prepare_algorithms(names)?;
        let descriptors: Vec<AlgorithmDescriptor> = algorithms.iter().map(|a| a.descriptor()).collect();
        for descriptor in &descriptors {
            debug!("{}: loaded {:?}", system, descriptor);
        }
        self.stability.set_model(Arc::clone(model.variables()));
        debug!("{}: {} variables, {} clauses", system, model.variable_count(), model.clauses().len());

        let iterations = self.config.system_iterations;
        for system_iteration in 1..=iterations {
            let coords = coords.with_system_iteration(system_iteration);
            let variant = match randomize(&model, iteration_seed(self.seed, system_iteration)) {
                Ok(variant) => variant,
                Err(e) => {
                    warn!("{} {}: no variant for this iteration", system, coords);
                    return Err(e.into());
                }
            };

            for (algorithm_index, algorithm) in algorithms.iter_mut().enumerate() {
                let coords = coords.with_algorithm(algorithm_index);
                if let Err(e) = algorithm.check_available() {
                    let failure = StageFailure::AlgorithmUnavailable(e);
                    warn!("{} {}: {}, skipping {}", system, coords, failure, failure.scope());
                    continue;
                }

                let repetitions = descriptors[algorithm_index]
                    .iterations
                    .unwrap_or(self.config.algorithm_iterations);
                for repetition in 1..=repetitions {
                    let coords = coords.with_algorithm_iteration(repetition);
                    info!(
                        "{}/{} | {}/{} | ({}/{}) {} | {}/{}",
                        coords.system_index + 1,
                        self.systems.len(),
                        system_iteration,
                        iterations,
                        algorithm_index + 1,
                        names.len(),
                        algorithm.full_name(),
                        repetition,
                        repetitions
                    );

                    match self
                        .run_once(system, algorithm.as_mut(), &model, &variant, coords)
                        .await
                    {
                        Ok(true) => summary.runs_completed += 1,
                        Ok(false) => summary.runs_failed += 1,
                        Err(failure) => {
                            warn!("{} {}: {}, skipping {}", system, coords, failure, failure.scope());
                            summary.runs_failed += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn prepare_algorithms(&self, names: &[String]) -> Result<Vec<Box<dyn SamplingAlgorithm>>, StageFailure> {
        let context = self.config.algorithm_context(&self.layout);
        names
            .iter()
            .map(|name| self.registry.resolve(name, &context).map_err(StageFailure::from))
            .collect()
    }

    /// Runs one repetition and writes its record. Returns whether the run
    /// finished in time without errors.
    async fn run_once(
        &mut self,
        system: &str,
        algorithm: &mut dyn SamplingAlgorithm,
        model: &Cnf,
        variant: &Cnf,
        coords: ExperimentCoordinates,
    ) -> Result<bool, StageFailure> {
        let mut result = self.runner.run(algorithm, variant).await;

        let mut sample_metrics = None;
        let mut named = None;
        if let Some(raw) = result.sample.take() {
            match self.canonical_sample(&raw, model, variant) {
                Ok((metrics, sample)) => {
                    sample_metrics = Some(metrics);
                    named = Some(sample);
                }
                Err(failure) => {
                    warn!("{} {}: {}, skipping {}", system, coords, failure, failure.scope());
                    if result.terminated_in_time {
                        result.no_error_occurred = false;
                    }
                }
            }
        }

        if !result.no_error_occurred {
            warn!(
                "{} {}: {} reported errors ({} stderr lines)",
                system,
                coords,
                algorithm.name(),
                result.errors.len()
            );
        }

        if self.config.store_samples {
            if let Some(sample) = &named {
                if let Err(e) = self
                    .writer
                    .write_sample(system, algorithm.name(), &coords, &sample.to_lines())
                {
                    warn!("{} {}: could not store sample: {}", system, coords, e);
                }
            }
        }

        let similarity = if self.stability.is_enabled() {
            match named {
                Some(sample) => self.stability.record(&coords, sample),
                None => self.stability.clear(&coords),
            }
            Some(
                self.stability
                    .compare_to_previous(&coords)
                    .unwrap_or_else(SimilarityResult::unavailable),
            )
        } else {
            None
        };

        let record = record_for(system, algorithm.name(), coords, &result, sample_metrics, similarity);
        self.writer.write_run(&record)?;
        Ok(result.is_success())
    }

    /// Maps a raw sample back to the canonical model and scores it.
    fn canonical_sample(
        &self,
        raw: &Sample,
        model: &Cnf,
        variant: &Cnf,
    ) -> Result<(SampleMetrics, FeatureSample), StageFailure> {
        let sample = remap(raw, variant.variables(), model.variables())?.canonicalize();
        let metrics = SampleMetrics {
            size: sample.len(),
            validity: self.analyzer.validity(model, &sample),
            coverage: self.analyzer.coverage(model, &sample, self.config.t),
        };
        Ok((metrics, sample.to_feature_sample(model.variables())?))
    }

    fn dispose(&self) {
        if self.config.debug {
            debug!("Keeping scratch directory {}", self.layout.temp.display());
            return;
        }
        match fs::remove_dir_all(&self.layout.temp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                warn!("Could not remove {}: {}", self.layout.temp.display(), e)
            }
            _ => debug!("Removed scratch directory {}", self.layout.temp.display()),
        }
    }
}

fn record_for(
    system: &str,
    algorithm: &str,
    coordinates: ExperimentCoordinates,
    result: &RunResult,
    sample_metrics: Option<SampleMetrics>,
    similarity: Option<SimilarityResult>,
) -> RunRecord {
    RunRecord {
        system: system.to_string(),
        algorithm: algorithm.to_string(),
        coordinates,
        terminated_in_time: result.terminated_in_time,
        no_error_occurred: result.no_error_occurred,
        runtime_millis: result.runtime_millis,
        sample_metrics,
        similarity,
        memory: result.memory.unwrap_or_default(),
    }
}

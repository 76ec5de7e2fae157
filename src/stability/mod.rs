//! Sample stability across consecutive systems.
//!
//! The evaluator keeps the samples of the current system and the one before
//! it. Each run's sample is compared with the sample the previous system
//! produced at the same system iteration and algorithm.

pub mod cache;
pub mod metrics;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::experiment::ExperimentCoordinates;
use crate::model::Variables;
use crate::sample::FeatureSample;

pub use cache::SampleGrid;
pub use metrics::{Fimdc, Icst, Msoc, Roic, StabilityInput, StabilityMetric};

/// The four stability metrics of one comparison, `-1` where undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub roic: f64,
    pub msoc: f64,
    pub fimdc: f64,
    pub icst: f64,
}

impl SimilarityResult {
    pub fn unavailable() -> Self {
        Self {
            roic: -1.0,
            msoc: -1.0,
            fimdc: -1.0,
            icst: -1.0,
        }
    }
}

impl Default for SimilarityResult {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Owns both sample grids and computes the metrics.
#[derive(Debug, Default)]
pub struct StabilityEvaluator {
    enabled: bool,
    current: Option<SampleGrid>,
    previous: Option<SampleGrid>,
}

impl StabilityEvaluator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: None,
            previous: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts a new system: the current grid becomes the previous one.
    pub fn begin_system(&mut self, system_iterations: usize, algorithms: usize) {
        if !self.enabled {
            return;
        }
        self.previous = self.current.take();
        self.current = Some(SampleGrid::new(system_iterations, algorithms));
    }

    /// Sets the canonical model of the current system.
    pub fn set_model(&mut self, model: Arc<Variables>) {
        if let Some(grid) = self.current.as_mut() {
            grid.set_model(model);
        }
    }

    /// Records the sample a run produced.
    pub fn record(&mut self, coords: &ExperimentCoordinates, sample: FeatureSample) {
        let Some(grid) = self.current.as_mut() else {
            return;
        };
        if !grid.set(coords.system_iteration, coords.algorithm_index, sample) {
            warn!("{}: no stability cell for this run", coords);
        }
    }

    /// Forgets the cell of a run that produced no usable sample.
    pub fn clear(&mut self, coords: &ExperimentCoordinates) {
        if let Some(grid) = self.current.as_mut() {
            grid.clear(coords.system_iteration, coords.algorithm_index);
        }
    }

    /// Compares the current cell at `coords` with the previous system's.
    ///
    /// `None` when stability is disabled, for the first system, or when
    /// either cell or model is missing.
    pub fn compare_to_previous(&self, coords: &ExperimentCoordinates) -> Option<SimilarityResult> {
        if !self.enabled || coords.system_index == 0 {
            return None;
        }
        let (current, previous) = (self.current.as_ref()?, self.previous.as_ref()?);
        let new_sample = current.get(coords.system_iteration, coords.algorithm_index)?;
        let old_sample = previous.get(coords.system_iteration, coords.algorithm_index)?;
        let (new_model, old_model) = (current.model()?, previous.model()?);

        let old_selected = old_sample.selected_features();
        let new_selected = new_sample.selected_features();
        let input = StabilityInput {
            old_model,
            old_sample: &old_selected,
            new_model,
            new_sample: &new_selected,
        };
        Some(evaluate(&input))
    }
}

/// Computes all four metrics; a failing metric yields `-1` alone.
pub fn evaluate(input: &StabilityInput<'_>) -> SimilarityResult {
    SimilarityResult {
        roic: isolated(&Roic, input),
        msoc: isolated(&Msoc, input),
        fimdc: isolated(&Fimdc, input),
        icst: isolated(&Icst, input),
    }
}

fn isolated(metric: &dyn StabilityMetric, input: &StabilityInput<'_>) -> f64 {
    match metric.compute(input) {
        Ok(value) => value,
        Err(e) => {
            debug!("{} not computed: {}", metric.name(), e);
            -1.0
        }
    }
}

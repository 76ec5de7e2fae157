//! The four sample-stability metrics.
//!
//! All metrics look at positively selected features only. Configurations are
//! compared as feature-name sets, so the two samples may come from models
//! with different variable numberings or even different feature sets.

use std::collections::{BTreeSet, HashSet};

use crate::error::StabilityError;
use crate::model::Variables;

/// A configuration reduced to its selected feature names.
pub type FeatureSet = BTreeSet<String>;

/// Inputs of one comparison: the older system's cell and the newer one.
#[derive(Debug, Clone, Copy)]
pub struct StabilityInput<'a> {
    pub old_model: &'a Variables,
    pub old_sample: &'a [FeatureSet],
    pub new_model: &'a Variables,
    pub new_sample: &'a [FeatureSet],
}

pub trait StabilityMetric: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute(&self, input: &StabilityInput<'_>) -> Result<f64, StabilityError>;
}

/// Ratio of inherited configurations.
///
/// Fraction of new configurations whose projection onto the features both
/// models share also occurs among the projected old configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roic;

impl StabilityMetric for Roic {
    fn name(&self) -> &'static str {
        "ROIC"
    }

    fn compute(&self, input: &StabilityInput<'_>) -> Result<f64, StabilityError> {
        ensure_non_empty(input)?;
        let common: HashSet<&str> = input
            .old_model
            .names()
            .filter(|n| input.new_model.index_of(n).is_some())
            .collect();
        let project = |c: &FeatureSet| -> BTreeSet<String> {
            c.iter().filter(|f| common.contains(f.as_str())).cloned().collect()
        };
        let inherited: HashSet<BTreeSet<String>> = input.old_sample.iter().map(|c| project(c)).collect();
        let matched = input
            .new_sample
            .iter()
            .filter(|c| inherited.contains(&project(*c)))
            .count();
        Ok(matched as f64 / input.new_sample.len() as f64)
    }
}

/// Mean size of change.
///
/// Mean over new configurations of the Jaccard distance to the closest old
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Msoc;

impl StabilityMetric for Msoc {
    fn name(&self) -> &'static str {
        "MSOC"
    }

    fn compute(&self, input: &StabilityInput<'_>) -> Result<f64, StabilityError> {
        ensure_non_empty(input)?;
        let total: f64 = input
            .new_sample
            .iter()
            .map(|new| {
                input
                    .old_sample
                    .iter()
                    .map(|old| jaccard_distance(new, old))
                    .fold(f64::INFINITY, f64::min)
            })
            .sum();
        Ok(total / input.new_sample.len() as f64)
    }
}

/// Feature interaction distribution change.
///
/// Mean absolute difference in per-feature selection frequency over every
/// feature of either model.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fimdc;

impl StabilityMetric for Fimdc {
    fn name(&self) -> &'static str {
        "FIMDC"
    }

    fn compute(&self, input: &StabilityInput<'_>) -> Result<f64, StabilityError> {
        ensure_non_empty(input)?;
        let mut universe: BTreeSet<&str> = input.old_model.names().collect();
        universe.extend(input.new_model.names());
        universe.extend(input.old_sample.iter().flatten().map(String::as_str));
        universe.extend(input.new_sample.iter().flatten().map(String::as_str));
        if universe.is_empty() {
            return Err(StabilityError::Undefined {
                metric: self.name(),
                reason: "no features".to_string(),
            });
        }
        let total: f64 = universe
            .iter()
            .map(|f| (frequency(input.old_sample, f) - frequency(input.new_sample, f)).abs())
            .sum();
        Ok(total / universe.len() as f64)
    }
}

/// Inter-configuration similarity, compared between the two samples.
///
/// `1 - |d_old - d_new|` where `d` is a sample's mean pairwise Jaccard
/// distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Icst;

impl StabilityMetric for Icst {
    fn name(&self) -> &'static str {
        "ICST"
    }

    fn compute(&self, input: &StabilityInput<'_>) -> Result<f64, StabilityError> {
        ensure_non_empty(input)?;
        let old = mean_pairwise_distance(input.old_sample);
        let new = mean_pairwise_distance(input.new_sample);
        Ok(1.0 - (old - new).abs())
    }
}

fn ensure_non_empty(input: &StabilityInput<'_>) -> Result<(), StabilityError> {
    if input.old_sample.is_empty() || input.new_sample.is_empty() {
        return Err(StabilityError::EmptySample);
    }
    Ok(())
}

fn jaccard_distance(a: &FeatureSet, b: &FeatureSet) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    1.0 - intersection as f64 / union as f64
}

fn frequency(sample: &[FeatureSet], feature: &str) -> f64 {
    sample.iter().filter(|c| c.contains(feature)).count() as f64 / sample.len() as f64
}

fn mean_pairwise_distance(sample: &[FeatureSet]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in sample.iter().enumerate() {
        for b in &sample[i + 1..] {
            total += jaccard_distance(a, b);
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

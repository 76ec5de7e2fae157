//! Samples and configurations.
//!
//! A [`Sample`] holds configurations as signed variable indices of one
//! variable space. A [`FeatureSample`] is the same data expressed with signed
//! feature names, which is what gets persisted and compared across systems.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::RemapError;
use crate::model::Variables;

/// One configuration: signed 1-based variable indices.
///
/// A positive literal selects the feature, a negative one deselects it and
/// an absent variable is unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    literals: Vec<i32>,
}

impl Configuration {
    pub fn new(literals: Vec<i32>) -> Self {
        Self { literals }
    }

    pub fn literals(&self) -> &[i32] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Sorts literals by variable index (negative before positive on ties)
    /// and drops duplicates.
    pub fn canonicalize(&self) -> Self {
        let mut literals = self.literals.clone();
        literals.sort_by_key(|l| (l.unsigned_abs(), *l > 0));
        literals.dedup();
        Self { literals }
    }

    /// Expresses this configuration with signed feature names.
    pub fn to_names(&self, variables: &Variables, position: usize) -> Result<Vec<String>, RemapError> {
        self.literals
            .iter()
            .map(|&l| {
                variables
                    .literal_name(l)
                    .ok_or(RemapError::UnknownIndex {
                        configuration: position,
                        literal: l,
                    })
            })
            .collect()
    }
}

/// Ordered configurations produced by one algorithm run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    configurations: Vec<Configuration>,
}

impl Sample {
    pub fn new(configurations: Vec<Configuration>) -> Self {
        Self { configurations }
    }

    pub fn push(&mut self, configuration: Configuration) {
        self.configurations.push(configuration);
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Canonicalizes every configuration. Configuration order is kept.
    pub fn canonicalize(&self) -> Self {
        Self {
            configurations: self.configurations.iter().map(Configuration::canonicalize).collect(),
        }
    }

    /// Expresses the sample with signed feature names.
    pub fn to_feature_sample(&self, variables: &Variables) -> Result<FeatureSample, RemapError> {
        let configurations = self
            .configurations
            .iter()
            .enumerate()
            .map(|(i, c)| c.to_names(variables, i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureSample { configurations })
    }
}

/// A sample expressed with signed feature names (`name` / `-name`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSample {
    configurations: Vec<Vec<String>>,
}

impl FeatureSample {
    pub fn new(configurations: Vec<Vec<String>>) -> Self {
        Self { configurations }
    }

    pub fn configurations(&self) -> &[Vec<String>] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Keeps only positively selected features of each configuration.
    pub fn selected_features(&self) -> Vec<BTreeSet<String>> {
        self.configurations
            .iter()
            .map(|c| {
                c.iter()
                    .filter(|name| !name.starts_with('-'))
                    .cloned()
                    .collect()
            })
            .collect()
    }

    /// One line per configuration, literals comma-separated.
    pub fn to_lines(&self) -> Vec<String> {
        self.configurations.iter().map(|c| c.join(",")).collect()
    }
}

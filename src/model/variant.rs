//! Randomized model variants and literal remapping between them.
//!
//! A variant carries the same formula as its source model with a permuted
//! variable numbering, shuffled clause order and shuffled literal order
//! inside each clause. Samples produced against a variant are mapped back to
//! the source numbering by variable name.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{RandomizationError, RemapError};
use crate::sample::{Configuration, Sample};

use super::cnf::{Cnf, Variables};

/// Seed used for the variant of a given system iteration.
pub fn iteration_seed(base_seed: u64, system_iteration: u32) -> u64 {
    base_seed.wrapping_add(u64::from(system_iteration))
}

/// Derives a randomized variant of `model`, deterministic in `seed`.
pub fn randomize(model: &Cnf, seed: u64) -> Result<Cnf, RandomizationError> {
    let count = model.variable_count();
    if count == 0 {
        return Err(RandomizationError::EmptyModel);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // permutation[old - 1] = new index
    let mut permutation: Vec<usize> = (1..=count).collect();
    permutation.shuffle(&mut rng);

    let source = model.variables();
    let mut names = vec![String::new(); count];
    for (old, &new) in permutation.iter().enumerate() {
        names[new - 1] = source.name(old + 1).unwrap_or_default().to_string();
    }

    let mut clauses = Vec::with_capacity(model.clauses().len());
    for clause in model.clauses() {
        let mut mapped = clause
            .iter()
            .map(|&l| {
                let new = (l.unsigned_abs() as usize)
                    .checked_sub(1)
                    .and_then(|i| permutation.get(i))
                    .ok_or(RandomizationError::LiteralOutOfRange(l))?;
                let new = *new as i32;
                Ok(if l < 0 { -new } else { new })
            })
            .collect::<Result<Vec<i32>, RandomizationError>>()?;
        mapped.shuffle(&mut rng);
        clauses.push(mapped);
    }
    clauses.shuffle(&mut rng);

    Ok(Cnf::new(Arc::new(Variables::new(names)), clauses))
}

/// Re-expresses one configuration of `from` in the numbering of `to`.
pub fn remap_configuration(
    configuration: &Configuration,
    position: usize,
    from: &Variables,
    to: &Variables,
) -> Result<Configuration, RemapError> {
    let literals = configuration
        .literals()
        .iter()
        .map(|&l| {
            let name = from
                .name(l.unsigned_abs() as usize)
                .ok_or(RemapError::UnknownIndex {
                    configuration: position,
                    literal: l,
                })?;
            let index = to.index_of(name).ok_or_else(|| RemapError::MissingVariable {
                configuration: position,
                name: name.to_string(),
            })? as i32;
            Ok(if l < 0 { -index } else { index })
        })
        .collect::<Result<Vec<_>, RemapError>>()?;
    Ok(Configuration::new(literals))
}

/// Re-expresses every configuration of `sample` in the numbering of `to`.
///
/// Variables are matched by name only. The first configuration referencing a
/// variable unknown to either side fails the whole remap.
pub fn remap(sample: &Sample, from: &Variables, to: &Variables) -> Result<Sample, RemapError> {
    let configurations = sample
        .configurations()
        .iter()
        .enumerate()
        .map(|(i, c)| remap_configuration(c, i, from, to))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Sample::new(configurations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dimacs;

    fn model() -> Cnf {
        dimacs::parse(
            "c 1 Root\nc 2 A\nc 3 B\nc 4 C\nc 5 D\np cnf 5 4\n1 0\n-2 1 0\n-3 1 0\n-4 -5 0\n",
        )
        .unwrap()
    }

    fn sorted_clauses_by_name(cnf: &Cnf) -> Vec<Vec<String>> {
        let mut clauses: Vec<Vec<String>> = cnf
            .clauses()
            .iter()
            .map(|c| {
                let mut names: Vec<String> = c
                    .iter()
                    .map(|&l| cnf.variables().literal_name(l).unwrap())
                    .collect();
                names.sort();
                names
            })
            .collect();
        clauses.sort();
        clauses
    }

    #[test]
    fn test_randomize_preserves_variable_count_and_semantics() {
        let source = model();
        let variant = randomize(&source, 42).unwrap();
        assert_eq!(variant.variable_count(), source.variable_count());
        assert_eq!(variant.clauses().len(), source.clauses().len());
        assert_eq!(sorted_clauses_by_name(&variant), sorted_clauses_by_name(&source));
    }

    #[test]
    fn test_randomize_is_deterministic_per_seed() {
        let source = model();
        assert_eq!(randomize(&source, 7).unwrap(), randomize(&source, 7).unwrap());
    }

    #[test]
    fn test_iteration_seed_differs_across_iterations() {
        assert_eq!(iteration_seed(100, 1), 101);
        assert_ne!(iteration_seed(100, 1), iteration_seed(100, 2));
        assert_eq!(iteration_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn test_randomize_rejects_empty_model() {
        let empty = Cnf::new(Arc::new(Variables::new(vec![])), vec![]);
        assert!(matches!(randomize(&empty, 1), Err(RandomizationError::EmptyModel)));
    }

    #[test]
    fn test_remap_round_trip_restores_selected_names() {
        let source = model();
        let sample = Sample::new(vec![
            Configuration::new(vec![1, -2, 3, -4, 5]),
            Configuration::new(vec![1, 2]),
        ]);
        for seed in 0..8 {
            let variant = randomize(&source, seed).unwrap();
            let there = remap(&sample, source.variables(), variant.variables()).unwrap();
            let back = remap(&there, variant.variables(), source.variables()).unwrap();
            assert_eq!(back.canonicalize(), sample.canonicalize());
            assert_eq!(
                there.to_feature_sample(variant.variables()).unwrap(),
                sample.to_feature_sample(source.variables()).unwrap()
            );
        }
    }

    #[test]
    fn test_remap_reports_missing_variable() {
        let from = Variables::new(vec!["A".into(), "B".into()]);
        let to = Variables::new(vec!["A".into()]);
        let sample = Sample::new(vec![Configuration::new(vec![1]), Configuration::new(vec![-2])]);
        let err = remap(&sample, &from, &to).unwrap_err();
        assert!(matches!(
            err,
            RemapError::MissingVariable { configuration: 1, ref name } if name == "B"
        ));
    }
}

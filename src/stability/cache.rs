//! Per-system grid of recorded samples.

use std::sync::Arc;

use crate::model::Variables;
use crate::sample::FeatureSample;

/// Samples of one system, addressed by `[system_iteration - 1][algorithm_index]`.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    algorithms: usize,
    cells: Vec<Option<FeatureSample>>,
    model: Option<Arc<Variables>>,
}

impl SampleGrid {
    pub fn new(system_iterations: usize, algorithms: usize) -> Self {
        Self {
            algorithms,
            cells: vec![None; system_iterations * algorithms],
            model: None,
        }
    }

    fn slot(&self, system_iteration: u32, algorithm_index: usize) -> Option<usize> {
        let row = (system_iteration as usize).checked_sub(1)?;
        if algorithm_index >= self.algorithms {
            return None;
        }
        let slot = row * self.algorithms + algorithm_index;
        (slot < self.cells.len()).then_some(slot)
    }

    /// Stores a sample. Returns false if the address is outside the grid.
    pub fn set(&mut self, system_iteration: u32, algorithm_index: usize, sample: FeatureSample) -> bool {
        match self.slot(system_iteration, algorithm_index) {
            Some(slot) => {
                self.cells[slot] = Some(sample);
                true
            }
            None => false,
        }
    }

    /// Empties a cell, e.g. after a repetition that produced no sample.
    pub fn clear(&mut self, system_iteration: u32, algorithm_index: usize) {
        if let Some(slot) = self.slot(system_iteration, algorithm_index) {
            self.cells[slot] = None;
        }
    }

    pub fn get(&self, system_iteration: u32, algorithm_index: usize) -> Option<&FeatureSample> {
        self.slot(system_iteration, algorithm_index)
            .and_then(|slot| self.cells[slot].as_ref())
    }

    pub fn set_model(&mut self, model: Arc<Variables>) {
        self.model = Some(model);
    }

    pub fn model(&self) -> Option<&Arc<Variables>> {
        self.model.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> FeatureSample {
        FeatureSample::new(vec![vec![name.to_string()]])
    }

    #[test]
    fn test_cells_are_addressed_one_based_by_iteration() {
        let mut grid = SampleGrid::new(2, 3);
        assert!(grid.set(1, 0, sample("a")));
        assert!(grid.set(2, 2, sample("b")));
        assert_eq!(grid.get(1, 0), Some(&sample("a")));
        assert_eq!(grid.get(2, 2), Some(&sample("b")));
        assert!(grid.get(1, 2).is_none());
    }

    #[test]
    fn test_clear_empties_only_that_cell() {
        let mut grid = SampleGrid::new(1, 2);
        grid.set(1, 0, sample("a"));
        grid.set(1, 1, sample("b"));
        grid.clear(1, 0);
        grid.clear(3, 0);
        assert!(grid.get(1, 0).is_none());
        assert_eq!(grid.get(1, 1), Some(&sample("b")));
    }

    #[test]
    fn test_out_of_range_addresses() {
        let mut grid = SampleGrid::new(2, 2);
        assert!(!grid.set(0, 0, sample("a")));
        assert!(!grid.set(3, 0, sample("a")));
        assert!(!grid.set(1, 2, sample("a")));
        assert!(grid.get(0, 0).is_none());
    }
}

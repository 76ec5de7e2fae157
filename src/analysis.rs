//! Sample validity and t-wise coverage.

use std::collections::HashSet;

use crate::model::Cnf;
use crate::sample::{Configuration, Sample};

/// Upper bound on enumerated literal combinations per coverage computation.
pub const INTERACTION_BUDGET: u64 = 10_000_000;

/// Scores a sample against the formula it was produced for.
pub trait SampleAnalyzer: Send + Sync {
    /// Fraction of configurations that satisfy the formula, in `[0, 1]`.
    fn validity(&self, cnf: &Cnf, sample: &Sample) -> f64;

    /// Fraction of admissible t-wise literal interactions covered, in
    /// `[0, 1]`, or `-1`.
    fn coverage(&self, cnf: &Cnf, sample: &Sample, t: usize) -> f64;
}

/// Clause-checking analyzer over partial assignments.
///
/// A configuration violates a clause only when every literal of the clause is
/// explicitly assigned false; unconstrained variables never falsify.
///
/// Coverage counts an interaction as admissible unless it falsifies a unit or
/// binary clause on its own. Interactions excluded only by longer clauses
/// still count, so for such formulas the score is a lower bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct CnfAnalyzer {
    budget: Option<u64>,
}

impl CnfAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = Some(budget);
        self
    }

    fn budget(&self) -> u64 {
        self.budget.unwrap_or(INTERACTION_BUDGET)
    }

    fn satisfies(cnf: &Cnf, configuration: &Configuration) -> bool {
        let assigned: HashSet<i32> = configuration.literals().iter().copied().collect();
        cnf.clauses()
            .iter()
            .all(|clause| !clause.iter().all(|l| assigned.contains(&-l)))
    }
}

impl SampleAnalyzer for CnfAnalyzer {
    fn validity(&self, cnf: &Cnf, sample: &Sample) -> f64 {
        if sample.is_empty() {
            return 1.0;
        }
        let valid = sample
            .configurations()
            .iter()
            .filter(|c| Self::satisfies(cnf, c))
            .count();
        valid as f64 / sample.len() as f64
    }

    fn coverage(&self, cnf: &Cnf, sample: &Sample, t: usize) -> f64 {
        if sample.is_empty() {
            return 0.0;
        }
        let n = cnf.variable_count();
        let Some(upper) = binomial(n as u64, t as u64).and_then(|c| c.checked_mul(1u64 << t.min(63))) else {
            return -1.0;
        };
        if upper > self.budget() {
            return -1.0;
        }

        let canonical = sample.canonicalize();
        let mut enumerated = 0u64;
        for configuration in canonical.configurations() {
            match binomial(configuration.len() as u64, t as u64) {
                Some(c) => enumerated = enumerated.saturating_add(c),
                None => return -1.0,
            }
        }
        if enumerated > self.budget() {
            return -1.0;
        }

        let constraints = ShortClauses::from_cnf(cnf);
        let total = count_admissible(n as u32, t, 1, &mut Vec::with_capacity(t), &constraints);
        if total == 0 {
            return 1.0;
        }

        let mut covered: HashSet<Vec<i32>> = HashSet::new();
        let mut combination = Vec::with_capacity(t);
        for configuration in canonical.configurations() {
            collect_combinations(configuration.literals(), t, 0, &mut combination, &mut covered);
        }
        let admitted = covered.iter().filter(|i| constraints.admits(i)).count();
        admitted as f64 / total as f64
    }
}

/// Unit and binary clauses, as the literals and literal pairs they forbid.
#[derive(Debug, Default)]
struct ShortClauses {
    forbidden: HashSet<i32>,
    exclusive: HashSet<(i32, i32)>,
}

impl ShortClauses {
    fn from_cnf(cnf: &Cnf) -> Self {
        let mut constraints = Self::default();
        for clause in cnf.clauses() {
            match clause.as_slice() {
                [a] => {
                    constraints.forbidden.insert(-a);
                }
                [a, b] => {
                    constraints.exclusive.insert(ordered(-a, -b));
                }
                _ => {}
            }
        }
        constraints
    }

    /// Whether `literal` can join `current` without falsifying a short clause.
    fn compatible(&self, current: &[i32], literal: i32) -> bool {
        !self.forbidden.contains(&literal)
            && current
                .iter()
                .all(|&other| !self.exclusive.contains(&ordered(other, literal)))
    }

    fn admits(&self, interaction: &[i32]) -> bool {
        interaction
            .iter()
            .enumerate()
            .all(|(i, &l)| self.compatible(&interaction[..i], l))
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Counts admissible interactions of `t` literals over variables `next..=n`.
fn count_admissible(n: u32, t: usize, next: u32, current: &mut Vec<i32>, constraints: &ShortClauses) -> u64 {
    if current.len() == t {
        return 1;
    }
    let mut count = 0;
    for variable in next..=n {
        let variable = variable as i32;
        for literal in [variable, -variable] {
            if constraints.compatible(current, literal) {
                current.push(literal);
                count += count_admissible(n, t, variable as u32 + 1, current, constraints);
                current.pop();
            }
        }
    }
    count
}

fn collect_combinations(
    literals: &[i32],
    t: usize,
    start: usize,
    current: &mut Vec<i32>,
    out: &mut HashSet<Vec<i32>>,
) {
    if current.len() == t {
        out.insert(current.clone());
        return;
    }
    for i in start..literals.len() {
        let literal = literals[i];
        // skip a second literal over the same variable
        if current.last().is_some_and(|l| l.unsigned_abs() == literal.unsigned_abs()) {
            continue;
        }
        current.push(literal);
        collect_combinations(literals, t, i + 1, current, out);
        current.pop();
    }
}

/// `n choose k`, or `None` on overflow.
fn binomial(n: u64, k: u64) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k {
        result = result.checked_mul(n - i)? / (i + 1);
    }
    Some(result)
}

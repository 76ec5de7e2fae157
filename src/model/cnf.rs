//! Boolean formula in conjunctive normal form with named variables.

use std::collections::HashMap;
use std::sync::Arc;

/// Ordered variable names of a formula.
///
/// Variables are addressed 1-based, matching DIMACS literals: variable `i`
/// is named `names[i - 1]` and appears in clauses as `i` or `-i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Variables {
    /// Creates a variable space from names in index order.
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i + 1);
        }
        Self { names, index }
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if there are no variables.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the 1-based variable `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// 1-based index of the variable called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Signed name of a literal: `name` when positive, `-name` when negative.
    pub fn literal_name(&self, literal: i32) -> Option<String> {
        let name = self.name(literal.unsigned_abs() as usize)?;
        if literal < 0 {
            Some(format!("-{}", name))
        } else {
            Some(name.to_string())
        }
    }

    /// Signed literal for a possibly `-`-prefixed feature name.
    pub fn literal_of(&self, signed_name: &str) -> Option<i32> {
        let (negative, name) = match signed_name.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, signed_name),
        };
        let index = self.index_of(name)? as i32;
        Some(if negative { -index } else { index })
    }

    /// Iterates names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// A formula over a shared variable space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    variables: Arc<Variables>,
    clauses: Vec<Vec<i32>>,
}

impl Cnf {
    /// Creates a formula. Literals must reference variables in `variables`.
    pub fn new(variables: Arc<Variables>, clauses: Vec<Vec<i32>>) -> Self {
        Self { variables, clauses }
    }

    pub fn variables(&self) -> &Arc<Variables> {
        &self.variables
    }

    pub fn clauses(&self) -> &[Vec<i32>] {
        &self.clauses
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

//! DIMACS CNF reading and writing.
//!
//! Variable names travel in comment lines of the form `c <index> <name>`,
//! the convention used by feature-model tooling. Variables without such a
//! line are named after their index.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::ModelError;

use super::cnf::{Cnf, Variables};

/// Parses DIMACS text into a formula.
pub fn parse(text: &str) -> Result<Cnf, ModelError> {
    let mut declared_vars: Option<usize> = None;
    let mut declared_clauses: Option<usize> = None;
    let mut named: Vec<(usize, String)> = Vec::new();
    let mut clauses: Vec<Vec<i32>> = Vec::new();
    let mut pending: Vec<i32> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        if let Some(comment) = line.strip_prefix('c') {
            let mut parts = comment.trim().splitn(2, char::is_whitespace);
            if let (Some(index), Some(name)) = (parts.next(), parts.next()) {
                if let Ok(index) = index.trim_end_matches('$').parse::<usize>() {
                    named.push((index, name.trim().to_string()));
                }
            }
            continue;
        }
        if let Some(problem) = line.strip_prefix('p') {
            let fields: Vec<&str> = problem.split_whitespace().collect();
            if fields.len() != 3 || fields[0] != "cnf" {
                return Err(ModelError::Parse {
                    line: line_no,
                    message: format!("malformed problem line '{}'", line),
                });
            }
            declared_vars = Some(parse_count(fields[1], line_no)?);
            declared_clauses = Some(parse_count(fields[2], line_no)?);
            continue;
        }

        let var_count = declared_vars.ok_or_else(|| ModelError::Parse {
            line: line_no,
            message: "clause before problem line".to_string(),
        })?;
        for token in line.split_whitespace() {
            let literal: i32 = token.parse().map_err(|_| ModelError::Parse {
                line: line_no,
                message: format!("invalid literal '{}'", token),
            })?;
            if literal == 0 {
                clauses.push(std::mem::take(&mut pending));
                continue;
            }
            if literal.unsigned_abs() as usize > var_count {
                return Err(ModelError::Parse {
                    line: line_no,
                    message: format!("literal {} exceeds {} declared variables", literal, var_count),
                });
            }
            pending.push(literal);
        }
    }

    let var_count = declared_vars.ok_or_else(|| ModelError::Parse {
        line: 0,
        message: "missing problem line".to_string(),
    })?;
    if !pending.is_empty() {
        clauses.push(pending);
    }
    if let Some(expected) = declared_clauses {
        if expected != clauses.len() {
            tracing::debug!(
                "DIMACS declares {} clauses but contains {}",
                expected,
                clauses.len()
            );
        }
    }

    let mut names: Vec<String> = (1..=var_count).map(|i| i.to_string()).collect();
    for (index, name) in named {
        if index >= 1 && index <= var_count {
            names[index - 1] = name;
        }
    }

    Ok(Cnf::new(Arc::new(Variables::new(names)), clauses))
}

fn parse_count(field: &str, line: usize) -> Result<usize, ModelError> {
    field.parse().map_err(|_| ModelError::Parse {
        line,
        message: format!("invalid count '{}'", field),
    })
}

/// Serializes a formula to DIMACS text.
pub fn write(cnf: &Cnf) -> String {
    let mut out = String::new();
    for (i, name) in cnf.variables().names().enumerate() {
        let _ = writeln!(out, "c {} {}", i + 1, name);
    }
    let _ = writeln!(out, "p cnf {} {}", cnf.variable_count(), cnf.clauses().len());
    for clause in cnf.clauses() {
        for literal in clause {
            let _ = write!(out, "{} ", literal);
        }
        out.push_str("0\n");
    }
    out
}

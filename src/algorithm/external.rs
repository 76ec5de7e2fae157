//! Algorithms launched from a command-line template.
//!
//! Two kinds share this implementation: `command` runs the template as is,
//! `java` prefixes it with a JVM launch carrying heap limits and a GC log.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{PluginError, ProcessError, ResultParseError};
use crate::memory::{GcLogAnalyzer, MemoryStats};
use crate::model::{dimacs, Cnf, Variables};
use crate::sample::{Configuration, Sample};

use super::registry::PluginDefinition;
use super::{find_program, AlgorithmContext, AlgorithmDescriptor, SamplingAlgorithm};

/// An algorithm backed by an external program.
pub struct ExternalAlgorithm {
    definition: PluginDefinition,
    context: AlgorithmContext,
    java: bool,
    command: Vec<String>,
    stdout_lines: Vec<String>,
}

impl ExternalAlgorithm {
    /// Plain command kind.
    pub fn command(definition: &PluginDefinition, context: &AlgorithmContext) -> Self {
        Self::with_kind(definition, context, false)
    }

    /// JVM kind.
    pub fn java(definition: &PluginDefinition, context: &AlgorithmContext) -> Self {
        Self::with_kind(definition, context, true)
    }

    fn with_kind(definition: &PluginDefinition, context: &AlgorithmContext, java: bool) -> Self {
        Self {
            definition: definition.clone(),
            context: context.clone(),
            java,
            command: Vec::new(),
            stdout_lines: Vec::new(),
        }
    }

    fn substitute(&self, arg: &str) -> String {
        arg.replace("{model}", &self.context.model_path().to_string_lossy())
            .replace("{output}", &self.context.sample_path().to_string_lossy())
            .replace("{gclog}", &self.context.gc_log_path().to_string_lossy())
            .replace("{t}", &self.context.t.to_string())
    }

    fn build_command(&self) -> Vec<String> {
        let mut command = Vec::new();
        if self.java {
            command.push("java".to_string());
            command.push("-da".to_string());
            if let Some(max) = &self.context.maximum_memory {
                command.push(format!("-Xmx{}", max));
            }
            if let Some(min) = &self.context.minimum_memory {
                command.push(format!("-Xms{}", min));
            }
            command.push(format!("-Xlog:gc:{}", self.context.gc_log_path().display()));
        }
        command.extend(self.definition.command.iter().map(|a| self.substitute(a)));
        command
    }

    fn program(&self) -> Option<&str> {
        if self.java {
            Some("java")
        } else {
            self.definition.command.first().map(String::as_str)
        }
    }
}

#[async_trait]
impl SamplingAlgorithm for ExternalAlgorithm {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn full_name(&self) -> &str {
        self.definition.full_name.as_deref().unwrap_or(&self.definition.name)
    }

    fn iterations(&self) -> Option<u32> {
        self.definition.iterations
    }

    fn descriptor(&self) -> AlgorithmDescriptor {
        AlgorithmDescriptor {
            name: self.definition.name.clone(),
            t: self.context.t,
            iterations: self.iterations(),
            minimum_memory: self.context.minimum_memory.clone(),
            maximum_memory: self.context.maximum_memory.clone(),
        }
    }

    fn check_available(&self) -> Result<(), PluginError> {
        match self.program() {
            Some(program) if find_program(program).is_some() => Ok(()),
            Some(program) => Err(PluginError::NotFound(format!(
                "{} (program '{}' not on PATH)",
                self.definition.name, program
            ))),
            None => Err(PluginError::NotFound(format!(
                "{} (empty command)",
                self.definition.name
            ))),
        }
    }

    async fn pre_process(&mut self, variant: &Cnf) -> Result<(), ProcessError> {
        self.stdout_lines.clear();
        fs::create_dir_all(&self.context.scratch_dir).await?;
        remove_if_present(&self.context.sample_path()).await?;
        remove_if_present(&self.context.gc_log_path()).await?;

        let model_path = self.context.model_path();
        fs::write(&model_path, dimacs::write(variant))
            .await
            .map_err(|e| ProcessError::Setup(format!("writing {}: {}", model_path.display(), e)))?;

        self.command = self.build_command();
        debug!("{} command: {}", self.definition.name, self.command.join(" "));
        Ok(())
    }

    fn command_elements(&self) -> &[String] {
        &self.command
    }

    fn consume_line(&mut self, line: &str) {
        if self.definition.sample_from_stdout {
            self.stdout_lines.push(line.to_string());
        }
    }

    async fn parse_results(&mut self, variables: &Variables) -> Result<Option<Sample>, ResultParseError> {
        if self.definition.sample_from_stdout {
            let lines = std::mem::take(&mut self.stdout_lines);
            return parse_sample_lines(lines.iter().map(String::as_str), variables).map(Some);
        }
        let path = self.context.sample_path();
        if !path.is_file() {
            return Err(ResultParseError::MissingOutput(path));
        }
        let text = fs::read_to_string(&path).await?;
        parse_sample_lines(text.lines(), variables).map(Some)
    }

    async fn parse_memory(&self) -> Result<MemoryStats, ResultParseError> {
        if !self.java {
            return Ok(MemoryStats::unavailable());
        }
        match GcLogAnalyzer::new().parse_file(&self.context.gc_log_path()).await {
            Err(ResultParseError::InsufficientData(path)) => {
                warn!("Not enough GC data in {}", path.display());
                Ok(MemoryStats::unavailable())
            }
            other => other,
        }
    }

    async fn post_process(&mut self) -> io::Result<()> {
        self.stdout_lines.clear();
        remove_if_present(&self.context.sample_path()).await?;
        remove_if_present(&self.context.gc_log_path()).await
    }
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Parses sample text, one configuration per line.
///
/// Literals are separated by commas or whitespace. Each is a signed variable
/// index or a feature name with an optional `-` prefix. Blank lines and lines
/// starting with `#` or `log` are skipped.
pub fn parse_sample_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    variables: &Variables,
) -> Result<Sample, ResultParseError> {
    let mut sample = Sample::default();
    for (i, raw) in lines.into_iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("log") {
            continue;
        }
        let mut literals = Vec::new();
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let literal = match token.parse::<i32>() {
                Ok(0) => {
                    return Err(ResultParseError::MalformedLiteral {
                        line: i + 1,
                        token: token.to_string(),
                    })
                }
                Ok(literal) => literal,
                Err(_) => variables
                    .literal_of(token)
                    .ok_or_else(|| ResultParseError::UnknownFeature {
                        line: i + 1,
                        name: token.to_string(),
                    })?,
            };
            literals.push(literal);
        }
        sample.push(Configuration::new(literals));
    }
    Ok(sample)
}

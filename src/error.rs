//! Error types for twise-bench operations.
//!
//! One enum per subsystem. Only [`ConfigError`] is fatal; every other kind is
//! recovered by the scheduler at the scope listed in
//! [`crate::experiment::FailureScope`]:
//! - Configuration and CLI validation
//! - Model loading and DIMACS parsing
//! - Variant randomization and literal remapping
//! - Plugin resolution
//! - Stability metrics
//! - Process execution and result parsing
//! - Result persistence

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading the experiment configuration or CLI flags.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[-alg] value is missing (algorithm name)")]
    MissingAlgorithm,

    #[error("[-alg] = {0} was not found in the plugin registry")]
    UnknownAlgorithm(String),

    #[error("[-t] = \"{0}\" not valid, specify a coverage strength between 1 and 5")]
    InvalidCoverage(String),

    #[error("[-in] = \"{0}\" does not exist")]
    MissingInputPath(PathBuf),

    #[error("[-in] = \"{0}\" does not contain any valid models (*.xml, *.dimacs)")]
    NoModelsFound(PathBuf),

    #[error("[-in] = \"{path}\": none of the {found} models could be prepared (convert *.xml models to DIMACS first)")]
    NoModelsPrepared { path: PathBuf, found: usize },

    #[error("[-out] = \"{path}\" cannot be created: {source}")]
    InvalidOutputPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read configuration '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a feature model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model '{0}' not found")]
    NotFound(String),

    #[error("Unsupported model format '{extension}' for '{path}'")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("DIMACS parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while deriving a randomized variant of a model.
#[derive(Debug, Error)]
pub enum RandomizationError {
    #[error("Model has no variables")]
    EmptyModel,

    #[error("Literal {0} is outside the model's variable space")]
    LiteralOutOfRange(i32),
}

/// Errors raised while re-expressing a configuration in another variable space.
#[derive(Debug, Error)]
pub enum RemapError {
    #[error("Configuration {configuration}: literal {literal} is outside the source variable space")]
    UnknownIndex { configuration: usize, literal: i32 },

    #[error("Configuration {configuration}: variable '{name}' is absent from the target variable space")]
    MissingVariable { configuration: usize, name: String },
}

/// Errors raised by a single stability metric.
#[derive(Debug, Error)]
pub enum StabilityError {
    #[error("Sample is empty")]
    EmptySample,

    #[error("{metric} is undefined: {reason}")]
    Undefined { metric: &'static str, reason: String },
}

/// Errors raised while resolving algorithm names to implementations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Algorithm '{0}' not found in plugin registry")]
    NotFound(String),

    #[error("Unknown plugin kind '{kind}' for algorithm '{name}'")]
    UnknownKind { name: String, kind: String },

    #[error("Algorithm '{0}' is registered twice")]
    Duplicate(String),
}

/// Errors raised while launching or supervising an algorithm process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Pre-launch setup failed: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while interpreting an algorithm's declared outputs.
#[derive(Debug, Error)]
pub enum ResultParseError {
    #[error("Output file '{0}' is missing")]
    MissingOutput(PathBuf),

    #[error("Malformed literal '{token}' on line {line}")]
    MalformedLiteral { line: usize, token: String },

    #[error("Unknown feature '{name}' on line {line}")]
    UnknownFeature { line: usize, name: String },

    #[error("Memory log '{0}' holds insufficient data")]
    InsufficientData(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while persisting results.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_flag() {
        let err = ConfigError::InvalidCoverage("6".to_string());
        assert!(err.to_string().contains("[-t]"));
        assert!(err.to_string().contains("\"6\""));

        let err = ConfigError::UnknownAlgorithm("yasa".to_string());
        assert!(err.to_string().contains("yasa"));
    }

    #[test]
    fn test_remap_error_carries_configuration() {
        let err = RemapError::MissingVariable {
            configuration: 3,
            name: "Root".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration 3: variable 'Root' is absent from the target variable space"
        );
    }
}

//! Experiment configuration.
//!
//! Read from a YAML file, then overlaid with command-line flags. Every key is
//! optional:
//!
//! ```yaml
//! output_path: ./output
//! system_iterations: 5
//! algorithm_iterations: 3
//! timeout_ms: 600000
//! t: 2
//! calculate_stability: auto
//! algorithms: [yasa]
//! plugins:
//!   - name: yasa
//!     kind: java
//!     command: [-jar, yasa.jar, -fm, "{model}", -o, "{output}", -t, "{t}"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithm::{AlgorithmContext, PluginDefinition, PluginRegistry};
use crate::error::ConfigError;

/// Longest coverage strength accepted.
pub const MAX_T: usize = 5;

/// Shared name prefix length above which `auto` enables stability.
const STABILITY_PREFIX_THRESHOLD: usize = 5;

/// When stability metrics are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawStabilityMode")]
pub enum StabilityMode {
    Enabled,
    #[default]
    Disabled,
    /// Enabled when system names look like versions of one product.
    Auto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStabilityMode {
    Flag(bool),
    Word(String),
}

impl TryFrom<RawStabilityMode> for StabilityMode {
    type Error = String;

    fn try_from(raw: RawStabilityMode) -> Result<Self, Self::Error> {
        match raw {
            RawStabilityMode::Flag(true) => Ok(Self::Enabled),
            RawStabilityMode::Flag(false) => Ok(Self::Disabled),
            RawStabilityMode::Word(word) => match word.to_lowercase().as_str() {
                "true" | "enabled" => Ok(Self::Enabled),
                "false" | "disabled" => Ok(Self::Disabled),
                "auto" => Ok(Self::Auto),
                other => Err(format!("expected true, false or auto, got '{}'", other)),
            },
        }
    }
}

/// Complete experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Root of all outputs.
    pub output_path: PathBuf,
    /// Systems to process; empty means every name in `models.txt`.
    pub systems: Vec<String>,
    pub system_iterations: u32,
    /// Repetitions for algorithms that declare none.
    pub algorithm_iterations: u32,
    /// Per-run deadline; `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    /// Base seed for variants; defaults to the current time.
    pub seed: Option<u64>,
    /// Coverage strength.
    pub t: usize,
    /// Algorithms to run, in order; empty means every plugin.
    pub algorithms: Vec<String>,
    pub plugins: Vec<PluginDefinition>,
    pub calculate_stability: StabilityMode,
    pub store_samples: bool,
    /// Keep the scratch directory after the run.
    pub debug: bool,
    pub minimum_memory: Option<String>,
    pub maximum_memory: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./output"),
            systems: Vec::new(),
            system_iterations: 1,
            algorithm_iterations: 1,
            timeout_ms: None,
            seed: None,
            t: 2,
            algorithms: Vec::new(),
            plugins: Vec::new(),
            calculate_stability: StabilityMode::Disabled,
            store_samples: true,
            debug: false,
            minimum_memory: None,
            maximum_memory: None,
        }
    }
}

/// Values given on the command line. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub algorithm: Option<String>,
    pub t: Option<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl ExperimentConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml(&text)
    }

    /// Sets the output root.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Sets the per-run deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_plugin(mut self, plugin: PluginDefinition) -> Self {
        self.plugins.push(plugin);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_T).contains(&self.t) {
            return Err(ConfigError::InvalidValue {
                key: "t".to_string(),
                message: format!("{} is not between 1 and {}", self.t, MAX_T),
            });
        }
        if self.system_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "system_iterations".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.algorithm_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "algorithm_iterations".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the plugin registry from the `plugins` section.
    pub fn registry(&self) -> Result<PluginRegistry, ConfigError> {
        let mut registry = PluginRegistry::with_builtin_kinds();
        for plugin in &self.plugins {
            registry.register(plugin.clone()).map_err(|e| ConfigError::InvalidValue {
                key: "plugins".to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(registry)
    }

    /// Applies command-line flags in the order `-alg`, `-t`, `-out`, `-in`.
    ///
    /// Returns the input directory to prepare, if one was given.
    pub fn apply_overrides(
        &mut self,
        overrides: &CliOverrides,
        registry: &PluginRegistry,
    ) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(algorithm) = &overrides.algorithm {
            let algorithm = algorithm.trim();
            if algorithm.is_empty() {
                return Err(ConfigError::MissingAlgorithm);
            }
            if !registry.contains(algorithm) {
                return Err(ConfigError::UnknownAlgorithm(algorithm.to_string()));
            }
            self.algorithms = vec![algorithm.to_string()];
        }

        if let Some(raw) = &overrides.t {
            self.t = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|t| (1..=MAX_T).contains(t))
                .ok_or_else(|| ConfigError::InvalidCoverage(raw.clone()))?;
        }

        if let Some(output) = &overrides.output {
            fs::create_dir_all(output).map_err(|source| ConfigError::InvalidOutputPath {
                path: output.clone(),
                source,
            })?;
            self.output_path = output.clone();
        }

        match &overrides.input {
            Some(input) if !input.exists() => Err(ConfigError::MissingInputPath(input.clone())),
            Some(input) => Ok(Some(input.clone())),
            None => Ok(None),
        }
    }

    /// The seed, fixed to the current time when unset.
    pub fn resolve_seed(&mut self) -> u64 {
        *self
            .seed
            .get_or_insert_with(|| Utc::now().timestamp_millis().unsigned_abs())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Algorithm names to run, in order.
    pub fn algorithm_names(&self) -> Vec<String> {
        if self.algorithms.is_empty() {
            self.plugins.iter().map(|p| p.name.clone()).collect()
        } else {
            self.algorithms.clone()
        }
    }

    /// Systems to process: the configured list, else the manifest.
    pub fn resolve_systems(&self, layout: &OutputLayout) -> Result<Vec<String>, ConfigError> {
        if !self.systems.is_empty() {
            return Ok(self.systems.clone());
        }
        if !layout.manifest.is_file() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&layout.manifest).map_err(|source| ConfigError::Read {
            path: layout.manifest.clone(),
            source,
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Whether stability metrics are computed for `systems`.
    pub fn stability_enabled(&self, systems: &[String]) -> bool {
        match self.calculate_stability {
            StabilityMode::Enabled => true,
            StabilityMode::Disabled => false,
            StabilityMode::Auto => {
                let enabled =
                    systems.len() > 1 && common_prefix_len(systems) > STABILITY_PREFIX_THRESHOLD;
                info!("Stability (auto): {}", if enabled { "enabled" } else { "disabled" });
                enabled
            }
        }
    }

    /// Settings handed to every algorithm instance.
    pub fn algorithm_context(&self, layout: &OutputLayout) -> AlgorithmContext {
        AlgorithmContext::new(self.t, &layout.temp)
            .with_memory(self.minimum_memory.clone(), self.maximum_memory.clone())
    }
}

/// Length of the longest prefix shared by all names, in characters.
fn common_prefix_len(names: &[String]) -> usize {
    let Some((first, rest)) = names.split_first() else {
        return 0;
    };
    first
        .chars()
        .enumerate()
        .take_while(|(i, c)| rest.iter().all(|n| n.chars().nth(*i) == Some(*c)))
        .count()
}

/// Directories and files under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub models: PathBuf,
    pub samples: PathBuf,
    pub csv: PathBuf,
    pub temp: PathBuf,
    pub manifest: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            models: root.join("models"),
            samples: root.join("samples"),
            csv: root.join("csv"),
            temp: root.join("temp"),
            manifest: root.join("models.txt"),
            root,
        }
    }

    /// Creates every directory of the layout.
    pub fn create_all(&self) -> Result<(), ConfigError> {
        for dir in [&self.root, &self.models, &self.samples, &self.csv, &self.temp] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::InvalidOutputPath {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> PluginRegistry {
        let config = ExperimentConfig::from_yaml("plugins:\n  - name: yasa\n    command: [yasa]\n").unwrap();
        config.registry().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ExperimentConfig::from_yaml("{}").unwrap();
        assert_eq!(config.t, 2);
        assert_eq!(config.system_iterations, 1);
        assert_eq!(config.calculate_stability, StabilityMode::Disabled);
        assert!(config.store_samples);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_stability_mode_forms() {
        for (text, expected) in [
            ("calculate_stability: true", StabilityMode::Enabled),
            ("calculate_stability: false", StabilityMode::Disabled),
            ("calculate_stability: auto", StabilityMode::Auto),
        ] {
            assert_eq!(ExperimentConfig::from_yaml(text).unwrap().calculate_stability, expected);
        }
        assert!(ExperimentConfig::from_yaml("calculate_stability: sometimes").is_err());
    }

    #[test]
    fn test_invalid_t_in_file() {
        let err = ExperimentConfig::from_yaml("t: 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "t"));
    }

    #[test]
    fn test_coverage_override_range() {
        let registry = registry();
        let mut config = ExperimentConfig::default();
        for bad in ["6", "0", "two"] {
            let overrides = CliOverrides {
                t: Some(bad.to_string()),
                ..Default::default()
            };
            assert!(matches!(
                config.apply_overrides(&overrides, &registry),
                Err(ConfigError::InvalidCoverage(_))
            ));
        }
        let overrides = CliOverrides {
            t: Some("3".to_string()),
            ..Default::default()
        };
        config.apply_overrides(&overrides, &registry).unwrap();
        assert_eq!(config.t, 3);
    }

    #[test]
    fn test_algorithm_override_restricts_run() {
        let registry = registry();
        let mut config = ExperimentConfig::default();
        let overrides = CliOverrides {
            algorithm: Some("yasa".to_string()),
            ..Default::default()
        };
        config.apply_overrides(&overrides, &registry).unwrap();
        assert_eq!(config.algorithm_names(), vec!["yasa".to_string()]);

        let overrides = CliOverrides {
            algorithm: Some("chvatal".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.apply_overrides(&overrides, &registry),
            Err(ConfigError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_input_and_output_overrides() {
        let temp = TempDir::new().unwrap();
        let registry = registry();
        let mut config = ExperimentConfig::default();
        let out = temp.path().join("out");
        let overrides = CliOverrides {
            output: Some(out.clone()),
            input: Some(temp.path().join("missing")),
            ..Default::default()
        };
        assert!(matches!(
            config.apply_overrides(&overrides, &registry),
            Err(ConfigError::MissingInputPath(_))
        ));
        assert!(out.is_dir());
        assert_eq!(config.output_path, out);
    }

    #[test]
    fn test_auto_stability_prefix_heuristic() {
        let config = ExperimentConfig::from_yaml("calculate_stability: auto").unwrap();
        let versions = vec!["linux_2.6.28".to_string(), "linux_2.6.29".to_string()];
        assert!(config.stability_enabled(&versions));
        let unrelated = vec!["busybox".to_string(), "linux".to_string()];
        assert!(!config.stability_enabled(&unrelated));
        assert!(!config.stability_enabled(&versions[..1]));
    }

    #[test]
    fn test_systems_from_manifest() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        fs::write(&layout.manifest, "a\n\nb\n").unwrap();
        let config = ExperimentConfig::default();
        assert_eq!(config.resolve_systems(&layout).unwrap(), vec!["a", "b"]);

        let config = ExperimentConfig {
            systems: vec!["c".to_string()],
            ..Default::default()
        };
        assert_eq!(config.resolve_systems(&layout).unwrap(), vec!["c"]);
    }

    #[test]
    fn test_seed_is_fixed_once_resolved() {
        let mut config = ExperimentConfig::default();
        let seed = config.resolve_seed();
        assert_eq!(config.resolve_seed(), seed);
        assert_eq!(ExperimentConfig::default().with_seed(9).resolve_seed(), 9);
    }
}

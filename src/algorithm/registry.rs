//! Algorithm lookup by name.
//!
//! Kinds map to factories, definitions map names to a kind plus its
//! command template. Resolving a name combines the two.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

use super::external::ExternalAlgorithm;
use super::{AlgorithmContext, SamplingAlgorithm};

/// Builds an algorithm from its definition.
pub type AlgorithmFactory =
    Box<dyn Fn(&PluginDefinition, &AlgorithmContext) -> Box<dyn SamplingAlgorithm> + Send + Sync>;

fn default_kind() -> String {
    "command".to_string()
}

/// One algorithm as declared in the experiment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Argument template; supports `{model}`, `{output}`, `{t}`, `{gclog}`.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    /// Read the sample from stdout instead of the output file.
    #[serde(default)]
    pub sample_from_stdout: bool,
}

pub struct PluginRegistry {
    factories: HashMap<String, AlgorithmFactory>,
    definitions: BTreeMap<String, PluginDefinition>,
}

impl PluginRegistry {
    /// An empty registry without any kinds.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    /// A registry knowing the `command` and `java` kinds.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register_kind(
            "command",
            Box::new(|def, ctx| Box::new(ExternalAlgorithm::command(def, ctx))),
        );
        registry.register_kind(
            "java",
            Box::new(|def, ctx| Box::new(ExternalAlgorithm::java(def, ctx))),
        );
        registry
    }

    pub fn register_kind(&mut self, kind: impl Into<String>, factory: AlgorithmFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Adds a definition. Its kind must already be registered.
    pub fn register(&mut self, definition: PluginDefinition) -> Result<(), PluginError> {
        if !self.factories.contains_key(&definition.kind) {
            return Err(PluginError::UnknownKind {
                name: definition.name,
                kind: definition.kind,
            });
        }
        if self.definitions.contains_key(&definition.name) {
            return Err(PluginError::Duplicate(definition.name));
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Instantiates the algorithm registered as `name`.
    pub fn resolve(
        &self,
        name: &str,
        context: &AlgorithmContext,
    ) -> Result<Box<dyn SamplingAlgorithm>, PluginError> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        let factory = self
            .factories
            .get(&definition.kind)
            .ok_or_else(|| PluginError::UnknownKind {
                name: definition.name.clone(),
                kind: definition.kind.clone(),
            })?;
        Ok(factory(definition, context))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtin_kinds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, kind: &str) -> PluginDefinition {
        PluginDefinition {
            name: name.to_string(),
            kind: kind.to_string(),
            full_name: None,
            command: vec!["sampler".to_string()],
            iterations: None,
            sample_from_stdout: false,
        }
    }

    #[test]
    fn test_resolve_registered_definition() {
        let mut registry = PluginRegistry::with_builtin_kinds();
        registry.register(def("incling", "java")).unwrap();
        let ctx = AlgorithmContext::new(2, "/scratch");
        let alg = registry.resolve("incling", &ctx).unwrap();
        assert_eq!(alg.name(), "incling");
        assert_eq!(alg.descriptor().t, 2);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let registry = PluginRegistry::with_builtin_kinds();
        let ctx = AlgorithmContext::new(2, "/scratch");
        assert!(matches!(
            registry.resolve("chvatal", &ctx),
            Err(PluginError::NotFound(name)) if name == "chvatal"
        ));
    }

    #[test]
    fn test_register_rejects_unknown_kind_and_duplicates() {
        let mut registry = PluginRegistry::with_builtin_kinds();
        assert!(matches!(
            registry.register(def("a", "python")),
            Err(PluginError::UnknownKind { .. })
        ));
        registry.register(def("a", "command")).unwrap();
        assert!(matches!(
            registry.register(def("a", "command")),
            Err(PluginError::Duplicate(_))
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_definition_yaml_defaults() {
        let def: PluginDefinition = serde_yaml::from_str("name: yasa\ncommand: [yasa, '{model}']\n").unwrap();
        assert_eq!(def.kind, "command");
        assert!(def.iterations.is_none());
        assert!(!def.sample_from_stdout);
    }
}

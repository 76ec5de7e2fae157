//! Loading feature models from disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ModelError;

use super::cnf::Cnf;
use super::dimacs;

/// File name of a prepared system model inside its directory.
pub const MODEL_FILE_NAME: &str = "model.dimacs";

/// Extensions accepted as feature-model inputs.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["xml", "dimacs"];

/// Reads a feature model file into a formula.
pub trait ModelReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Cnf, ModelError>;
}

/// Dispatches on file extension.
///
/// DIMACS is read natively. FeatureIDE XML is recognised as an input format
/// but must be converted to DIMACS by external tooling first.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileModelReader;

impl ModelReader for FileModelReader {
    fn read(&self, path: &Path) -> Result<Cnf, ModelError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "dimacs" | "cnf" => {
                let text = fs::read_to_string(path)?;
                debug!("Parsing DIMACS model {}", path.display());
                dimacs::parse(&text)
            }
            _ => Err(ModelError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Returns true if `path` has one of the accepted model extensions.
pub fn is_accepted_model(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Resolves prepared systems by name under a models directory.
pub struct ModelRepository {
    root: PathBuf,
    reader: Box<dyn ModelReader>,
}

impl ModelRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reader: Box::new(FileModelReader),
        }
    }

    /// Replaces the reader used for model files.
    pub fn with_reader(mut self, reader: Box<dyn ModelReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Path where the prepared model of `system` lives.
    pub fn model_path(&self, system: &str) -> PathBuf {
        self.root.join(system).join(MODEL_FILE_NAME)
    }

    /// Loads the model of `system`.
    ///
    /// Looks for `<root>/<system>/model.dimacs`, then `<root>/<system>.dimacs`.
    pub fn load(&self, system: &str) -> Result<Cnf, ModelError> {
        let candidates = [
            self.model_path(system),
            self.root.join(format!("{}.dimacs", system)),
        ];
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => self.reader.read(path),
            None => Err(ModelError::NotFound(system.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_accepted_extensions() {
        assert!(is_accepted_model(Path::new("a/b/linux.dimacs")));
        assert!(is_accepted_model(Path::new("busybox.xml")));
        assert!(is_accepted_model(Path::new("Linux.DIMACS")));
        assert!(!is_accepted_model(Path::new("notes.txt")));
        assert!(!is_accepted_model(Path::new("model")));
    }

    #[test]
    fn test_xml_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.xml");
        fs::write(&path, "<featureModel/>").unwrap();
        let err = FileModelReader.read(&path).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_repository_lookup() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sys")).unwrap();
        fs::write(temp.path().join("sys").join(MODEL_FILE_NAME), "p cnf 1 1\n1 0\n").unwrap();
        fs::write(temp.path().join("flat.dimacs"), "p cnf 2 0\n").unwrap();

        let repo = ModelRepository::new(temp.path());
        assert_eq!(repo.load("sys").unwrap().variable_count(), 1);
        assert_eq!(repo.load("flat").unwrap().variable_count(), 2);
        assert!(matches!(repo.load("missing"), Err(ModelError::NotFound(_))));
    }
}

//! Importing an input directory of feature models.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::OutputLayout;
use crate::error::{ConfigError, ModelError};
use crate::model::{dimacs, is_accepted_model, ModelReader, MODEL_FILE_NAME};

/// Collects accepted model files below `input`, sorted by path.
pub fn find_models(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_accepted_model(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Converts every model under `input` to `models/<system>/model.dimacs` and
/// rewrites `models.txt` with the prepared names.
///
/// A file that fails to load is logged and left out of the manifest.
pub fn prepare_models(
    input: &Path,
    layout: &OutputLayout,
    reader: &dyn ModelReader,
) -> Result<Vec<String>, ConfigError> {
    let files = find_models(input);
    if files.is_empty() {
        return Err(ConfigError::NoModelsFound(input.to_path_buf()));
    }
    fs::create_dir_all(&layout.models)?;
    let mut manifest = File::create(&layout.manifest)?;
    info!("Preparing {} models from {}", files.len(), input.display());

    let mut prepared = Vec::new();
    for (i, path) in files.iter().enumerate() {
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        info!("{}/{} - {}", i + 1, files.len(), name);
        match prepare_one(path, &name, layout, reader) {
            Ok(()) => {
                writeln!(manifest, "{}", name)?;
                prepared.push(name);
            }
            Err(e) => warn!("Could not prepare {}: {}", path.display(), e),
        }
    }
    manifest.flush()?;
    if prepared.is_empty() {
        return Err(ConfigError::NoModelsPrepared {
            path: input.to_path_buf(),
            found: files.len(),
        });
    }
    Ok(prepared)
}

fn prepare_one(
    path: &Path,
    name: &str,
    layout: &OutputLayout,
    reader: &dyn ModelReader,
) -> Result<(), ModelError> {
    let cnf = reader.read(path)?;
    let dir = layout.models.join(name);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(MODEL_FILE_NAME), dimacs::write(&cnf))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileModelReader;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_two_models() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(input.join("a.dimacs"), "c 1 Root\np cnf 1 1\n1 0\n").unwrap();
        fs::write(input.join("nested").join("b.dimacs"), "p cnf 2 0\n").unwrap();
        fs::write(input.join("readme.txt"), "ignored").unwrap();

        let layout = OutputLayout::new(temp.path().join("out"));
        fs::create_dir_all(&layout.root).unwrap();
        fs::write(&layout.manifest, "stale\n").unwrap();

        let names = prepare_models(&input, &layout, &FileModelReader).unwrap();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fs::read_to_string(&layout.manifest).unwrap(), "a\nb\n");
        assert!(layout.models.join("a").join(MODEL_FILE_NAME).is_file());
    }

    #[test]
    fn test_failing_model_is_skipped() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("good.dimacs"), "p cnf 1 0\n").unwrap();
        fs::write(input.join("fm.xml"), "<featureModel/>").unwrap();

        let layout = OutputLayout::new(temp.path().join("out"));
        let names = prepare_models(&input, &layout, &FileModelReader).unwrap();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn test_only_unreadable_models_is_rejected() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("car.xml"), "<featureModel/>").unwrap();
        fs::write(input.join("Truck.XML"), "<featureModel/>").unwrap();

        let layout = OutputLayout::new(temp.path().join("out"));
        assert!(matches!(
            prepare_models(&input, &layout, &FileModelReader),
            Err(ConfigError::NoModelsPrepared { found: 2, .. })
        ));
    }

    #[test]
    fn test_uppercase_extension_is_accepted() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("Model.DIMACS"), "p cnf 1 0\n").unwrap();

        let layout = OutputLayout::new(temp.path().join("out"));
        let names = prepare_models(&input, &layout, &FileModelReader).unwrap();
        assert_eq!(names, vec!["Model"]);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path().join("out"));
        assert!(matches!(
            prepare_models(temp.path(), &layout, &FileModelReader),
            Err(ConfigError::NoModelsFound(_))
        ));
    }
}

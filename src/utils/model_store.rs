//! Locating GGUF model files on disk
//!
//! Files are looked up under a model directory by their catalog filename:
//! - `<model_dir>/<size>/<file>` (the layout the downloader produces)
//! - `<model_dir>/<file>`
//! - anywhere below `<model_dir>` as a last resort

use crate::config::ModelCatalog;
use crate::error::MatrixError;
use crate::matrix::Cell;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves a cell to the model file the backend should load
pub trait ModelLocator {
    fn locate(&self, cell: &Cell) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    model_dir: PathBuf,
}

impl ModelStore {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Resolve a filename, or `None` if it is nowhere under the model dir
    pub fn resolve(&self, size_dir: &str, file_name: &str) -> Option<PathBuf> {
        let candidates = [
            self.model_dir.join(size_dir).join(file_name),
            self.model_dir.join(file_name),
        ];
        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            return Some(found);
        }
        find_recursive(&self.model_dir, file_name)
    }

    /// Replace computed size estimates with real sizes of files already on
    /// disk. Sizes declared in the catalog are left alone.
    pub fn annotate_file_sizes(&self, cells: &mut [Cell], catalog: &ModelCatalog) {
        for cell in cells.iter_mut() {
            let declared = catalog
                .get(&cell.model_id)
                .and_then(|m| m.declared_file_size(&cell.quant));
            if declared.is_some() {
                continue;
            }
            let Some(path) = self.resolve(&cell.size_class.to_string(), &cell.file_name) else {
                continue;
            };
            if let Ok(meta) = fs::metadata(&path) {
                cell.estimated_file_bytes = meta.len();
            }
        }
    }
}

impl ModelLocator for ModelStore {
    fn locate(&self, cell: &Cell) -> Result<PathBuf> {
        self.resolve(&cell.size_class.to_string(), &cell.file_name)
            .ok_or_else(|| {
                MatrixError::ModelFileMissing {
                    model: cell.model_id.clone(),
                    file: cell.file_name.clone(),
                    model_dir: self.model_dir.display().to_string(),
                }
                .into()
            })
    }
}

fn find_recursive(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_dir() => subdirs.push(path),
            Ok(t) if t.is_file() && entry.file_name() == file_name => return Some(path),
            _ => {}
        }
    }
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_recursive(sub, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::QuantLevel;
    use tempfile::TempDir;

    fn cell(file: &str) -> Cell {
        Cell::new("m", "7B".parse().unwrap(), QuantLevel::new("Q4_K_M"), file, 0)
    }

    #[test]
    fn test_size_dir_layout() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("7B"))?;
        fs::write(dir.path().join("7B/m-q4.gguf"), b"gguf")?;

        let store = ModelStore::new(dir.path());
        let path = store.locate(&cell("m-q4.gguf"))?;
        assert_eq!(path, dir.path().join("7B/m-q4.gguf"));
        Ok(())
    }

    #[test]
    fn test_nested_search_and_annotation() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("vendor/deep"))?;
        fs::write(dir.path().join("vendor/deep/m-q4.gguf"), vec![0u8; 1234])?;

        let store = ModelStore::new(dir.path());
        let mut cells = vec![cell("m-q4.gguf"), cell("absent.gguf")];
        store.annotate_file_sizes(&mut cells, &ModelCatalog::default());
        assert_eq!(cells[0].estimated_file_bytes, 1234);
        assert_eq!(cells[1].estimated_file_bytes, 0);
        Ok(())
    }

    #[test]
    fn test_missing_file_error() {
        let dir = TempDir::new().unwrap();
        let err = ModelStore::new(dir.path()).locate(&cell("nope.gguf")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatrixError>(),
            Some(MatrixError::ModelFileMissing { .. })
        ));
    }
}

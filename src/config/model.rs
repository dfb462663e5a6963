use crate::error::MatrixError;
use crate::hardware::detect_size_class;
use crate::matrix::{QuantLevel, SizeClass};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One catalog entry: a model and the quantized files it ships as
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    /// Parameter tier such as "7B"; detected from the name when absent
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    /// quant label -> GGUF filename
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// quant label -> file size in bytes, when known
    #[serde(default)]
    pub file_sizes: BTreeMap<String, u64>,
}

impl ModelDefinition {
    pub fn size_class(&self) -> Result<SizeClass, MatrixError> {
        match &self.size {
            Some(size) => size.parse(),
            None => detect_size_class(&self.name)
                .ok_or_else(|| MatrixError::UnknownSizeClass(self.name.clone())),
        }
    }

    pub fn file_for(&self, quant: &QuantLevel) -> Option<&String> {
        self.files
            .iter()
            .find(|(label, _)| QuantLevel::new(label.as_str()) == *quant)
            .map(|(_, file)| file)
    }

    pub fn declared_file_size(&self, quant: &QuantLevel) -> Option<u64> {
        self.file_sizes
            .iter()
            .find(|(label, _)| QuantLevel::new(label.as_str()) == *quant)
            .map(|(_, bytes)| *bytes)
    }
}

/// Model catalog loaded from `models.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
    #[serde(default)]
    pub quick_mode_quants: Option<Vec<QuantLevel>>,
    #[serde(default)]
    pub full_mode_quants: Option<Vec<QuantLevel>>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelDefinition>) -> Self {
        Self {
            models,
            ..Default::default()
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Models configuration not found: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse model catalog {}", path.display()))?;
        catalog.validate()?;
        tracing::info!("Loaded {} model definitions", catalog.models.len());
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(MatrixError::invalid_config(
                    "models",
                    format!("duplicate model name {}", model.name),
                ));
            }
            model.size_class()?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Keep only the named models, preserving catalog order
    pub fn retain_models(&mut self, names: &[String]) -> Result<(), MatrixError> {
        for name in names {
            if self.get(name).is_none() {
                return Err(MatrixError::invalid_config(
                    "models",
                    format!("unknown model {}", name),
                ));
            }
        }
        self.models.retain(|m| names.contains(&m.name));
        Ok(())
    }
}

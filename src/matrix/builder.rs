//! Quantization-major construction of the test grid

use crate::config::ModelCatalog;
use crate::error::MatrixError;
use crate::hardware::BYTES_PER_GB;
use crate::matrix::{Cell, QuantLevel, SizeClass};

/// Builds the ordered list of pending cells.
///
/// Cells are grouped by quantization level in priority order; within a level,
/// models run smallest first. Ties keep catalog order.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    priority: Vec<QuantLevel>,
}

impl Default for MatrixBuilder {
    fn default() -> Self {
        Self::new(crate::matrix::default_priority())
    }
}

impl MatrixBuilder {
    pub fn new(priority: Vec<QuantLevel>) -> Self {
        Self { priority }
    }

    /// Requested levels in traversal order, duplicates removed
    pub fn order_quants(&self, requested: &[QuantLevel]) -> Vec<QuantLevel> {
        let mut ordered: Vec<QuantLevel> = self
            .priority
            .iter()
            .filter(|q| requested.contains(q))
            .cloned()
            .collect();

        for quant in requested {
            if !ordered.contains(quant) {
                ordered.push(quant.clone());
            }
        }
        ordered
    }

    pub fn build(
        &self,
        catalog: &ModelCatalog,
        requested: &[QuantLevel],
    ) -> Result<Vec<Cell>, MatrixError> {
        let mut models = Vec::with_capacity(catalog.models.len());
        for model in &catalog.models {
            models.push((model.size_class()?, model));
        }
        // Stable: equal sizes keep catalog order
        models.sort_by_key(|(size, _)| *size);

        let mut cells = Vec::new();
        for quant in self.order_quants(requested) {
            for (size, model) in &models {
                let Some(file_name) = model.file_for(&quant) else {
                    continue;
                };
                let estimated = model
                    .declared_file_size(&quant)
                    .unwrap_or_else(|| estimate_file_bytes(*size, &quant));
                cells.push(Cell::new(
                    model.name.clone(),
                    *size,
                    quant.clone(),
                    file_name.clone(),
                    estimated,
                ));
            }
        }

        tracing::debug!(
            "Built matrix: {} cells across {} models",
            cells.len(),
            models.len()
        );
        Ok(cells)
    }
}

/// Weight storage estimate: parameters × bits per weight / 8
pub fn estimate_file_bytes(size: SizeClass, quant: &QuantLevel) -> u64 {
    let gb = size.params_billions() * quant.bits_per_weight() / 8.0;
    (gb * BYTES_PER_GB) as u64
}

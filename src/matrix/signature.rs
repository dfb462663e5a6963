use crate::config::{ModelCatalog, ThresholdsConfig};
use crate::matrix::QuantLevel;
use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct SignatureInput<'a> {
    catalog: &'a ModelCatalog,
    quants: &'a [QuantLevel],
    thresholds: &'a ThresholdsConfig,
}

/// Deterministic fingerprint of everything that shapes the matrix.
///
/// Maps are ordered (`BTreeMap`) so the JSON encoding, and with it the hash,
/// is stable across runs.
pub fn matrix_signature(
    catalog: &ModelCatalog,
    quants: &[QuantLevel],
    thresholds: &ThresholdsConfig,
) -> Result<String> {
    let canonical = serde_json::to_vec(&SignatureInput {
        catalog,
        quants,
        thresholds,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

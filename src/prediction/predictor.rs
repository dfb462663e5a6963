//! Online memory model learned from measured cells

use crate::config::PredictionConfig;
use crate::hardware::BYTES_PER_GB;
use crate::matrix::{QuantLevel, SizeClass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Measured peak memory of one (size class, quantization) pairing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub size_class: SizeClass,
    pub quant: QuantLevel,
    pub peak_memory_gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Observed,
    Interpolated,
    Extrapolated,
    Heuristic,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Observed => "observed",
            Confidence::Interpolated => "interpolated",
            Confidence::Extrapolated => "extrapolated",
            Confidence::Heuristic => "heuristic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Exact sample for this key
    Observed,
    /// `memory ≈ scale × params × bits / 8`, least squares over samples
    ScaledFit { scale: f64, samples: usize },
    /// No samples yet: file size × multiplier
    FileSize { multiplier: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePrediction {
    pub memory_gb: f64,
    pub confidence: Confidence,
    pub method: EstimationMethod,
}

/// Learns resident memory from observed samples.
///
/// The fitted model is multiplicative: weight storage in GB
/// (`params_billions × bits_per_weight / 8`) times a single scale factor
/// that absorbs KV cache and runtime overhead.
#[derive(Debug, Clone, Default)]
pub struct ResourcePredictor {
    samples: BTreeMap<(SizeClass, QuantLevel), MemorySample>,
    config: PredictionConfig,
}

fn weight_gb(size: SizeClass, quant: &QuantLevel) -> f64 {
    size.params_billions() * quant.bits_per_weight() / 8.0
}

impl ResourcePredictor {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            samples: BTreeMap::new(),
            config,
        }
    }

    /// Record a measurement; a later one for the same key replaces the earlier.
    pub fn record(&mut self, size_class: SizeClass, quant: QuantLevel, peak_memory_gb: f64) {
        if !peak_memory_gb.is_finite() || peak_memory_gb <= 0.0 {
            tracing::warn!(
                "Ignoring invalid memory sample {} for {} {}",
                peak_memory_gb,
                size_class,
                quant
            );
            return;
        }
        tracing::debug!(
            "Memory sample {} {}: {:.2} GB",
            size_class,
            quant,
            peak_memory_gb
        );
        self.samples.insert(
            (size_class, quant.clone()),
            MemorySample {
                size_class,
                quant,
                peak_memory_gb,
            },
        );
    }

    pub fn samples(&self) -> impl Iterator<Item = &MemorySample> {
        self.samples.values()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Predict peak memory for a key. `file_bytes` backs the zero-sample heuristic.
    pub fn predict(
        &self,
        size_class: SizeClass,
        quant: &QuantLevel,
        file_bytes: u64,
    ) -> ResourcePrediction {
        if let Some(sample) = self.samples.get(&(size_class, quant.clone())) {
            return ResourcePrediction {
                memory_gb: sample.peak_memory_gb,
                confidence: Confidence::Observed,
                method: EstimationMethod::Observed,
            };
        }

        if self.samples.is_empty() {
            let multiplier = self.config.file_size_multiplier;
            return ResourcePrediction {
                memory_gb: file_bytes as f64 / BYTES_PER_GB * multiplier,
                confidence: Confidence::Heuristic,
                method: EstimationMethod::FileSize { multiplier },
            };
        }

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for sample in self.samples.values() {
            let x = weight_gb(sample.size_class, &sample.quant);
            sxy += x * sample.peak_memory_gb;
            sxx += x * x;
        }
        let scale = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let mut memory_gb = scale * weight_gb(size_class, quant);

        let confidence = if self.spans_both_axes() {
            Confidence::Interpolated
        } else {
            memory_gb *= 1.0 + self.config.extrapolation_bias;
            Confidence::Extrapolated
        };

        ResourcePrediction {
            memory_gb,
            confidence,
            method: EstimationMethod::ScaledFit {
                scale,
                samples: self.samples.len(),
            },
        }
    }

    fn spans_both_axes(&self) -> bool {
        let sizes: BTreeSet<_> = self.samples.keys().map(|(s, _)| *s).collect();
        let quants: BTreeSet<_> = self.samples.keys().map(|(_, q)| q).collect();
        self.samples.len() >= 2 && sizes.len() >= 2 && quants.len() >= 2
    }
}

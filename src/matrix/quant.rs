//! Quantization levels and their memory characteristics

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Approximate bits per weight for known quantization levels
pub static QUANT_BITS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let mut bits = HashMap::new();
    bits.insert("Q2_K", 2.5);
    bits.insert("Q3_K_M", 3.5);
    bits.insert("Q4_K_S", 4.0);
    bits.insert("Q4_K_M", 4.5);
    bits.insert("Q5_K_S", 5.0);
    bits.insert("Q5_K_M", 5.5);
    bits.insert("Q6_K", 6.5);
    bits.insert("Q8_0", 8.5);
    bits.insert("F16", 16.0);
    bits.insert("F32", 32.0);
    bits
});

/// Default traversal priority: the balanced Q4 tier first, then its neighbours
pub const DEFAULT_QUANT_PRIORITY: &[&str] = &["Q4_K_M", "Q5_K_M", "Q6_K", "Q3_K_M", "Q2_K", "Q8_0"];

/// A discrete compression tier, ordered by bits per weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QuantLevel {
    name: String,
}

impl QuantLevel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_uppercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bits per weight, from the table or derived from the label
    pub fn bits_per_weight(&self) -> f64 {
        if let Some(bits) = QUANT_BITS.get(self.name.as_str()) {
            return *bits;
        }
        parse_bits(&self.name).unwrap_or(4.5)
    }
}

/// Derive a width from labels such as `Q4_0`, `IQ3_XS`, `BF16`
fn parse_bits(label: &str) -> Option<f64> {
    if let Some(rest) = label.strip_prefix("BF").or_else(|| label.strip_prefix('F')) {
        return rest.parse::<f64>().ok();
    }
    let idx = label.find('Q')?;
    let digit = label[idx + 1..].chars().next()?.to_digit(10)?;
    Some(digit as f64 + 0.5)
}

impl PartialEq for QuantLevel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for QuantLevel {}

impl Hash for QuantLevel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Ord for QuantLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits_per_weight()
            .total_cmp(&other.bits_per_weight())
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for QuantLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QuantLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<String> for QuantLevel {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for QuantLevel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<QuantLevel> for String {
    fn from(q: QuantLevel) -> Self {
        q.name
    }
}

/// Parse a comma-separated list such as `Q4_K_M,Q5_K_M`
pub fn parse_quant_list(list: &str) -> Vec<QuantLevel> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(QuantLevel::new)
        .collect()
}

pub fn default_priority() -> Vec<QuantLevel> {
    DEFAULT_QUANT_PRIORITY.iter().map(|q| QuantLevel::new(*q)).collect()
}

use crate::matrix::{Cell, CellStatus, QuantLevel, SizeClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pending cells a directive covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectiveScope {
    /// Every quantization of one model
    Model { model_id: String },
    /// One quantization, models strictly larger than `size_above`
    LargerAtQuant {
        quant: QuantLevel,
        size_above: SizeClass,
    },
    /// One model, quantizations strictly wider than `quant_above`
    ModelAboveQuant {
        model_id: String,
        quant_above: QuantLevel,
    },
    /// Exactly one cell
    Cell { model_id: String, quant: QuantLevel },
}

impl DirectiveScope {
    fn covers(&self, cell: &Cell) -> bool {
        match self {
            DirectiveScope::Model { model_id } => cell.model_id == *model_id,
            DirectiveScope::LargerAtQuant { quant, size_above } => {
                cell.quant == *quant && cell.size_class > *size_above
            }
            DirectiveScope::ModelAboveQuant {
                model_id,
                quant_above,
            } => cell.model_id == *model_id && cell.quant > *quant_above,
            DirectiveScope::Cell { model_id, quant } => {
                cell.model_id == *model_id && cell.quant == *quant
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveRule {
    LoadTimeout,
    SizeEscalation,
    QuantizationCeiling,
    MemoryPrediction,
}

impl fmt::Display for DirectiveRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DirectiveRule::LoadTimeout => "load_timeout",
            DirectiveRule::SizeEscalation => "size_escalation",
            DirectiveRule::QuantizationCeiling => "quantization_ceiling",
            DirectiveRule::MemoryPrediction => "memory_prediction",
        };
        f.write_str(s)
    }
}

/// A forward-only skip rule over pending cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationDirective {
    pub scope: DirectiveScope,
    pub skip_status: CellStatus,
    pub reason: String,
    pub rule: DirectiveRule,
}

impl TerminationDirective {
    /// Only pending cells can match; terminal cells are never touched.
    pub fn matches(&self, cell: &Cell) -> bool {
        cell.is_pending() && self.scope.covers(cell)
    }
}

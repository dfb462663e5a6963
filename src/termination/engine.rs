//! Pruning decisions derived from classified cells

use crate::config::{LimitsConfig, MatrixConfig, ThresholdsConfig};
use crate::matrix::{Cell, CellStatus, FailureCause, QuantLevel};
use crate::prediction::ResourcePredictor;
use crate::termination::{
    classify, Classification, DirectiveRule, DirectiveScope, ResultRecord, TerminationDirective,
    WorkloadResult,
};

/// Owns thresholds and the accumulated directives of a run
#[derive(Debug, Clone)]
pub struct TerminationEngine {
    thresholds: ThresholdsConfig,
    floor: Vec<QuantLevel>,
    baseline: QuantLevel,
    directives: Vec<TerminationDirective>,
}

impl TerminationEngine {
    pub fn new(thresholds: ThresholdsConfig, matrix: &MatrixConfig) -> Self {
        Self {
            thresholds,
            floor: matrix.quant_floor.clone(),
            baseline: matrix.floor_baseline.clone(),
            directives: Vec::new(),
        }
    }

    pub fn classify(&self, workloads: &[WorkloadResult]) -> Classification {
        classify(workloads, &self.thresholds)
    }

    /// Directives implied by one cell's outcome.
    ///
    /// `history` holds every result so far, including this cell's; `cells` is
    /// the whole matrix and tells which floor levels a model actually has.
    pub fn derive_directives(
        &self,
        cell: &Cell,
        status: CellStatus,
        history: &[ResultRecord],
        cells: &[Cell],
    ) -> Vec<TerminationDirective> {
        let mut derived = Vec::new();
        if status != CellStatus::Failed {
            return derived;
        }

        if cell.failure_cause == Some(FailureCause::LoadTimeout) {
            derived.push(TerminationDirective {
                scope: DirectiveScope::Model {
                    model_id: cell.model_id.clone(),
                },
                skip_status: CellStatus::SkippedPath,
                reason: format!(
                    "{} failed to load at {}; treated as too large for this hardware",
                    cell.model_id, cell.quant
                ),
                rule: DirectiveRule::LoadTimeout,
            });
        }

        derived.push(TerminationDirective {
            scope: DirectiveScope::LargerAtQuant {
                quant: cell.quant.clone(),
                size_above: cell.size_class,
            },
            skip_status: CellStatus::SkippedPath,
            reason: format!(
                "{} ({}) failed at {}; larger models at {} will not do better",
                cell.model_id, cell.size_class, cell.quant, cell.quant
            ),
            rule: DirectiveRule::SizeEscalation,
        });

        if let Some(ceiling) = self.ceiling_directive(cell, history, cells) {
            derived.push(ceiling);
        }

        derived
    }

    fn ceiling_directive(
        &self,
        cell: &Cell,
        history: &[ResultRecord],
        cells: &[Cell],
    ) -> Option<TerminationDirective> {
        if !self.floor.contains(&cell.quant) {
            return None;
        }

        // Floor levels this model is actually scheduled at
        let floor: Vec<&QuantLevel> = self
            .floor
            .iter()
            .filter(|q| {
                cells
                    .iter()
                    .any(|c| c.model_id == cell.model_id && c.quant == **q)
            })
            .collect();
        if !floor.contains(&&self.baseline) {
            return None;
        }

        let all_failed = floor.iter().all(|q| {
            history.iter().any(|r| {
                r.model_id == cell.model_id && r.quant == **q && r.status == CellStatus::Failed
            })
        });
        if !all_failed {
            return None;
        }

        let quant_above = floor.iter().max().map(|q| (*q).clone())?;
        let levels: Vec<&str> = floor.iter().map(|q| q.name()).collect();
        Some(TerminationDirective {
            scope: DirectiveScope::ModelAboveQuant {
                model_id: cell.model_id.clone(),
                quant_above: quant_above.clone(),
            },
            skip_status: CellStatus::SkippedPath,
            reason: format!(
                "{} failed at every floor level ({}); levels above {} skipped",
                cell.model_id,
                levels.join(", "),
                quant_above
            ),
            rule: DirectiveRule::QuantizationCeiling,
        })
    }

    /// One-shot directives for pending cells that no longer fit in memory.
    /// Called after every new memory sample.
    pub fn predicted_directives(
        &self,
        cells: &[Cell],
        predictor: &ResourcePredictor,
        available_gb: f64,
        limits: &LimitsConfig,
    ) -> Vec<TerminationDirective> {
        cells
            .iter()
            .filter(|c| c.is_pending())
            .filter_map(|c| {
                let prediction =
                    predictor.predict(c.size_class, &c.quant, c.estimated_file_bytes);
                let required = prediction.memory_gb * limits.safety_margin;
                (required > available_gb).then(|| TerminationDirective {
                    scope: DirectiveScope::Cell {
                        model_id: c.model_id.clone(),
                        quant: c.quant.clone(),
                    },
                    skip_status: CellStatus::SkippedPredicted,
                    reason: format!(
                        "predicted {:.1} GB ({}) exceeds {:.1} GB available",
                        required, prediction.confidence, available_gb
                    ),
                    rule: DirectiveRule::MemoryPrediction,
                })
            })
            .collect()
    }

    /// Add a directive unless an identical scope/status is already active
    pub fn push(&mut self, directive: TerminationDirective) -> bool {
        let duplicate = self
            .directives
            .iter()
            .any(|d| d.scope == directive.scope && d.skip_status == directive.skip_status);
        if duplicate {
            return false;
        }
        tracing::info!("Directive [{}]: {}", directive.rule, directive.reason);
        self.directives.push(directive);
        true
    }

    /// First directive (in issue order) matching a pending cell
    pub fn matching(&self, cell: &Cell) -> Option<&TerminationDirective> {
        self.directives.iter().find(|d| d.matches(cell))
    }

    pub fn directives(&self) -> &[TerminationDirective] {
        &self.directives
    }

    pub(crate) fn restore(&mut self, directives: Vec<TerminationDirective>) {
        self.directives = directives;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termination::Rating;

    fn cell(model: &str, size: &str, quant: &str) -> Cell {
        Cell::new(model, size.parse().unwrap(), QuantLevel::new(quant), "f.gguf", 0)
    }

    fn failed(c: &Cell) -> ResultRecord {
        let mut record = ResultRecord::errored(c, "x");
        record.status = CellStatus::Failed;
        record.rating = Rating::Failed;
        record
    }

    fn engine() -> TerminationEngine {
        TerminationEngine::new(ThresholdsConfig::default(), &MatrixConfig::default())
    }

    #[test]
    fn test_load_timeout_skips_whole_model() {
        let mut c = cell("A", "7B", "Q4_K_M");
        c.failure_cause = Some(FailureCause::LoadTimeout);
        let cells = vec![c.clone(), cell("A", "7B", "Q2_K"), cell("A", "7B", "Q8_0")];

        let derived = engine().derive_directives(&c, CellStatus::Failed, &[failed(&c)], &cells);
        let model = derived
            .iter()
            .find(|d| d.rule == DirectiveRule::LoadTimeout)
            .unwrap();
        assert!(model.matches(&cells[1]));
        assert!(model.matches(&cells[2]));
    }

    #[test]
    fn test_performance_failure_escalates_size_only() {
        let mut c = cell("A", "7B", "Q4_K_M");
        c.failure_cause = Some(FailureCause::Performance);
        let cells = vec![c.clone(), cell("B", "13B", "Q4_K_M"), cell("A", "7B", "Q8_0")];

        let derived = engine().derive_directives(&c, CellStatus::Failed, &[failed(&c)], &cells);
        assert!(derived.iter().all(|d| d.rule != DirectiveRule::LoadTimeout));

        let escalation = derived
            .iter()
            .find(|d| d.rule == DirectiveRule::SizeEscalation)
            .unwrap();
        assert!(escalation.matches(&cells[1]));
        assert!(!escalation.matches(&cells[2]));
    }

    #[test]
    fn test_non_failures_derive_nothing() {
        let c = cell("A", "7B", "Q4_K_M");
        for status in [CellStatus::Passed, CellStatus::Partial, CellStatus::Error] {
            assert!(engine()
                .derive_directives(&c, status, &[], std::slice::from_ref(&c))
                .is_empty());
        }
    }

    #[test]
    fn test_quantization_ceiling() {
        let cells: Vec<Cell> = ["Q4_K_M", "Q5_K_M", "Q3_K_M", "Q2_K", "Q8_0"]
            .iter()
            .map(|q| cell("A", "7B", q))
            .collect();
        let e = engine();

        let mut history = vec![failed(&cells[0]), failed(&cells[2])];
        let partial = e.derive_directives(&cells[2], CellStatus::Failed, &history, &cells);
        assert!(partial
            .iter()
            .all(|d| d.rule != DirectiveRule::QuantizationCeiling));

        history.push(failed(&cells[3]));
        let derived = e.derive_directives(&cells[3], CellStatus::Failed, &history, &cells);
        let ceiling = derived
            .iter()
            .find(|d| d.rule == DirectiveRule::QuantizationCeiling)
            .unwrap();
        assert!(ceiling.matches(&cells[4]));
        assert!(ceiling.matches(&cells[1]));
        assert!(!ceiling.matches(&cell("A", "7B", "Q4_K_M")));
    }

    #[test]
    fn test_predicted_directives_are_singletons() {
        let mut predictor = ResourcePredictor::default();
        predictor.record("7B".parse().unwrap(), QuantLevel::new("Q4_K_M"), 6.0);

        let cells = vec![
            cell("A", "7B", "Q4_K_M"),
            cell("B", "70B", "Q4_K_M"),
            cell("C", "3B", "Q4_K_M"),
        ];
        let derived =
            engine().predicted_directives(&cells, &predictor, 16.0, &LimitsConfig::default());
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].skip_status, CellStatus::SkippedPredicted);
        assert!(derived[0].matches(&cells[1]));
        assert!(!derived[0].matches(&cells[2]));
    }

    #[test]
    fn test_push_deduplicates() {
        let mut e = engine();
        let d = TerminationDirective {
            scope: DirectiveScope::Model {
                model_id: "A".into(),
            },
            skip_status: CellStatus::SkippedPath,
            reason: "first".into(),
            rule: DirectiveRule::LoadTimeout,
        };
        assert!(e.push(d.clone()));
        let mut again = d;
        again.reason = "second".into();
        assert!(!e.push(again));
        assert_eq!(e.directives().len(), 1);
        assert_eq!(e.directives()[0].reason, "first");
    }
}

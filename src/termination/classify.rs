//! Threshold classification of measured workloads

use crate::config::{BoundKind, MetricBound, ThresholdsConfig};
use crate::matrix::{CellStatus, FailureCause};
use crate::termination::{Rating, WorkloadResult, WorkloadStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: CellStatus,
    pub rating: Rating,
    pub failure_cause: Option<FailureCause>,
    /// Violated thresholds, critical first
    pub reason: Option<String>,
}

fn tier(bound: &MetricBound, value: f64) -> Rating {
    let ratio = if bound.threshold == 0.0 {
        1.0
    } else {
        value / bound.threshold
    };
    match bound.kind {
        BoundKind::AtLeast if ratio >= 1.5 => Rating::Excellent,
        BoundKind::AtLeast if ratio >= 1.2 => Rating::Good,
        BoundKind::AtMost if ratio <= 0.67 => Rating::Excellent,
        BoundKind::AtMost if ratio <= 0.8 => Rating::Good,
        _ => Rating::Acceptable,
    }
}

/// Compare every sub-result against its workload's thresholds.
///
/// A missing metric counts as unmet. A workload that did not complete is a
/// critical violation when its thresholds name critical metrics, otherwise a
/// soft one.
pub fn classify(workloads: &[WorkloadResult], thresholds: &ThresholdsConfig) -> Classification {
    let mut critical = Vec::new();
    let mut soft = Vec::new();
    let mut rating = Rating::Excellent;

    for result in workloads {
        let bounds = thresholds
            .for_workload(&result.workload_id)
            .map(|t| t.bounds())
            .unwrap_or_default();

        if result.status != WorkloadStatus::Completed {
            let detail = format!(
                "{} {}{}",
                result.workload_id,
                if result.status == WorkloadStatus::Aborted {
                    "aborted"
                } else {
                    "errored"
                },
                result
                    .error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            );
            if bounds.iter().any(|b| b.critical) {
                critical.push(detail);
            } else {
                soft.push(detail);
            }
            continue;
        }

        for bound in &bounds {
            match result.metrics.get(&bound.metric) {
                Some(value) if bound.is_met(*value) => {
                    rating = rating.max(tier(bound, *value));
                }
                value => {
                    let detail = match value {
                        Some(v) => format!(
                            "{}.{} = {:.2} (threshold {})",
                            result.workload_id, bound.metric, v, bound.threshold
                        ),
                        None => format!("{}.{} missing", result.workload_id, bound.metric),
                    };
                    if bound.critical {
                        critical.push(detail);
                    } else {
                        soft.push(detail);
                    }
                }
            }
        }
    }

    if !critical.is_empty() {
        critical.extend(soft);
        return Classification {
            status: CellStatus::Failed,
            rating: Rating::Failed,
            failure_cause: Some(FailureCause::Performance),
            reason: Some(critical.join("; ")),
        };
    }

    if !soft.is_empty() {
        return Classification {
            status: CellStatus::Partial,
            rating: Rating::Poor,
            failure_cause: None,
            reason: Some(soft.join("; ")),
        };
    }

    Classification {
        status: CellStatus::Passed,
        rating: if workloads.is_empty() {
            Rating::Acceptable
        } else {
            rating
        },
        failure_cause: None,
        reason: None,
    }
}

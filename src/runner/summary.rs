use crate::hardware::MemoryInfo;
use crate::matrix::CellStatus;
use crate::termination::{Rating, ResultRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Banner rule used around console reports
pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Short description of a top-rated configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestConfig {
    pub model_id: String,
    pub quant: String,
    pub rating: Rating,
    pub peak_memory_bytes: Option<u64>,
}

/// Aggregate counts over a run's result records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub partial: usize,
    pub failed: usize,
    pub error: usize,
    pub skipped_preflight: usize,
    pub skipped_predicted: usize,
    pub skipped_path: usize,
    pub by_rating: BTreeMap<String, usize>,
    pub best: Vec<BestConfig>,
}

impl RunSummary {
    pub fn from_results(results: &[ResultRecord]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };

        for r in results {
            match r.status {
                CellStatus::Passed => summary.passed += 1,
                CellStatus::Partial => summary.partial += 1,
                CellStatus::Failed => summary.failed += 1,
                CellStatus::Error => summary.error += 1,
                CellStatus::SkippedPreflight => summary.skipped_preflight += 1,
                CellStatus::SkippedPredicted => summary.skipped_predicted += 1,
                CellStatus::SkippedPath => summary.skipped_path += 1,
                CellStatus::Pending | CellStatus::Running => {}
            }
            *summary.by_rating.entry(r.rating.to_string()).or_insert(0) += 1;
        }

        summary.best = [Rating::Excellent, Rating::Good]
            .iter()
            .flat_map(|rating| results.iter().filter(move |r| r.rating == *rating))
            .take(5)
            .map(|r| BestConfig {
                model_id: r.model_id.clone(),
                quant: r.quant.to_string(),
                rating: r.rating,
                peak_memory_bytes: r.peak_memory_bytes,
            })
            .collect();

        summary
    }

    pub fn skipped(&self) -> usize {
        self.skipped_preflight + self.skipped_predicted + self.skipped_path
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", RULE);
        println!("Results Summary");
        println!("{}", RULE);
        println!("  Cells:    {}", self.total);
        println!("  Passed:   {}", self.passed);
        println!("  Partial:  {}", self.partial);
        println!("  Failed:   {}", self.failed);
        println!("  Error:    {}", self.error);
        println!(
            "  Skipped:  {} (preflight {}, predicted {}, path {})",
            self.skipped(),
            self.skipped_preflight,
            self.skipped_predicted,
            self.skipped_path
        );
        println!();

        if self.best.is_empty() {
            println!("No excellent or good configurations found.");
            return;
        }

        println!("Top configurations:");
        for (i, best) in self.best.iter().enumerate() {
            let memory = best
                .peak_memory_bytes
                .map(MemoryInfo::format_bytes)
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {}. {} {} ({}, peak {})",
                i + 1,
                best.model_id,
                best.quant,
                best.rating,
                memory
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Cell, QuantLevel};

    fn record(model: &str, status: CellStatus, rating: Rating) -> ResultRecord {
        let cell = Cell::new(model, "7B".parse().unwrap(), QuantLevel::new("Q4_K_M"), "f", 0);
        let mut r = ResultRecord::errored(&cell, "x");
        r.status = status;
        r.rating = rating;
        r
    }

    #[test]
    fn test_counts_and_best() {
        let results = vec![
            record("good", CellStatus::Passed, Rating::Good),
            record("ex", CellStatus::Passed, Rating::Excellent),
            record("poor", CellStatus::Partial, Rating::Poor),
            record("skip", CellStatus::SkippedPath, Rating::Skipped),
            record("err", CellStatus::Error, Rating::Error),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.by_rating["skipped"], 1);
        assert_eq!(summary.best.len(), 2);
        assert_eq!(summary.best[0].model_id, "ex");
    }

    #[test]
    fn test_rule_is_one_banner_line() {
        assert_eq!(RULE.chars().count(), 60);
        assert!(RULE.chars().all(|c| c == '━'));
    }
}

//! Cross-backend comparison of benchmark cells
//!
//! Per-cell min/avg/max lives on [`LatencyStats`]; this module ranks the
//! backends measured for each operation and derives the summary lines of the
//! report.


use crate::{
    error::{AppError, Result},
    models::{CellResult, LatencyStats, RunReport},
    types::Operation,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compute latency statistics over raw millisecond durations
pub fn compute_latency_stats(durations_ms: &[f64]) -> Result<LatencyStats> {
    LatencyStats::from_durations(durations_ms)
}

/// Percentage of iterations that produced a sample
pub fn success_rate(cell: &CellResult) -> f64 {
    if cell.iterations == 0 {
        return 0.0;
    }
    cell.samples.len() as f64 / cell.iterations as f64 * 100.0
}

/// Collects completed cells and ranks backends per operation
#[derive(Debug, Default)]
pub struct StatisticsEngine {
    cells: Vec<CellResult>,
}

/// One backend's standing for one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRanking {
    /// 1 is fastest
    pub rank: usize,
    pub backend: String,
    pub avg_ms: f64,
    /// Average latency divided by the fastest backend's average
    pub relative_to_fastest: f64,
    pub success_rate: f64,
}

/// All backends measured for one operation, fastest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationComparison {
    pub operation: Operation,
    pub rankings: Vec<BackendRanking>,
}

impl OperationComparison {
    pub fn fastest(&self) -> Option<&BackendRanking> {
        self.rankings.first()
    }

    pub fn slowest(&self) -> Option<&BackendRanking> {
        self.rankings.last()
    }
}

/// Comparison of every operation in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAnalysis {
    pub comparisons: Vec<OperationComparison>,
    pub total_samples: usize,
    pub total_failures: usize,
    pub generated_at: DateTime<Utc>,
}

impl RunAnalysis {
    pub fn comparison(&self, operation: Operation) -> Option<&OperationComparison> {
        self.comparisons.iter().find(|c| c.operation == operation)
    }
}

impl StatisticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine over every completed cell of a report
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            cells: report.completed().cloned().collect(),
        }
    }

    pub fn add_cell(&mut self, cell: CellResult) {
        self.cells.push(cell);
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn analyze(&self) -> Result<RunAnalysis> {
        if self.cells.is_empty() {
            return Err(AppError::statistics("No completed cells to analyze"));
        }

        let mut comparisons = Vec::new();
        for operation in [Operation::Set, Operation::Get] {
            let mut measured: Vec<(&CellResult, &LatencyStats)> = self
                .cells
                .iter()
                .filter(|c| c.operation == operation)
                .filter_map(|c| c.stats.as_ref().map(|s| (c, s)))
                .collect();
            if measured.is_empty() {
                continue;
            }

            measured.sort_by(|a, b| a.1.avg_ms.total_cmp(&b.1.avg_ms));
            let fastest_avg = measured[0].1.avg_ms;

            let rankings = measured
                .iter()
                .enumerate()
                .map(|(i, (cell, stats))| BackendRanking {
                    rank: i + 1,
                    backend: cell.backend.clone(),
                    avg_ms: stats.avg_ms,
                    relative_to_fastest: if fastest_avg > 0.0 { stats.avg_ms / fastest_avg } else { 1.0 },
                    success_rate: success_rate(cell),
                })
                .collect();

            comparisons.push(OperationComparison { operation, rankings });
        }

        Ok(RunAnalysis {
            comparisons,
            total_samples: self.cells.iter().map(|c| c.samples.len()).sum(),
            total_failures: self.cells.iter().map(|c| c.failures.len()).sum(),
            generated_at: Utc::now(),
        })
    }

    pub fn export_json(&self, analysis: &RunAnalysis) -> Result<String> {
        serde_json::to_string_pretty(analysis)
            .map_err(|e| AppError::statistics(format!("Failed to serialize analysis: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatencySample;
    use crate::types::ExecutionMode;
    use std::time::Duration;

    pub(super) fn cell(backend: &str, operation: Operation, durations: &[f64]) -> CellResult {
        let mut cell = CellResult::new(backend, operation, ExecutionMode::Sequential, durations.len());
        for (index, &duration_ms) in durations.iter().enumerate() {
            cell.samples.push(LatencySample { index, duration_ms });
        }
        cell.finish(Duration::from_millis(1)).unwrap();
        cell
    }

    #[test]
    fn test_empty_engine_cannot_analyze() {
        assert!(matches!(StatisticsEngine::new().analyze(), Err(AppError::Statistics(_))));
    }

    #[test]
    fn test_rankings_order_by_average() {
        let mut engine = StatisticsEngine::new();
        engine.add_cell(cell("Redis", Operation::Set, &[2.0, 2.0]));
        engine.add_cell(cell("LineTcp", Operation::Set, &[0.5, 0.5]));
        engine.add_cell(cell("HttpCache", Operation::Set, &[1.0, 1.0]));
        engine.add_cell(cell("LineTcp", Operation::Get, &[0.4]));

        let analysis = engine.analyze().unwrap();
        let set = analysis.comparison(Operation::Set).unwrap();
        let order: Vec<&str> = set.rankings.iter().map(|r| r.backend.as_str()).collect();
        assert_eq!(order, vec!["LineTcp", "HttpCache", "Redis"]);
        assert_eq!(set.fastest().unwrap().relative_to_fastest, 1.0);
        assert_eq!(set.slowest().unwrap().relative_to_fastest, 4.0);

        assert_eq!(analysis.comparison(Operation::Get).unwrap().rankings.len(), 1);
        assert_eq!(analysis.total_samples, 7);
    }

    #[test]
    fn test_success_rate_counts_excluded_iterations() {
        let mut partial = cell("LineTcp", Operation::Get, &[1.0, 1.0, 1.0]);
        partial.iterations = 4;
        assert_eq!(success_rate(&partial), 75.0);
    }

    #[test]
    fn test_export_json() {
        let mut engine = StatisticsEngine::new();
        engine.add_cell(cell("LineTcp", Operation::Set, &[1.0]));
        let analysis = engine.analyze().unwrap();
        let json = engine.export_json(&analysis).unwrap();
        assert!(json.contains("\"backend\": \"LineTcp\""));
    }
}

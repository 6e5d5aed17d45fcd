//! Latency samples, per-cell results and run reports

use crate::{
    error::{AppError, Result},
    types::{ExecutionMode, LatencyBand, Operation},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One timed round trip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Iteration index within the cell
    pub index: usize,
    /// Round-trip duration in fractional milliseconds
    pub duration_ms: f64,
}

impl LatencySample {
    pub fn new(index: usize, elapsed: Duration) -> Self {
        Self {
            index,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Min/max/average over a complete sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub sample_count: usize,
}

impl LatencyStats {
    /// Compute from raw durations; an empty set has no statistics
    pub fn from_durations(durations_ms: &[f64]) -> Result<Self> {
        if durations_ms.is_empty() {
            return Err(AppError::statistics("No samples to compute latency statistics from"));
        }
        if let Some(bad) = durations_ms.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(AppError::statistics(format!("Invalid sample duration: {}", bad)));
        }

        let (min, max, sum) = durations_ms.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &d| (min.min(d), max.max(d), sum + d),
        );
        // Rounding in the sum can push the mean a hair outside [min, max]
        let avg = (sum / durations_ms.len() as f64).clamp(min, max);

        Ok(Self {
            min_ms: min,
            max_ms: max,
            avg_ms: avg,
            sample_count: durations_ms.len(),
        })
    }

    pub fn from_samples(samples: &[LatencySample]) -> Result<Self> {
        let durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        Self::from_durations(&durations)
    }

    pub fn band(&self) -> LatencyBand {
        LatencyBand::from_ms(self.avg_ms)
    }
}

/// An iteration that did not produce a sample on its first attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: usize,
    /// `AppError::category()` of the failure
    pub category: String,
    pub message: String,
    /// True when a retry succeeded and the iteration still produced a sample
    pub retried: bool,
}

impl FailureRecord {
    pub fn new(index: usize, error: &AppError, retried: bool) -> Self {
        Self {
            index,
            category: error.category().to_string(),
            message: error.to_string(),
            retried,
        }
    }
}

/// Outcome of one (backend, operation, mode) cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellResult {
    pub backend: String,
    pub operation: Operation,
    pub mode: ExecutionMode,
    pub iterations: usize,
    pub samples: Vec<LatencySample>,
    pub failures: Vec<FailureRecord>,
    pub stats: Option<LatencyStats>,
    /// Wall-clock time of the whole cell
    pub wall_time_ms: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CellResult {
    pub fn new(backend: &str, operation: Operation, mode: ExecutionMode, iterations: usize) -> Self {
        Self {
            backend: backend.to_string(),
            operation,
            mode,
            iterations,
            samples: Vec::with_capacity(iterations),
            failures: Vec::new(),
            stats: None,
            wall_time_ms: 0.0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Failures that cost the iteration its sample
    pub fn excluded_count(&self) -> usize {
        self.failures.iter().filter(|f| !f.retried).count()
    }

    pub fn retried_count(&self) -> usize {
        self.failures.iter().filter(|f| f.retried).count()
    }

    /// Compute statistics and stamp completion
    pub fn finish(&mut self, wall_time: Duration) -> Result<()> {
        self.samples.sort_by_key(|s| s.index);
        self.wall_time_ms = wall_time.as_secs_f64() * 1000.0;
        self.completed_at = Some(Utc::now());
        if self.samples.is_empty() {
            return Err(AppError::benchmark(format!(
                "{} {}: all {} iterations failed",
                self.backend, self.operation, self.iterations
            )));
        }
        self.stats = Some(LatencyStats::from_samples(&self.samples)?);
        Ok(())
    }

    /// Key used in the JSON report, e.g. `RedisSet`
    pub fn report_key(&self) -> String {
        format!("{}{}", self.backend, self.operation)
    }
}

/// A cell as it ended up in the run, successful or not
#[derive(Debug, Clone)]
pub struct CellOutcome {
    pub backend: String,
    pub operation: Operation,
    pub mode: ExecutionMode,
    pub result: Result<CellResult>,
}

impl CellOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every cell of one benchmark run, in execution order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub cells: Vec<CellOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration_ms: f64,
}

impl RunReport {
    pub fn new(cells: Vec<CellOutcome>, started_at: DateTime<Utc>, total: Duration) -> Self {
        Self {
            cells,
            started_at,
            completed_at: Utc::now(),
            total_duration_ms: total.as_secs_f64() * 1000.0,
        }
    }

    pub fn completed(&self) -> impl Iterator<Item = &CellResult> {
        self.cells.iter().filter_map(|c| c.result.as_ref().ok())
    }

    pub fn failed_cells(&self) -> Vec<&CellOutcome> {
        self.cells.iter().filter(|c| !c.is_success()).collect()
    }

    pub fn first_error(&self) -> Option<&AppError> {
        self.cells.iter().find_map(|c| c.result.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.cells.iter().all(CellOutcome::is_success)
    }

    /// Merge another report's cells after this one's
    pub fn extend(&mut self, other: RunReport) {
        self.cells.extend(other.cells);
        self.completed_at = other.completed_at;
        self.total_duration_ms += other.total_duration_ms;
    }
}

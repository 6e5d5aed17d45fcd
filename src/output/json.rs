//! Machine-readable report
//!
//! One entry per cell keyed by backend and operation, e.g.
//! `{"LineTcpSet": {"min": 0.21, "max": 1.8, "average": 0.35, ...}}`.
//! Cells that failed carry an `error` object instead of statistics.

use crate::{
    error::{AppError, Result},
    models::{CellOutcome, RunReport},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics of a completed cell, in milliseconds
#[derive(Debug, Serialize)]
struct CellSummary {
    min: f64,
    max: f64,
    average: f64,
    samples: usize,
    failures: usize,
    retried: usize,
    mode: String,
}

#[derive(Debug, Serialize)]
struct CellError {
    category: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CellEntry {
    Completed(CellSummary),
    Failed { error: CellError },
}

impl From<&CellOutcome> for CellEntry {
    fn from(outcome: &CellOutcome) -> Self {
        match outcome.result {
            Ok(ref cell) => match cell.stats {
                Some(stats) => CellEntry::Completed(CellSummary {
                    min: stats.min_ms,
                    max: stats.max_ms,
                    average: stats.avg_ms,
                    samples: stats.sample_count,
                    failures: cell.excluded_count(),
                    retried: cell.retried_count(),
                    mode: cell.mode.to_string(),
                }),
                None => CellEntry::Failed {
                    error: CellError {
                        category: "STATS",
                        message: "cell has no statistics".to_string(),
                    },
                },
            },
            Err(ref e) => CellEntry::Failed {
                error: CellError {
                    category: e.category(),
                    message: e.to_string(),
                },
            },
        }
    }
}

/// Serializes a [`RunReport`] as a JSON object
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        let entries: BTreeMap<String, CellEntry> = report
            .cells
            .iter()
            .map(|outcome| (format!("{}{}", outcome.backend, outcome.operation), CellEntry::from(outcome)))
            .collect();

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&entries)
        } else {
            serde_json::to_string(&entries)
        };
        rendered.map_err(|e| AppError::io(format!("Failed to serialize report: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::test_reports::mixed_report;
    use serde_json::Value;

    #[test]
    fn test_report_keys_and_fields() {
        let json = JsonFormatter::default().format_report(&mixed_report()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let tcp = &value["LineTcpSet"];
        assert_eq!(tcp["min"], 0.2);
        assert_eq!(tcp["max"], 0.4);
        assert!((tcp["average"].as_f64().unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(tcp["samples"], 3);
        assert_eq!(tcp["failures"], 0);

        assert_eq!(value["RedisSet"]["failures"], 1);
        assert_eq!(value["HttpCacheSet"]["error"]["category"], "CONNECT");
        assert!(value["HttpCacheSet"].get("min").is_none());
    }

    #[test]
    fn test_compact_output_is_single_line() {
        let json = JsonFormatter::new(false).format_report(&mixed_report()).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.starts_with("{\"HttpCacheSet\""));
    }
}

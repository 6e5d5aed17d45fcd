//! Named benchmark operations
//!
//! The suite is the invocation surface of the tool: single-shot `set`/`get`,
//! sequential `*-highload` runs and concurrent `*-highload-parallel` runs, each
//! executed against every configured backend.

use crate::{
    backend::CacheBackend,
    error::{AppError, Result},
    executor::{BenchmarkHarness, ExecutionConfig, Payload},
    logging::BenchmarkLogger,
    models::{Config, RunReport},
    types::{ExecutionMode, Operation},
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// A named benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuiteOperation {
    /// One timed SET per backend
    Set,
    /// One timed GET per backend
    Get,
    SetHighload,
    GetHighload,
    SetHighloadParallel,
    GetHighloadParallel,
    /// SET then GET with the configured iterations and mode
    All,
}

impl SuiteOperation {
    pub const ALL: [SuiteOperation; 7] = [
        SuiteOperation::Set,
        SuiteOperation::Get,
        SuiteOperation::SetHighload,
        SuiteOperation::GetHighload,
        SuiteOperation::SetHighloadParallel,
        SuiteOperation::GetHighloadParallel,
        SuiteOperation::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteOperation::Set => "set",
            SuiteOperation::Get => "get",
            SuiteOperation::SetHighload => "set-highload",
            SuiteOperation::GetHighload => "get-highload",
            SuiteOperation::SetHighloadParallel => "set-highload-parallel",
            SuiteOperation::GetHighloadParallel => "get-highload-parallel",
            SuiteOperation::All => "all",
        }
    }

    /// Cache operations measured, in order
    pub fn operations(&self) -> Vec<Operation> {
        match self {
            SuiteOperation::Set | SuiteOperation::SetHighload | SuiteOperation::SetHighloadParallel => {
                vec![Operation::Set]
            }
            SuiteOperation::Get | SuiteOperation::GetHighload | SuiteOperation::GetHighloadParallel => {
                vec![Operation::Get]
            }
            SuiteOperation::All => vec![Operation::Set, Operation::Get],
        }
    }

    /// Iterations per cell given the configured count
    pub fn iterations(&self, configured: usize) -> usize {
        match self {
            SuiteOperation::Set | SuiteOperation::Get => 1,
            _ => configured,
        }
    }

    /// Execution mode given the configured one
    ///
    /// Highload runs are sequential; parallel runs keep a configured bounded
    /// limit and otherwise fan out without one.
    pub fn mode(&self, configured: ExecutionMode) -> ExecutionMode {
        match self {
            SuiteOperation::Set
            | SuiteOperation::Get
            | SuiteOperation::SetHighload
            | SuiteOperation::GetHighload => ExecutionMode::Sequential,
            SuiteOperation::SetHighloadParallel | SuiteOperation::GetHighloadParallel => match configured {
                ExecutionMode::Bounded { .. } => configured,
                _ => ExecutionMode::Concurrent,
            },
            SuiteOperation::All => configured,
        }
    }
}

impl fmt::Display for SuiteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        SuiteOperation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| {
                AppError::parse(format!(
                    "Unknown operation '{}'. Valid operations: {}",
                    s,
                    SuiteOperation::ALL.map(|op| op.as_str()).join(", ")
                ))
            })
    }
}

/// One day of the sample forecast payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub humidity: u8,
    pub summary: String,
}

const SUMMARIES: [&str; 10] = [
    "Freezing", "Bracing", "Chilly", "Cool", "Mild", "Warm", "Balmy", "Hot", "Sweltering", "Scorching",
];

/// Five days of forecasts starting tomorrow
///
/// Deterministic for a given start date so payload size is stable between runs.
pub fn sample_forecasts(start: NaiveDate) -> Vec<WeatherForecast> {
    (1..=5u64)
        .map(|day| {
            let date = start.checked_add_days(Days::new(day)).unwrap_or(start);
            let seed = date.to_string().bytes().fold(day as i32, |acc, b| (acc * 31 + b as i32) % 7919);
            let temperature_c = seed % 75 - 20;
            WeatherForecast {
                date,
                temperature_c,
                temperature_f: 32 + temperature_c * 9 / 5,
                humidity: (seed % 100) as u8,
                summary: SUMMARIES[seed as usize % SUMMARIES.len()].to_string(),
            }
        })
        .collect()
}

/// Compact JSON of today's sample forecasts
pub fn sample_payload() -> Result<String> {
    Ok(serde_json::to_string(&sample_forecasts(Utc::now().date_naive()))?)
}

/// Runs named operations against a fixed set of backends
pub struct BenchmarkSuite {
    config: Config,
    backends: Vec<Arc<dyn CacheBackend>>,
    logger: Option<Arc<BenchmarkLogger>>,
}

impl BenchmarkSuite {
    pub fn new(config: Config, backends: Vec<Arc<dyn CacheBackend>>) -> Self {
        Self {
            config,
            backends,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<BenchmarkLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn backends(&self) -> &[Arc<dyn CacheBackend>] {
        &self.backends
    }

    /// Key, value and TTL sent by every iteration
    pub fn payload(&self) -> Result<Payload> {
        let value = match self.config.value {
            Some(ref value) => value.clone(),
            None => sample_payload()?,
        };
        Ok(Payload::new(self.config.key.clone(), value).with_ttl(self.config.ttl()))
    }

    /// Harness settings for `operation`
    pub fn execution_config(&self, operation: SuiteOperation) -> ExecutionConfig {
        let base = ExecutionConfig::from(&self.config);
        let iterations = operation.iterations(base.iterations);
        let mode = operation.mode(base.mode);
        base.with_iterations(iterations).with_mode(mode)
    }

    pub async fn run(&self, operation: SuiteOperation) -> Result<RunReport> {
        if self.backends.is_empty() {
            return Err(AppError::config("No backends to benchmark"));
        }

        let payload = self.payload()?;
        let operations = operation.operations();

        if operations.first() == Some(&Operation::Get) {
            self.prime(&payload).await;
        }

        let mut harness = BenchmarkHarness::new(self.execution_config(operation));
        if let Some(ref logger) = self.logger {
            harness = harness.with_logger(logger.clone());
        }

        Ok(harness.run(&self.backends, &operations, &payload).await)
    }

    /// Untimed SET per backend so that GET runs measure hits
    ///
    /// Each SET is bounded by the call timeout; a failed or stalled backend is
    /// logged and left to fail in the measured run.
    async fn prime(&self, payload: &Payload) {
        let limit = self.config.call_timeout();
        for backend in &self.backends {
            let set = backend.set(&payload.key, &payload.value, payload.ttl);
            let result = match tokio::time::timeout(limit, set).await {
                Ok(result) => result.map(|_| ()),
                Err(_) => Err(AppError::timeout(format!(
                    "Priming {} timed out after {}ms",
                    backend.name(),
                    limit.as_millis()
                ))),
            };
            if let Err(e) = result {
                if let Some(ref logger) = self.logger {
                    logger
                        .logger()
                        .warn(&format!("Priming {} failed", backend.name()))
                        .error_info(&e)
                        .log()
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Ack;
    use crate::types::BackendKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MapBackend {
        store: Mutex<HashMap<String, String>>,
        gets: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl CacheBackend for MapBackend {
        fn name(&self) -> &str {
            "Map"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Tcp
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            let value = self.store.lock().unwrap().get(key).cloned();
            self.gets.lock().unwrap().push(value.clone());
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<Ack> {
            self.store.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(Ack)
        }
    }

    fn config(iterations: usize) -> Config {
        Config {
            iterations,
            value: Some("sunny-25".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in SuiteOperation::ALL {
            assert_eq!(op.as_str().parse::<SuiteOperation>().unwrap(), op);
        }
        assert_eq!("GET_HIGHLOAD".parse::<SuiteOperation>().unwrap(), SuiteOperation::GetHighload);
        assert!("delete".parse::<SuiteOperation>().is_err());
    }

    #[test]
    fn test_operation_shapes() {
        assert_eq!(SuiteOperation::Set.iterations(10_000), 1);
        assert_eq!(SuiteOperation::SetHighload.iterations(10_000), 10_000);
        assert_eq!(SuiteOperation::All.operations(), vec![Operation::Set, Operation::Get]);

        assert_eq!(
            SuiteOperation::GetHighload.mode(ExecutionMode::Concurrent),
            ExecutionMode::Sequential
        );
        assert_eq!(
            SuiteOperation::SetHighloadParallel.mode(ExecutionMode::Sequential),
            ExecutionMode::Concurrent
        );
        assert_eq!(
            SuiteOperation::SetHighloadParallel.mode(ExecutionMode::Bounded { limit: 4 }),
            ExecutionMode::Bounded { limit: 4 }
        );
    }

    #[test]
    fn test_sample_payload_is_compact_json() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let forecasts = sample_forecasts(start);
        assert_eq!(forecasts.len(), 5);
        assert_eq!(forecasts[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(forecasts.iter().all(|f| (-20..55).contains(&f.temperature_c)));
        assert_eq!(forecasts, sample_forecasts(start));

        let payload = sample_payload().unwrap();
        assert!(!payload.contains('\n'));
        let parsed: Vec<WeatherForecast> = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_default_payload_uses_sample_forecasts() {
        let suite = BenchmarkSuite::new(Config::default(), vec![]);
        let payload = suite.payload().unwrap();
        assert_eq!(payload.key, "weathers");
        assert!(payload.value.starts_with('['));
    }

    #[tokio::test]
    async fn test_highload_round_trip() {
        let backend = Arc::new(MapBackend::default());
        let suite = BenchmarkSuite::new(config(3), vec![backend.clone()]);

        let report = suite.run(SuiteOperation::All).await.unwrap();
        assert!(report.is_success());
        let cells: Vec<_> = report.completed().collect();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.samples.len() == 3));

        let gets = backend.gets.lock().unwrap();
        assert_eq!(gets.len(), 3);
        assert!(gets.iter().all(|v| v.as_deref() == Some("sunny-25")));
    }

    #[tokio::test]
    async fn test_get_run_is_primed() {
        let backend = Arc::new(MapBackend::default());
        let suite = BenchmarkSuite::new(config(2), vec![backend.clone()]);

        let report = suite.run(SuiteOperation::Get).await.unwrap();
        let cell = report.completed().next().unwrap();
        assert_eq!(cell.samples.len(), 1);
        assert_eq!(backend.gets.lock().unwrap()[0].as_deref(), Some("sunny-25"));
    }

    /// Accepts the connection but never answers a SET
    struct StalledSetBackend;

    #[async_trait]
    impl CacheBackend for StalledSetBackend {
        fn name(&self) -> &str {
            "Stalled"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Tcp
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<Ack> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Ack)
        }
    }

    #[tokio::test]
    async fn test_stalled_priming_set_does_not_block_the_run() {
        let config = Config {
            call_timeout_ms: 50,
            ..config(1)
        };
        let stalled: Arc<dyn CacheBackend> = Arc::new(StalledSetBackend);
        let healthy = Arc::new(MapBackend::default());
        let suite = BenchmarkSuite::new(config, vec![stalled, healthy.clone()]);

        let report = tokio::time::timeout(Duration::from_secs(2), suite.run(SuiteOperation::Get))
            .await
            .unwrap()
            .unwrap();
        assert!(report.completed().count() >= 1);
        // Priming moved on to the next backend
        assert_eq!(healthy.gets.lock().unwrap()[0].as_deref(), Some("sunny-25"));
    }

    #[tokio::test]
    async fn test_no_backends_is_a_config_error() {
        let suite = BenchmarkSuite::new(config(1), vec![]);
        assert!(matches!(suite.run(SuiteOperation::Set).await, Err(AppError::Config(_))));
    }
}

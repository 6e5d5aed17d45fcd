//! Benchmark execution engine
//!
//! This module contains:
//! - The harness that runs N timed iterations of one operation against a backend
//! - Sequential, unbounded-concurrent and semaphore-bounded execution
//! - Failure policies and the fan-in barrier deadline
//! - System resource detection for the default concurrency cap

pub mod concurrent;

use crate::{
    backend::CacheBackend,
    error::{AppError, Result},
    logging::BenchmarkLogger,
    models::{CellOutcome, CellResult, Config, FailureRecord, LatencySample, RunReport},
    types::{ExecutionMode, FailurePolicy, Operation},
};
use chrono::Utc;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::timeout;

/// Execution settings for one harness
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Iterations per cell
    pub iterations: usize,
    pub mode: ExecutionMode,
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single call
    pub call_timeout: Duration,
    /// Upper bound on the fan-in of a concurrent cell
    pub barrier_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            iterations: crate::defaults::DEFAULT_ITERATIONS,
            mode: ExecutionMode::Sequential,
            failure_policy: FailurePolicy::default(),
            call_timeout: crate::defaults::DEFAULT_CALL_TIMEOUT,
            barrier_timeout: crate::defaults::DEFAULT_BARRIER_TIMEOUT,
        }
    }
}

impl ExecutionConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_barrier_timeout(mut self, barrier_timeout: Duration) -> Self {
        self.barrier_timeout = barrier_timeout;
        self
    }
}

impl From<&Config> for ExecutionConfig {
    fn from(config: &Config) -> Self {
        Self {
            iterations: config.iterations,
            mode: config.execution_mode(),
            failure_policy: config.failure_policy,
            call_timeout: config.call_timeout(),
            barrier_timeout: config.barrier_timeout(),
        }
    }
}

/// System resource information used for the default concurrency cap
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of logical CPU cores
    pub cpu_cores: usize,
    /// Twice the core count, clamped to [4, 50]
    pub recommended_concurrency: usize,
}

impl SystemResources {
    pub fn detect() -> Self {
        let cpu_cores = num_cpus::get();
        let recommended_concurrency = (cpu_cores * 2).clamp(4, 50);
        Self {
            cpu_cores,
            recommended_concurrency,
        }
    }
}

/// What every iteration of a cell sends
#[derive(Debug, Clone)]
pub struct Payload {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

impl Payload {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl: crate::defaults::DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Result of one iteration after the failure policy has been applied
#[derive(Debug)]
pub(crate) enum IterationOutcome {
    /// First attempt succeeded
    Sample(LatencySample),
    /// First attempt failed, the retry succeeded
    Recovered(LatencySample, FailureRecord, AppError),
    /// No sample for this iteration
    Failed(FailureRecord, AppError),
}

/// Issue one call and time it; the clock covers exactly the round trip
async fn timed_call(
    backend: &dyn CacheBackend,
    operation: Operation,
    payload: &Payload,
    call_timeout: Duration,
) -> Result<Duration> {
    let started = Instant::now();
    let call = async {
        match operation {
            Operation::Get => backend.get(&payload.key).await.map(|_| ()),
            Operation::Set => backend.set(&payload.key, &payload.value, payload.ttl).await.map(|_| ()),
        }
    };
    match timeout(call_timeout, call).await {
        Ok(Ok(())) => Ok(started.elapsed()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(AppError::timeout(format!(
            "{} {} exceeded {:?}",
            backend.name(),
            operation,
            call_timeout
        ))),
    }
}

/// Run iteration `index`, retrying once if the policy asks for it
pub(crate) async fn run_iteration(
    backend: &dyn CacheBackend,
    operation: Operation,
    payload: &Payload,
    index: usize,
    config: &ExecutionConfig,
) -> IterationOutcome {
    let first_error = match timed_call(backend, operation, payload, config.call_timeout).await {
        Ok(elapsed) => return IterationOutcome::Sample(LatencySample::new(index, elapsed)),
        Err(e) => e,
    };

    if config.failure_policy != FailurePolicy::RetryOnce {
        return IterationOutcome::Failed(FailureRecord::new(index, &first_error, false), first_error);
    }

    match timed_call(backend, operation, payload, config.call_timeout).await {
        Ok(elapsed) => IterationOutcome::Recovered(
            LatencySample::new(index, elapsed),
            FailureRecord::new(index, &first_error, true),
            first_error,
        ),
        Err(second_error) => {
            IterationOutcome::Failed(FailureRecord::new(index, &second_error, false), second_error)
        }
    }
}

/// Runs benchmark cells against cache backends
pub struct BenchmarkHarness {
    config: ExecutionConfig,
    logger: Option<Arc<BenchmarkLogger>>,
}

impl BenchmarkHarness {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config, logger: None }
    }

    pub fn with_logger(mut self, logger: Arc<BenchmarkLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run N iterations of `operation` against one backend and aggregate them
    pub async fn run_cell(
        &self,
        backend: Arc<dyn CacheBackend>,
        operation: Operation,
        payload: &Payload,
    ) -> Result<CellResult> {
        if self.config.iterations == 0 {
            return Err(AppError::validation("A cell needs at least one iteration"));
        }
        if let ExecutionMode::Bounded { limit: 0 } = self.config.mode {
            return Err(AppError::validation("Bounded mode needs a limit of at least 1"));
        }

        let correlation_id = match self.logger {
            Some(ref logger) => {
                logger
                    .log_cell_start(
                        backend.name(),
                        operation.as_str(),
                        &self.config.mode.to_string(),
                        self.config.iterations,
                    )
                    .await
            }
            None => String::new(),
        };

        let mut cell = CellResult::new(backend.name(), operation, self.config.mode, self.config.iterations);
        let started = Instant::now();

        let collected = match self.config.mode {
            ExecutionMode::Sequential => self.collect_sequential(backend.as_ref(), operation, payload, &mut cell, &correlation_id).await,
            ExecutionMode::Concurrent => {
                concurrent::collect(self, backend.clone(), operation, payload, None, &mut cell, &correlation_id).await
            }
            ExecutionMode::Bounded { limit } => {
                concurrent::collect(self, backend.clone(), operation, payload, Some(limit), &mut cell, &correlation_id)
                    .await
            }
        };

        let result = collected.and_then(|()| cell.finish(started.elapsed()));

        if let Some(ref logger) = self.logger {
            match result {
                Ok(()) => logger.log_cell_complete(&cell, &correlation_id).await,
                Err(ref e) => {
                    logger
                        .log_cell_failed(backend.name(), operation.as_str(), e, &correlation_id)
                        .await
                }
            }
        }

        result.map(|()| cell)
    }

    async fn collect_sequential(
        &self,
        backend: &dyn CacheBackend,
        operation: Operation,
        payload: &Payload,
        cell: &mut CellResult,
        correlation_id: &str,
    ) -> Result<()> {
        for index in 0..self.config.iterations {
            let outcome = run_iteration(backend, operation, payload, index, &self.config).await;
            self.record(backend.name(), outcome, cell, correlation_id).await?;
        }
        Ok(())
    }

    /// Fold one outcome into the cell; `Err` means the policy aborts the cell
    pub(crate) async fn record(
        &self,
        backend: &str,
        outcome: IterationOutcome,
        cell: &mut CellResult,
        correlation_id: &str,
    ) -> Result<()> {
        match outcome {
            IterationOutcome::Sample(sample) => {
                cell.samples.push(sample);
                Ok(())
            }
            IterationOutcome::Recovered(sample, failure, error) => {
                if let Some(ref logger) = self.logger {
                    logger
                        .log_iteration_failure(backend, failure.index, &error, true, correlation_id)
                        .await;
                }
                cell.samples.push(sample);
                cell.failures.push(failure);
                Ok(())
            }
            IterationOutcome::Failed(failure, error) => {
                if let Some(ref logger) = self.logger {
                    logger
                        .log_iteration_failure(backend, failure.index, &error, false, correlation_id)
                        .await;
                }
                cell.failures.push(failure);
                if self.config.failure_policy == FailurePolicy::AbortAll {
                    Err(error)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Run every operation against every backend, one backend at a time
    ///
    /// A failing cell is recorded and the run moves on to the next cell.
    pub async fn run(
        &self,
        backends: &[Arc<dyn CacheBackend>],
        operations: &[Operation],
        payload: &Payload,
    ) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut cells = Vec::with_capacity(backends.len() * operations.len());

        for backend in backends {
            for &operation in operations {
                let result = self.run_cell(backend.clone(), operation, payload).await;
                cells.push(CellOutcome {
                    backend: backend.name().to_string(),
                    operation,
                    mode: self.config.mode,
                    result,
                });
            }
        }

        let report = RunReport::new(cells, started_at, started.elapsed());
        if let Some(ref logger) = self.logger {
            logger.log_run_summary(&report).await;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Ack;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory backend failing on chosen call numbers
    struct ScriptedBackend {
        calls: AtomicUsize,
        fail_calls: Vec<usize>,
        store: Mutex<HashMap<String, String>>,
    }

    impl ScriptedBackend {
        fn new(fail_calls: Vec<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_calls,
                store: Mutex::new(HashMap::new()),
            }
        }

        fn check(&self) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&call) {
                Err(AppError::remote(format!("scripted failure on call {}", call)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn kind(&self) -> crate::types::BackendKind {
            crate::types::BackendKind::Tcp
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.check()?;
            Ok(self.store.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<Ack> {
            self.check()?;
            self.store.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(Ack)
        }
    }

    fn harness(iterations: usize, policy: FailurePolicy) -> BenchmarkHarness {
        BenchmarkHarness::new(
            ExecutionConfig::default()
                .with_iterations(iterations)
                .with_failure_policy(policy),
        )
    }

    fn payload() -> Payload {
        Payload::new("weathers", "sunny-25")
    }

    #[test]
    fn test_system_resources_detection() {
        let resources = SystemResources::detect();
        assert!(resources.cpu_cores > 0);
        assert!(resources.recommended_concurrency >= 4);
        assert!(resources.recommended_concurrency <= 50);
    }

    #[test]
    fn test_execution_config_from_config() {
        let config = Config {
            iterations: 7,
            mode: ExecutionMode::Bounded { limit: 0 },
            concurrency_limit: 3,
            call_timeout_ms: 250,
            ..Config::default()
        };
        let exec = ExecutionConfig::from(&config);
        assert_eq!(exec.iterations, 7);
        assert_eq!(exec.mode, ExecutionMode::Bounded { limit: 3 });
        assert_eq!(exec.call_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_sequential_cell_collects_every_sample() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![]));
        let cell = harness(5, FailurePolicy::ExcludeAndCount)
            .run_cell(backend, Operation::Set, &payload())
            .await
            .unwrap();

        assert_eq!(cell.samples.len(), 5);
        assert!(cell.failures.is_empty());
        let stats = cell.stats.unwrap();
        assert_eq!(stats.sample_count, 5);
        assert!(stats.min_ms <= stats.avg_ms && stats.avg_ms <= stats.max_ms);
        let indices: Vec<usize> = cell.samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_exclude_and_count_drops_failed_iterations() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![1, 3]));
        let cell = harness(5, FailurePolicy::ExcludeAndCount)
            .run_cell(backend, Operation::Get, &payload())
            .await
            .unwrap();

        assert_eq!(cell.samples.len(), 3);
        assert_eq!(cell.excluded_count(), 2);
        assert_eq!(cell.failures[0].category, "REMOTE");
        assert_eq!(cell.stats.unwrap().sample_count, 3);
    }

    #[tokio::test]
    async fn test_abort_all_stops_at_first_failure() {
        let scripted = Arc::new(ScriptedBackend::new(vec![2]));
        let backend: Arc<dyn CacheBackend> = scripted.clone();
        let err = harness(10, FailurePolicy::AbortAll)
            .run_cell(backend, Operation::Set, &payload())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Remote(_)));
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_once_recovers_single_fault() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![1]));
        let cell = harness(3, FailurePolicy::RetryOnce)
            .run_cell(backend, Operation::Set, &payload())
            .await
            .unwrap();

        assert_eq!(cell.samples.len(), 3);
        assert_eq!(cell.retried_count(), 1);
        assert_eq!(cell.excluded_count(), 0);
        assert!(cell.failures[0].retried);
    }

    #[tokio::test]
    async fn test_retry_once_excludes_double_fault() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![0, 1]));
        let cell = harness(2, FailurePolicy::RetryOnce)
            .run_cell(backend, Operation::Get, &payload())
            .await
            .unwrap();

        assert_eq!(cell.samples.len(), 1);
        assert_eq!(cell.excluded_count(), 1);
        assert_eq!(cell.samples[0].index, 1);
    }

    #[tokio::test]
    async fn test_all_failed_cell_is_an_error() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![0, 1, 2]));
        let err = harness(3, FailurePolicy::ExcludeAndCount)
            .run_cell(backend, Operation::Get, &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Benchmark(_)));
    }

    #[tokio::test]
    async fn test_zero_iterations_rejected() {
        let backend: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![]));
        let result = harness(0, FailurePolicy::ExcludeAndCount)
            .run_cell(backend, Operation::Get, &payload())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_run_continues_past_failed_cell() {
        let broken: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new((0..100).collect()));
        let healthy: Arc<dyn CacheBackend> = Arc::new(ScriptedBackend::new(vec![]));

        let report = harness(2, FailurePolicy::ExcludeAndCount)
            .run(&[broken, healthy], &[Operation::Set, Operation::Get], &payload())
            .await;

        assert_eq!(report.cells.len(), 4);
        assert_eq!(report.failed_cells().len(), 2);
        assert_eq!(report.completed().count(), 2);
        assert!(!report.is_success());
    }
}

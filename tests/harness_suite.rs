//! Harness and suite runs against the in-process line cache

use cache_latency_bench::{
    backend::{BackendFactory, CacheBackend, LineClientConfig, LinePool, LineProtocolClient},
    executor::{BenchmarkHarness, ExecutionConfig, Payload},
    models::Config,
    server::{LineCacheServer, ServerConfig, ServerHandle},
    stats::StatisticsEngine,
    suite::{BenchmarkSuite, SuiteOperation},
    types::{BackendKind, ExecutionMode, FailurePolicy, Operation},
    AppError,
};
use std::sync::Arc;
use std::time::Duration;

async fn start_server() -> ServerHandle {
    LineCacheServer::bind(ServerConfig::default())
        .await
        .unwrap()
        .spawn()
        .unwrap()
}

fn line_config(handle: &ServerHandle) -> LineClientConfig {
    LineClientConfig::new(handle.addr().to_string()).with_io_timeout(Duration::from_secs(2))
}

fn bench_config(handle: &ServerHandle, iterations: usize, mode: ExecutionMode) -> Config {
    Config {
        tcp_addr: handle.addr().to_string(),
        backends: vec![BackendKind::Tcp, BackendKind::TcpPool],
        iterations,
        mode,
        concurrency_limit: 4,
        pool_size: 4,
        value: Some("sunny 25".to_string()),
        enable_color: false,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_three_sequential_iterations_then_read_back() {
    let server = start_server().await;
    let backend: Arc<dyn CacheBackend> = Arc::new(LineProtocolClient::new(line_config(&server)));
    let payload = Payload::new("weathers", "sunny-25");

    let harness = BenchmarkHarness::new(ExecutionConfig::default().with_iterations(3));
    let report = harness.run(&[backend.clone()], &[Operation::Set, Operation::Get], &payload).await;

    assert!(report.is_success());
    assert_eq!(report.cells.len(), 2);
    for cell in report.completed() {
        assert_eq!(cell.samples.len(), 3);
        assert!(cell.failures.is_empty());
        let stats = cell.stats.unwrap();
        assert!(stats.min_ms <= stats.avg_ms && stats.avg_ms <= stats.max_ms);
    }
    assert_eq!(backend.get("weathers").await.unwrap(), Some("sunny-25".to_string()));
}

#[tokio::test]
async fn test_concurrent_and_bounded_cells_over_pool() {
    let server = start_server().await;
    let pool = Arc::new(LinePool::new(line_config(&server), 4).unwrap());
    let backend: Arc<dyn CacheBackend> = pool.clone();
    let payload = Payload::new("weathers", "sunny 25");

    for mode in [ExecutionMode::Concurrent, ExecutionMode::Bounded { limit: 2 }] {
        let harness = BenchmarkHarness::new(ExecutionConfig::default().with_iterations(64).with_mode(mode));
        let cell = harness.run_cell(backend.clone(), Operation::Set, &payload).await.unwrap();
        assert_eq!(cell.samples.len(), 64);
        assert_eq!(cell.mode, mode);
        let indices: Vec<usize> = cell.samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..64).collect::<Vec<_>>());
    }

    // Every member connected once and stayed connected
    assert!(pool.clients().iter().all(|c| c.connect_count() == 1));
}

#[tokio::test]
async fn test_unreachable_backend_fails_its_cell_only() {
    let server = start_server().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let live: Arc<dyn CacheBackend> = Arc::new(LineProtocolClient::new(line_config(&server)));
    let dead: Arc<dyn CacheBackend> =
        Arc::new(LineProtocolClient::new(LineClientConfig::new(dead_addr)).with_name("Dead"));

    let harness = BenchmarkHarness::new(ExecutionConfig::default().with_iterations(5));
    let report = harness
        .run(&[dead, live], &[Operation::Set], &Payload::new("weathers", "sunny 25"))
        .await;

    assert_eq!(report.failed_cells().len(), 1);
    assert_eq!(report.failed_cells()[0].backend, "Dead");
    assert!(matches!(report.first_error(), Some(AppError::Benchmark(_))));
    assert_eq!(report.completed().next().unwrap().backend, "LineTcp");

    let aborting = BenchmarkHarness::new(
        ExecutionConfig::default()
            .with_iterations(5)
            .with_failure_policy(FailurePolicy::AbortAll),
    );
    let dead: Arc<dyn CacheBackend> =
        Arc::new(LineProtocolClient::new(LineClientConfig::new("127.0.0.1:1")).with_name("Dead"));
    let err = aborting
        .run_cell(dead, Operation::Get, &Payload::new("weathers", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Connect(_)));
}

#[tokio::test]
async fn test_suite_all_over_factory_backends() {
    let server = start_server().await;
    let config = bench_config(&server, 20, ExecutionMode::Bounded { limit: 4 });

    let mut backends = Vec::new();
    for (kind, backend) in BackendFactory::new(&config).create_all().await {
        assert!(config.backends.contains(&kind));
        backends.push(backend.unwrap());
    }

    let suite = BenchmarkSuite::new(config, backends);
    let report = suite.run(SuiteOperation::All).await.unwrap();

    let keys: Vec<String> = report.completed().map(|c| c.report_key()).collect();
    assert_eq!(keys, vec!["LineTcpSet", "LineTcpGet", "LineTcpPoolSet", "LineTcpPoolGet"]);
    assert!(report.completed().all(|c| c.samples.len() == 20));

    let analysis = StatisticsEngine::from_report(&report).analyze().unwrap();
    assert_eq!(analysis.comparison(Operation::Get).unwrap().rankings.len(), 2);
    assert_eq!(analysis.total_samples, 80);
}

#[tokio::test]
async fn test_single_shot_and_parallel_operations() {
    let server = start_server().await;
    let config = bench_config(&server, 10, ExecutionMode::Sequential);
    let backend: Arc<dyn CacheBackend> = Arc::new(LineProtocolClient::new(line_config(&server)));
    let suite = BenchmarkSuite::new(config, vec![backend.clone()]);

    let report = suite.run(SuiteOperation::Get).await.unwrap();
    let cell = report.completed().next().unwrap();
    assert_eq!(cell.operation, Operation::Get);
    assert_eq!(cell.samples.len(), 1);
    // Primed before timing, so the single GET is a hit
    assert_eq!(backend.get("weathers").await.unwrap(), Some("sunny 25".to_string()));

    let report = suite.run(SuiteOperation::SetHighloadParallel).await.unwrap();
    let cell = report.completed().next().unwrap();
    assert_eq!(cell.mode, ExecutionMode::Concurrent);
    assert_eq!(cell.samples.len(), 10);
}

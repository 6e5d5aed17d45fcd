//! Main application orchestration and execution

use crate::{
    backend::{BackendFactory, CacheBackend},
    cli::{supports_color, Cli},
    config::{display_config_summary, load_config, validate_config},
    error::Result,
    log_info,
    logging::LoggerFactory,
    models::{CellOutcome, Config, RunReport},
    output::OutputCoordinator,
    server::{LineCacheServer, ServerConfig},
    suite::BenchmarkSuite,
    types::OutputFormat,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run the benchmark, or the line cache server with `--serve`
    pub async fn run(self) -> Result<()> {
        let mut config = load_config(self.cli.clone())?;
        if !self.cli.color && !supports_color() {
            config.enable_color = false;
        }

        let warnings = validate_config(&config)?;
        if config.debug {
            eprintln!("Configuration Summary:");
            eprintln!("{}", display_config_summary(&config));
        }
        if !warnings.is_empty() && config.output_format != OutputFormat::Json {
            eprintln!("Configuration Warnings:");
            for warning in &warnings {
                eprintln!("  {}", warning.format(config.enable_color));
            }
        }

        if self.cli.serve {
            serve(&config).await
        } else {
            benchmark(&config, &self.cli).await
        }
    }
}

async fn serve(config: &Config) -> Result<()> {
    let logger = LoggerFactory::new(config.clone()).create_logger("SERVER").await;
    let server_config = ServerConfig::new(config.tcp_addr.clone()).with_default_ttl(config.ttl());
    let server = LineCacheServer::bind_with_logger(server_config, logger).await?;

    eprintln!("Serving line cache on {} (Ctrl-C to stop)", server.local_addr()?);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn benchmark(config: &Config, cli: &Cli) -> Result<()> {
    let started_at = Utc::now();
    let start = Instant::now();

    let factory = LoggerFactory::new(config.clone());
    let connection_logger = Arc::new(factory.create_connection_logger().await);
    let bench_logger = Arc::new(factory.create_benchmark_logger().await);
    let error_logger = factory.create_error_logger();

    log_info!(
        bench_logger.logger(),
        "Starting {} against {} backend(s), session {}",
        cli.operation,
        config.backends.len(),
        factory.session_id()
    );

    let mut backends: Vec<Arc<dyn CacheBackend>> = Vec::new();
    let mut unavailable = Vec::new();
    let created = BackendFactory::new(config)
        .with_logger(connection_logger)
        .create_all()
        .await;

    for (kind, result) in created {
        match result {
            Ok(backend) => backends.push(backend),
            Err(e) => {
                error_logger.log_error(&e, Some(kind.display_name())).await;
                // Every cell of an unavailable backend fails with the creation error
                let mode = cli.operation.mode(config.execution_mode());
                for operation in cli.operation.operations() {
                    unavailable.push(CellOutcome {
                        backend: kind.display_name().to_string(),
                        operation,
                        mode,
                        result: Err(e.clone()),
                    });
                }
            }
        }
    }

    let suite = BenchmarkSuite::new(config.clone(), backends).with_logger(bench_logger.clone());
    let mut report = if suite.backends().is_empty() {
        RunReport::new(Vec::new(), started_at, Duration::ZERO)
    } else {
        suite.run(cli.operation).await?
    };
    report.cells.extend(unavailable);
    report.total_duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let output = OutputCoordinator::from_config(config).display_results(&report)?;
    println!("{}", output);

    match report.first_error() {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}

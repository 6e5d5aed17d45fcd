//! Cache Latency Bench
//!
//! Measures round-trip latency of interchangeable cache backends (a raw TCP
//! line protocol cache, an HTTP-fronted cache service and Redis) under
//! sequential and concurrent load, and reports min/avg/max per backend and
//! operation.

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod suite;
pub mod types;

// Re-export commonly used types
pub use backend::{BackendFactory, CacheBackend, HttpCacheClient, LinePool, LineProtocolClient, ManagedCacheClient};
pub use error::{AppError, Result};
pub use executor::{BenchmarkHarness, ExecutionConfig};
pub use models::{CellResult, Config, LatencySample, LatencyStats, RunReport};
pub use output::{ColoredFormatter, JsonFormatter, OutputCoordinator, OutputFormatter, PlainFormatter};
pub use server::LineCacheServer;
pub use suite::{BenchmarkSuite, SuiteOperation};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_TCP_ADDR: &str = "127.0.0.1:6060";
    pub const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:6060";
    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const DEFAULT_REDIS_INSTANCE: &str = "test";

    pub const DEFAULT_KEY: &str = "weathers";
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

    pub const DEFAULT_ITERATIONS: usize = 10_000;
    pub const MAX_ITERATIONS: usize = 1_000_000;
    pub const MAX_CONCURRENCY: usize = 10_000;
    pub const DEFAULT_POOL_SIZE: usize = 8;

    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_BARRIER_TIMEOUT: Duration = Duration::from_secs(300);

    /// Longest line the TCP client accepts (16 MiB)
    pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}

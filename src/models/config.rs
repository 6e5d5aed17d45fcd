//! Configuration data model and validation

use crate::protocol;
use crate::types::{AppError, BackendKind, ExecutionMode, FailurePolicy, OutputFormat, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host:port` of the line protocol cache
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: String,

    /// Base URL of the HTTP cache service
    #[serde(default = "default_http_url")]
    pub http_url: String,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix applied to every Redis key
    #[serde(default = "default_redis_instance")]
    pub redis_instance: Option<String>,

    /// Backends to benchmark, in run order
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendKind>,

    /// Iterations per cell
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// How the iterations of a highload cell are issued
    #[serde(default = "default_mode")]
    pub mode: ExecutionMode,

    /// In-flight cap for bounded mode
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Connections in the line pool backend
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Overall fan-in deadline for concurrent cells, in seconds
    #[serde(default = "default_barrier_timeout_secs")]
    pub barrier_timeout_secs: u64,

    /// Key used by every operation
    #[serde(default = "default_key")]
    pub key: String,

    /// Value written by SET; a generated payload when absent
    #[serde(default)]
    pub value: Option<String>,

    /// Expiry of written entries in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tcp_addr: default_tcp_addr(),
            http_url: default_http_url(),
            redis_url: default_redis_url(),
            redis_instance: default_redis_instance(),
            backends: default_backends(),
            iterations: default_iterations(),
            mode: default_mode(),
            concurrency_limit: default_concurrency_limit(),
            pool_size: default_pool_size(),
            failure_policy: FailurePolicy::default(),
            call_timeout_ms: default_call_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            barrier_timeout_secs: default_barrier_timeout_secs(),
            key: default_key(),
            value: None,
            ttl_seconds: default_ttl_seconds(),
            output_format: default_output_format(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_secs(self.barrier_timeout_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Mode with the bounded limit taken from `concurrency_limit`
    pub fn execution_mode(&self) -> ExecutionMode {
        match self.mode {
            ExecutionMode::Bounded { .. } => ExecutionMode::Bounded {
                limit: self.concurrency_limit,
            },
            other => other,
        }
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        validate_socket_addr(&self.tcp_addr)?;

        match url::Url::parse(&self.http_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(AppError::config(format!(
                    "HTTP cache URL must use http or https: {} (scheme '{}')",
                    self.http_url,
                    parsed.scheme()
                )))
            }
            Err(e) => return Err(AppError::config(format!("Invalid HTTP cache URL '{}': {}", self.http_url, e))),
        }

        match url::Url::parse(&self.redis_url) {
            Ok(parsed) if matches!(parsed.scheme(), "redis" | "rediss" | "unix" | "redis+unix") => {}
            Ok(_) => return Err(AppError::config(format!("Redis URL must use redis:// or rediss://: {}", self.redis_url))),
            Err(e) => return Err(AppError::config(format!("Invalid Redis URL '{}': {}", self.redis_url, e))),
        }

        if self.backends.is_empty() {
            return Err(AppError::config("At least one backend must be selected"));
        }

        if self.iterations == 0 {
            return Err(AppError::config("Iterations must be greater than 0"));
        }
        if self.iterations > crate::defaults::MAX_ITERATIONS {
            return Err(AppError::config(format!(
                "Iterations cannot exceed {}",
                crate::defaults::MAX_ITERATIONS
            )));
        }

        if self.concurrency_limit == 0 || self.concurrency_limit > crate::defaults::MAX_CONCURRENCY {
            return Err(AppError::config(format!(
                "Concurrency limit must be between 1 and {}",
                crate::defaults::MAX_CONCURRENCY
            )));
        }

        if self.pool_size == 0 || self.pool_size > crate::backend::pool::MAX_POOL_SIZE {
            return Err(AppError::config(format!(
                "Pool size must be between 1 and {}",
                crate::backend::pool::MAX_POOL_SIZE
            )));
        }

        if self.call_timeout_ms == 0 || self.call_timeout_ms > 600_000 {
            return Err(AppError::config("Call timeout must be between 1 and 600000 ms"));
        }
        if self.connect_timeout_ms == 0 || self.connect_timeout_ms > 600_000 {
            return Err(AppError::config("Connect timeout must be between 1 and 600000 ms"));
        }
        if self.barrier_timeout_secs == 0 {
            return Err(AppError::config("Barrier timeout must be greater than 0"));
        }

        if self.ttl_seconds == 0 {
            return Err(AppError::config("TTL must be greater than 0"));
        }

        protocol::validate_key(&self.key).map_err(|e| AppError::config(e.to_string()))?;
        if let Some(value) = &self.value {
            protocol::validate_value(value).map_err(|e| AppError::config(e.to_string()))?;
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("CACHE_TCP_ADDR") {
            self.tcp_addr = addr.trim().to_string();
        }

        if let Ok(url) = std::env::var("CACHE_HTTP_URL") {
            self.http_url = url.trim().to_string();
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis_url = url.trim().to_string();
        }

        if let Ok(instance) = std::env::var("REDIS_INSTANCE") {
            let instance = instance.trim();
            self.redis_instance = (!instance.is_empty()).then(|| instance.to_string());
        }

        if let Ok(backends) = std::env::var("BENCH_BACKENDS") {
            self.backends = parse_backend_list(&backends)
                .map_err(|e| AppError::config(format!("Invalid BENCH_BACKENDS value '{}': {}", backends, e)))?;
        }

        if let Ok(iterations) = std::env::var("BENCH_ITERATIONS") {
            self.iterations = iterations
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid BENCH_ITERATIONS value '{}': {}", iterations, e)))?;
        }

        if let Ok(concurrency) = std::env::var("BENCH_CONCURRENCY") {
            self.concurrency_limit = concurrency
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid BENCH_CONCURRENCY value '{}': {}", concurrency, e)))?;
        }

        if let Ok(mode) = std::env::var("BENCH_MODE") {
            self.mode = ExecutionMode::parse_with_limit(&mode, self.concurrency_limit)
                .map_err(|e| AppError::config(format!("Invalid BENCH_MODE value '{}': {}", mode, e)))?;
            if let ExecutionMode::Bounded { limit } = self.mode {
                self.concurrency_limit = limit;
            }
        }

        if let Ok(policy) = std::env::var("BENCH_FAILURE_POLICY") {
            self.failure_policy = policy
                .parse()
                .map_err(|e| AppError::config(format!("Invalid BENCH_FAILURE_POLICY value '{}': {}", policy, e)))?;
        }

        if let Ok(timeout) = std::env::var("CALL_TIMEOUT_MS") {
            self.call_timeout_ms = timeout
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid CALL_TIMEOUT_MS value '{}': {}", timeout, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

/// Parse a comma-separated backend list, dropping duplicates but keeping order
pub fn parse_backend_list(list: &str) -> Result<Vec<BackendKind>> {
    let mut backends = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.eq_ignore_ascii_case("all") {
            for kind in BackendKind::ALL {
                if !backends.contains(&kind) {
                    backends.push(kind);
                }
            }
            continue;
        }
        let kind: BackendKind = item.parse()?;
        if !backends.contains(&kind) {
            backends.push(kind);
        }
    }
    Ok(backends)
}

fn validate_socket_addr(addr: &str) -> Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| AppError::config(format!("TCP address '{}' must be host:port", addr)))?;
    if host.is_empty() {
        return Err(AppError::config(format!("TCP address '{}' has no host", addr)));
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(AppError::config(format!("TCP address '{}' has an invalid port", addr))),
    }
}

// Default value functions for serde
fn default_tcp_addr() -> String {
    crate::defaults::DEFAULT_TCP_ADDR.to_string()
}

fn default_http_url() -> String {
    crate::defaults::DEFAULT_HTTP_URL.to_string()
}

fn default_redis_url() -> String {
    crate::defaults::DEFAULT_REDIS_URL.to_string()
}

fn default_redis_instance() -> Option<String> {
    Some(crate::defaults::DEFAULT_REDIS_INSTANCE.to_string())
}

fn default_backends() -> Vec<BackendKind> {
    BackendKind::ALL.to_vec()
}

fn default_iterations() -> usize {
    crate::defaults::DEFAULT_ITERATIONS
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Sequential
}

fn default_concurrency_limit() -> usize {
    crate::executor::SystemResources::detect().recommended_concurrency
}

fn default_pool_size() -> usize {
    crate::defaults::DEFAULT_POOL_SIZE
}

fn default_call_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_CALL_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_barrier_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_BARRIER_TIMEOUT.as_secs()
}

fn default_key() -> String {
    crate::defaults::DEFAULT_KEY.to_string()
}

fn default_ttl_seconds() -> u64 {
    crate::defaults::DEFAULT_TTL.as_secs()
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iterations, 10_000);
        assert_eq!(config.key, "weathers");
        assert_eq!(config.ttl(), Duration::from_secs(60));
        assert_eq!(config.redis_instance.as_deref(), Some("test"));
    }

    #[test]
    fn test_invalid_tcp_addr() {
        for addr in ["localhost", ":6060", "127.0.0.1:notaport", "127.0.0.1:0"] {
            let config = Config {
                tcp_addr: addr.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{} should be rejected", addr);
        }
    }

    #[test]
    fn test_invalid_urls() {
        let mut config = Config::default();
        config.http_url = "ftp://cache".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.redis_url = "http://127.0.0.1:6379".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_iteration_bounds() {
        let mut config = Config::default();
        config.iterations = 0;
        assert!(config.validate().is_err());
        config.iterations = crate::defaults::MAX_ITERATIONS + 1;
        assert!(config.validate().is_err());
        config.iterations = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_and_value_must_be_framable() {
        let mut config = Config::default();
        config.key = "two words".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.value = Some("line\nbreak".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_execution_mode_uses_concurrency_limit() {
        let config = Config {
            mode: ExecutionMode::Bounded { limit: 1 },
            concurrency_limit: 12,
            ..Config::default()
        };
        assert_eq!(config.execution_mode(), ExecutionMode::Bounded { limit: 12 });
    }

    #[test]
    fn test_parse_backend_list() {
        assert_eq!(
            parse_backend_list("tcp, http,tcp").unwrap(),
            vec![BackendKind::Tcp, BackendKind::Http]
        );
        assert_eq!(parse_backend_list("all").unwrap().len(), 4);
        assert!(parse_backend_list("tcp,memcached").is_err());
    }
}

//! Environment variable handling and .env file management

use crate::{
    error::{AppError, Result},
    models::config::parse_backend_list,
    types::{ExecutionMode, FailurePolicy},
};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load an env file if it exists; variables already set are not overwritten
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Cache Latency Bench Configuration
#
# Values here are defaults for every run and can be overridden by real
# environment variables or command-line flags.

# Line protocol cache (host:port)
# CACHE_TCP_ADDR=127.0.0.1:6060

# HTTP cache service base URL
# CACHE_HTTP_URL=http://127.0.0.1:6060

# Redis connection URL and key prefix
# REDIS_URL=redis://127.0.0.1:6379
# REDIS_INSTANCE=test

# Backends to benchmark (tcp, tcp-pool, http, redis or all)
# BENCH_BACKENDS=all

# Iterations per highload cell (1-1000000)
# BENCH_ITERATIONS=10000

# Execution mode for `all` (sequential, concurrent, bounded or bounded:<k>)
# BENCH_MODE=sequential

# In-flight cap for bounded mode
# BENCH_CONCURRENCY=16

# Failure policy (abort, exclude, retry)
# BENCH_FAILURE_POLICY=exclude

# Per-call timeout in milliseconds
# CALL_TIMEOUT_MS=5000

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "CACHE_HTTP_URL" | "REDIS_URL" => {
                url::Url::parse(value)
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "CACHE_TCP_ADDR" => {
                let valid = value
                    .rsplit_once(':')
                    .map(|(host, port)| !host.is_empty() && port.parse::<u16>().map_or(false, |p| p > 0))
                    .unwrap_or(false);
                if !valid {
                    return Err(AppError::config(format!("CACHE_TCP_ADDR must be host:port, got: {}", value)));
                }
            }
            "BENCH_BACKENDS" => {
                if parse_backend_list(value)?.is_empty() {
                    return Err(AppError::config("BENCH_BACKENDS names no backend"));
                }
            }
            "BENCH_ITERATIONS" => {
                let iterations: usize = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid BENCH_ITERATIONS value '{}': {}", value, e)))?;
                if iterations == 0 || iterations > crate::defaults::MAX_ITERATIONS {
                    return Err(AppError::config(format!(
                        "BENCH_ITERATIONS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_ITERATIONS,
                        iterations
                    )));
                }
            }
            "BENCH_MODE" => {
                ExecutionMode::parse_with_limit(value, 1)?;
            }
            "BENCH_CONCURRENCY" => {
                let limit: usize = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid BENCH_CONCURRENCY value '{}': {}", value, e)))?;
                if limit == 0 {
                    return Err(AppError::config("BENCH_CONCURRENCY must be at least 1"));
                }
            }
            "BENCH_FAILURE_POLICY" => {
                value.parse::<FailurePolicy>()?;
            }
            "CALL_TIMEOUT_MS" => {
                let timeout: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid CALL_TIMEOUT_MS value '{}': {}", value, e)))?;
                if timeout == 0 || timeout > 600_000 {
                    return Err(AppError::config(format!(
                        "CALL_TIMEOUT_MS must be between 1 and 600000, got: {}",
                        timeout
                    )));
                }
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Supported variables with a description and an example value
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("CACHE_TCP_ADDR", "Line protocol cache address", "127.0.0.1:6060"),
            ("CACHE_HTTP_URL", "HTTP cache service base URL", "http://127.0.0.1:6060"),
            ("REDIS_URL", "Redis connection URL", "redis://127.0.0.1:6379"),
            ("REDIS_INSTANCE", "Prefix for Redis keys", "test"),
            ("BENCH_BACKENDS", "Comma-separated backends to benchmark", "tcp,http"),
            ("BENCH_ITERATIONS", "Iterations per highload cell (1-1000000)", "10000"),
            ("BENCH_MODE", "sequential, concurrent, bounded or bounded:<k>", "bounded:32"),
            ("BENCH_CONCURRENCY", "In-flight cap for bounded mode", "16"),
            ("BENCH_FAILURE_POLICY", "abort, exclude or retry", "exclude"),
            ("CALL_TIMEOUT_MS", "Per-call timeout in milliseconds", "5000"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Warnings for every set variable that would fail to parse
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate an env file without loading it; `None` if it does not exist
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, ErrorContext, Result},
    models::{config::parse_backend_list, Config},
    types::{ExecutionMode, OutputFormat},
};

/// Combines defaults, .env, environment and CLI flags into one [`Config`]
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug).context("Loading .env file")?;
        config.merge_from_env().context("Reading environment")?;
        self.apply_cli_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let cli = &self.cli;

        if let Some(ref addr) = cli.tcp_addr {
            config.tcp_addr = addr.clone();
        }
        if let Some(ref url) = cli.http_url {
            config.http_url = url.clone();
        }
        if let Some(ref url) = cli.redis_url {
            config.redis_url = url.clone();
        }
        if let Some(ref instance) = cli.redis_instance {
            config.redis_instance = (!instance.is_empty()).then(|| instance.clone());
        }

        if !cli.backends.is_empty() {
            config.backends = parse_backend_list(&cli.backends.join(","))
                .map_err(|e| AppError::config(format!("Invalid --backend: {}", e)))?;
        }

        if let Some(iterations) = cli.iterations {
            config.iterations = iterations;
        }
        if let Some(limit) = cli.concurrency {
            config.concurrency_limit = limit;
        }
        if let Some(ref mode) = cli.mode {
            config.mode = ExecutionMode::parse_with_limit(mode, config.concurrency_limit)
                .map_err(|e| AppError::config(format!("Invalid --mode: {}", e)))?;
            if let ExecutionMode::Bounded { limit } = config.mode {
                config.concurrency_limit = limit;
            }
        }
        if let Some(size) = cli.pool_size {
            config.pool_size = size;
        }
        if let Some(ref policy) = cli.failure_policy {
            config.failure_policy = policy
                .parse()
                .map_err(|e| AppError::config(format!("Invalid --failure-policy: {}", e)))?;
        }

        if let Some(ms) = cli.timeout_ms {
            config.call_timeout_ms = ms;
        }
        if let Some(ms) = cli.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(secs) = cli.barrier_timeout {
            config.barrier_timeout_secs = secs;
        }

        if let Some(ref key) = cli.key {
            config.key = key.clone();
        }
        if let Some(ref value) = cli.value {
            config.value = Some(value.clone());
        }
        if let Some(ttl) = cli.ttl {
            config.ttl_seconds = ttl;
        }

        if cli.json {
            config.output_format = OutputFormat::Json;
        }
        if cli.no_color || cli.json {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }

        Ok(())
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let backends: Vec<&str> = config.backends.iter().map(|b| b.id()).collect();
    let mut summary = Vec::new();

    summary.push(format!("Backends: {}", backends.join(", ")));
    summary.push(format!("TCP Address: {}", config.tcp_addr));
    summary.push(format!("HTTP URL: {}", config.http_url));
    summary.push(format!(
        "Redis: {} (prefix: {})",
        config.redis_url,
        config.redis_instance.as_deref().unwrap_or("none")
    ));
    summary.push(format!("Iterations: {}", config.iterations));
    summary.push(format!("Mode: {}", config.execution_mode()));
    summary.push(format!("Pool Size: {}", config.pool_size));
    summary.push(format!("Failure Policy: {}", config.failure_policy));
    summary.push(format!(
        "Timeouts: call {}ms, connect {}ms, barrier {}s",
        config.call_timeout_ms, config.connect_timeout_ms, config.barrier_timeout_secs
    ));
    summary.push(format!("Key: {} (ttl {}s)", config.key, config.ttl_seconds));
    summary.push(format!("Color Output: {}", config.enable_color));

    summary.join("\n")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard};

    /// Serializes tests that touch process environment
    pub static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub const BENCH_VARS: [&str; 11] = [
        "CACHE_TCP_ADDR",
        "CACHE_HTTP_URL",
        "REDIS_URL",
        "REDIS_INSTANCE",
        "BENCH_BACKENDS",
        "BENCH_ITERATIONS",
        "BENCH_MODE",
        "BENCH_CONCURRENCY",
        "BENCH_FAILURE_POLICY",
        "CALL_TIMEOUT_MS",
        "ENABLE_COLOR",
    ];

    /// Take the lock and clear every variable the parser reads
    pub fn clean_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for var in BENCH_VARS {
            std::env::remove_var(var);
        }
        guard
    }
}

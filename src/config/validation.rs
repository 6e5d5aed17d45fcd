//! Advisory checks on top of [`Config::validate`]
//!
//! `Config::validate` rejects configurations that cannot run. The checks here
//! flag configurations that will run but are likely to measure something other
//! than what the user meant.

use crate::{
    error::Result,
    models::Config,
    types::{BackendKind, ExecutionMode},
};
use colored::*;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation followed by advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::check_backends(config));
        warnings.extend(Self::check_load_settings(config));
        warnings.extend(Self::check_timeouts(config));
        Ok(warnings)
    }

    fn check_backends(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.mode.is_concurrent() && config.backends.contains(&BackendKind::Tcp) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "The tcp backend serializes concurrent calls over one connection; compare with tcp-pool".to_string(),
            ));
        }

        if config.backends.contains(&BackendKind::Redis) && config.redis_instance.is_none() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Redis keys are not prefixed; '{}' is written as-is", config.key),
            ));
        }

        if let Ok(parsed) = url::Url::parse(&config.http_url) {
            if parsed.path() != "/" {
                let base = config.http_url.trim_end_matches('/');
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("HTTP cache requests go to {base}/set and {base}/get"),
                ));
            }
        }

        warnings
    }

    fn check_load_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.iterations < 30 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("{} iterations may not give stable min/avg/max figures", config.iterations),
            ));
        }

        if let ExecutionMode::Bounded { .. } = config.mode {
            if config.backends.contains(&BackendKind::TcpPool) && config.pool_size < config.concurrency_limit {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "Pool of {} connections is smaller than the in-flight cap of {}; some calls will queue",
                        config.pool_size, config.concurrency_limit
                    ),
                ));
            }
        }

        if config.mode == ExecutionMode::Concurrent && config.iterations > 10_000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Unbounded fan-out of {} calls may exhaust sockets; consider --mode bounded",
                    config.iterations
                ),
            ));
        }

        warnings
    }

    fn check_timeouts(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.call_timeout_ms < 10 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Call timeout of {}ms will count ordinary calls as failures", config.call_timeout_ms),
            ));
        }

        if config.mode.is_concurrent() && config.call_timeout() >= config.barrier_timeout() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Barrier timeout is not longer than the call timeout; stalled calls surface as barrier timeouts"
                    .to_string(),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }
        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &Config) -> Vec<String> {
        validate_config(config).unwrap().into_iter().map(|w| w.message).collect()
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = Config {
            iterations: 0,
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        assert!(messages(&Config::default()).is_empty());
    }

    #[test]
    fn test_concurrent_single_connection_hint() {
        let config = Config {
            mode: ExecutionMode::Concurrent,
            backends: vec![BackendKind::Tcp],
            ..Config::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("tcp-pool")));
    }

    #[test]
    fn test_small_pool_under_bounded_load() {
        let config = Config {
            mode: ExecutionMode::Bounded { limit: 32 },
            concurrency_limit: 32,
            pool_size: 4,
            backends: vec![BackendKind::TcpPool],
            ..Config::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("queue")));
    }

    #[test]
    fn test_few_iterations_warning() {
        let config = Config {
            iterations: 3,
            ..Config::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.level == ValidationLevel::Warning));
        assert!(warnings[0].format(false).starts_with("[WARNING]"));
    }
}

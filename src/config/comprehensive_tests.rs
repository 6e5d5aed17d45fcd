//! Additional tests for configuration layering and edge cases

use super::parser::test_support::clean_env;
use super::EnvManager;
use crate::{
    models::Config,
    types::{BackendKind, ExecutionMode, FailurePolicy},
};
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn env_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Layering of .env file, environment and defaults
mod layering_tests {
    use super::*;

    #[test]
    fn test_env_file_values_reach_config() {
        let _guard = clean_env();
        let file = env_file(&[
            "# bench settings",
            "BENCH_ITERATIONS=42",
            "BENCH_BACKENDS=tcp,tcp-pool",
            "BENCH_FAILURE_POLICY=retry-once",
        ]);

        EnvManager::load_env_file_from(file.path(), false).unwrap();
        let mut config = Config::default();
        config.merge_from_env().unwrap();

        assert_eq!(config.iterations, 42);
        assert_eq!(config.backends, vec![BackendKind::Tcp, BackendKind::TcpPool]);
        assert_eq!(config.failure_policy, FailurePolicy::RetryOnce);

        for var in ["BENCH_ITERATIONS", "BENCH_BACKENDS", "BENCH_FAILURE_POLICY"] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_environment_beats_env_file() {
        let _guard = clean_env();
        env::set_var("BENCH_ITERATIONS", "9");
        let file = env_file(&["BENCH_ITERATIONS=42"]);

        EnvManager::load_env_file_from(file.path(), false).unwrap();
        let mut config = Config::default();
        config.merge_from_env().unwrap();
        assert_eq!(config.iterations, 9);

        env::remove_var("BENCH_ITERATIONS");
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let file = NamedTempFile::new().unwrap();
        let missing = file.path().with_extension("gone");
        assert!(EnvManager::load_env_file_from(&missing, true).is_ok());
    }

    #[test]
    fn test_bounded_mode_from_environment() {
        let _guard = clean_env();
        env::set_var("BENCH_CONCURRENCY", "5");
        env::set_var("BENCH_MODE", "bounded");

        let mut config = Config::default();
        config.merge_from_env().unwrap();
        assert_eq!(config.execution_mode(), ExecutionMode::Bounded { limit: 5 });

        env::set_var("BENCH_MODE", "bounded:12");
        config.merge_from_env().unwrap();
        assert_eq!(config.execution_mode(), ExecutionMode::Bounded { limit: 12 });

        env::remove_var("BENCH_CONCURRENCY");
        env::remove_var("BENCH_MODE");
    }

    #[test]
    fn test_validate_current_env_reports_bad_values() {
        let _guard = clean_env();
        assert!(EnvManager::validate_current_env().is_empty());

        env::set_var("ENABLE_COLOR", "sometimes");
        let warnings = EnvManager::validate_current_env();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ENABLE_COLOR"));
        env::remove_var("ENABLE_COLOR");
    }
}

/// Serde defaults and edge values
mod config_edge_cases {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"iterations": 3, "key": "k"}"#).unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.key, "k");
        assert_eq!(config.tcp_addr, crate::defaults::DEFAULT_TCP_ADDR);
        assert_eq!(config.backends.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_boundary_values() {
        let mut config = Config::default();
        config.iterations = crate::defaults::MAX_ITERATIONS;
        config.concurrency_limit = crate::defaults::MAX_CONCURRENCY;
        config.pool_size = crate::backend::pool::MAX_POOL_SIZE;
        assert!(config.validate().is_ok());

        config.pool_size += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_value_with_spaces_is_allowed() {
        let config = Config {
            value: Some("sunny and 25".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ipv6_tcp_addr() {
        let config = Config {
            tcp_addr: "[::1]:6060".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}

//! Type definitions and aliases

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Cache operation measured by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Read a key
    Get,
    /// Write a key with a TTL
    Set,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "Get",
            Operation::Set => "Set",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend variants that can be benchmarked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    /// Single persistent TCP connection speaking the line protocol
    Tcp,
    /// Round-robin pool of line protocol connections
    TcpPool,
    /// HTTP-fronted cache service
    Http,
    /// Managed distributed cache (Redis)
    Redis,
}

impl BackendKind {
    /// All backend kinds in report order
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Redis,
        BackendKind::Http,
        BackendKind::Tcp,
        BackendKind::TcpPool,
    ];

    /// Short identifier used in configuration and CLI flags
    pub fn id(&self) -> &'static str {
        match self {
            BackendKind::Tcp => "tcp",
            BackendKind::TcpPool => "tcp-pool",
            BackendKind::Http => "http",
            BackendKind::Redis => "redis",
        }
    }

    /// Human-readable name used in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Tcp => "LineTcp",
            BackendKind::TcpPool => "LineTcpPool",
            BackendKind::Http => "HttpCache",
            BackendKind::Redis => "Redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tcp" | "line" => Ok(BackendKind::Tcp),
            "tcp-pool" | "tcp_pool" | "pool" => Ok(BackendKind::TcpPool),
            "http" => Ok(BackendKind::Http),
            "redis" | "managed" => Ok(BackendKind::Redis),
            other => Err(AppError::parse(format!(
                "Unknown backend '{}' (expected tcp, tcp-pool, http or redis)",
                other
            ))),
        }
    }
}

/// How the harness issues the N operations of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// One at a time, in program order
    Sequential,
    /// All N launched at once, no in-flight cap
    Concurrent,
    /// All N launched, at most `limit` in flight
    Bounded { limit: usize },
}

impl ExecutionMode {
    pub fn is_concurrent(&self) -> bool {
        !matches!(self, ExecutionMode::Sequential)
    }

    /// Parse a mode name; `bounded` takes its limit from `default_limit`
    /// unless written as `bounded:<k>`
    pub fn parse_with_limit(s: &str, default_limit: usize) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        if let Some(limit) = normalized.strip_prefix("bounded:") {
            let limit: usize = limit
                .trim()
                .parse()
                .map_err(|_| AppError::parse(format!("Invalid bounded limit '{}'", limit)))?;
            return Ok(ExecutionMode::Bounded { limit });
        }
        match normalized.as_str() {
            "sequential" | "seq" => Ok(ExecutionMode::Sequential),
            "concurrent" | "parallel" => Ok(ExecutionMode::Concurrent),
            "bounded" => Ok(ExecutionMode::Bounded { limit: default_limit }),
            other => Err(AppError::parse(format!(
                "Unknown execution mode '{}' (expected sequential, concurrent or bounded)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Concurrent => f.write_str("concurrent"),
            ExecutionMode::Bounded { limit } => write!(f, "bounded({})", limit),
        }
    }
}

/// What the harness does with an iteration that fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// First failure aborts the cell
    AbortAll,
    /// Failed iterations are dropped from the sample set and counted
    ExcludeAndCount,
    /// Failed iterations are retried once, then excluded
    RetryOnce,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::ExcludeAndCount
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::AbortAll => f.write_str("abort-all"),
            FailurePolicy::ExcludeAndCount => f.write_str("exclude-and-count"),
            FailurePolicy::RetryOnce => f.write_str("retry-once"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "abort" | "abort-all" => Ok(FailurePolicy::AbortAll),
            "exclude" | "exclude-and-count" => Ok(FailurePolicy::ExcludeAndCount),
            "retry" | "retry-once" => Ok(FailurePolicy::RetryOnce),
            other => Err(AppError::parse(format!(
                "Unknown failure policy '{}' (expected abort-all, exclude-and-count or retry-once)",
                other
            ))),
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::parse(format!("Unknown output format '{}'", other))),
        }
    }
}

/// Latency band used for colouring report cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyBand {
    /// Under one millisecond
    Fast,
    /// 1-10 ms
    Moderate,
    /// Over 10 ms
    Slow,
}

impl LatencyBand {
    pub fn from_ms(ms: f64) -> Self {
        if ms < 1.0 {
            Self::Fast
        } else if ms < 10.0 {
            Self::Moderate
        } else {
            Self::Slow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("tcp".parse::<BackendKind>().unwrap(), BackendKind::Tcp);
        assert_eq!("TCP-POOL".parse::<BackendKind>().unwrap(), BackendKind::TcpPool);
        assert_eq!("managed".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert!("memcached".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!(
            ExecutionMode::parse_with_limit("parallel", 8).unwrap(),
            ExecutionMode::Concurrent
        );
        assert_eq!(
            ExecutionMode::parse_with_limit("bounded", 8).unwrap(),
            ExecutionMode::Bounded { limit: 8 }
        );
        assert_eq!(
            ExecutionMode::parse_with_limit("Bounded:32", 8).unwrap(),
            ExecutionMode::Bounded { limit: 32 }
        );
        assert!(ExecutionMode::parse_with_limit("bounded:many", 8).is_err());
        assert!(!ExecutionMode::Sequential.is_concurrent());
        assert_eq!(ExecutionMode::Bounded { limit: 3 }.to_string(), "bounded(3)");
    }

    #[test]
    fn test_failure_policy_round_trip() {
        for policy in [
            FailurePolicy::AbortAll,
            FailurePolicy::ExcludeAndCount,
            FailurePolicy::RetryOnce,
        ] {
            assert_eq!(policy.to_string().parse::<FailurePolicy>().unwrap(), policy);
        }
        assert_eq!(FailurePolicy::default(), FailurePolicy::ExcludeAndCount);
    }

    #[test]
    fn test_latency_band() {
        assert_eq!(LatencyBand::from_ms(0.4), LatencyBand::Fast);
        assert_eq!(LatencyBand::from_ms(4.0), LatencyBand::Moderate);
        assert_eq!(LatencyBand::from_ms(40.0), LatencyBand::Slow);
    }
}

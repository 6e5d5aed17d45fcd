//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use crate::suite::SuiteOperation;
use clap::{ArgAction, Parser};

/// Cache Latency Bench - measure get/set latency across cache backends
#[derive(Parser, Debug, Clone)]
#[command(name = "clb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Benchmark to run (set, get, set-highload, get-highload,
    /// set-highload-parallel, get-highload-parallel, all)
    #[arg(short, long, default_value = "all", value_parser = parse_operation)]
    pub operation: SuiteOperation,

    /// Backend to benchmark: tcp, tcp-pool, http, redis or all (repeatable, comma-separated)
    #[arg(short, long = "backend", action = ArgAction::Append)]
    pub backends: Vec<String>,

    /// Iterations per highload cell
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Execution mode for `all`: sequential, concurrent, bounded or bounded:<k>
    #[arg(short, long)]
    pub mode: Option<String>,

    /// In-flight cap for bounded mode
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Connections held by the tcp-pool backend
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// What to do when a call fails: abort, exclude or retry
    #[arg(long)]
    pub failure_policy: Option<String>,

    /// Address of the line protocol cache
    #[arg(long)]
    pub tcp_addr: Option<String>,

    /// Base URL of the HTTP cache service
    #[arg(long)]
    pub http_url: Option<String>,

    /// Redis connection URL
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Prefix for Redis keys (empty for none)
    #[arg(long)]
    pub redis_instance: Option<String>,

    /// Cache key
    #[arg(short, long)]
    pub key: Option<String>,

    /// Value to SET (defaults to a generated forecast payload)
    #[arg(long)]
    pub value: Option<String>,

    /// TTL of written entries in seconds
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Per-call timeout in milliseconds
    #[arg(short, long, value_parser = parse_timeout_ms)]
    pub timeout_ms: Option<u64>,

    /// Connect timeout in milliseconds
    #[arg(long, value_parser = parse_timeout_ms)]
    pub connect_timeout_ms: Option<u64>,

    /// Deadline in seconds for a concurrent cell to finish
    #[arg(long)]
    pub barrier_timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Run the in-memory line cache server on --tcp-addr until Ctrl-C
    #[arg(long)]
    pub serve: bool,

    /// Show help for a specific topic (backends, modes, policies, env, examples)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.serve && self.json {
            return Err("--json has no effect with --serve".to_string());
        }

        if let Some(0) = self.iterations {
            return Err("--iterations must be at least 1".to_string());
        }

        if let Some(0) = self.concurrency {
            return Err("--concurrency must be at least 1".to_string());
        }

        if let Some(0) = self.ttl {
            return Err("--ttl must be at least 1 second".to_string());
        }

        Ok(())
    }

    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.json {
            false
        } else if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Display help for the specified topic or main help
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        match self.help_topic {
            Some(ref topic) => help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                    topic,
                    HelpSystem::TOPICS.join(", "),
                    help_system.display_main_help(use_colors)
                )
            }),
            None => help_system.display_main_help(use_colors),
        }
    }
}

fn parse_operation(s: &str) -> Result<SuiteOperation, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

/// Parse a millisecond timeout in 1..=600000
fn parse_timeout_ms(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|ms| {
            if ms == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if ms > 600_000 {
                Err("Timeout cannot exceed 600000 ms".to_string())
            } else {
                Ok(ms)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

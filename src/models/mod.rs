//! Data models for the cache latency benchmark

pub mod config;
pub mod metrics;

pub use config::Config;
pub use metrics::{CellOutcome, CellResult, FailureRecord, LatencySample, LatencyStats, RunReport};

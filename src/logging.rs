//! Structured logging for the cache latency benchmark
//!
//! This module provides:
//! - Leveled, structured log entries with a builder API
//! - Console and JSON output formats
//! - Session and correlation IDs tying cell events together
//! - Specialised loggers for benchmark cells and line connections
//!
//! Every entry goes to stderr so that reports written to stdout stay
//! machine-readable.

use crate::error::{AppError, Result};
use crate::models::{CellResult, Config, LatencyStats, RunReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Connects, faults and per-iteration detail
    Debug,
    /// Cell and run progress
    Info,
    /// Failed iterations, faulted connections
    Warn,
    /// Failed cells
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
    /// Source location, attached by the logging macros
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
}

/// Where formatted entries are written
#[derive(Debug, Clone)]
pub enum LogSink {
    Stderr,
    /// Collects formatted lines in memory
    Memory(Arc<Mutex<Vec<String>>>),
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger with leveled, structured output
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    sink: LogSink,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name,
            sink: LogSink::Stderr,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger whose level and format follow the verbosity flags
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            sink: LogSink::Stderr,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn set_sink(&mut self, sink: LogSink) {
        self.sink = sink;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add a field to every subsequent entry
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
        };

        match &self.sink {
            LogSink::Stderr => {
                let _ = writeln!(io::stderr(), "{}", output);
            }
            LogSink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(output);
                }
            }
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => serde_json::json!({
                "error": "Failed to serialize log entry",
                "message": entry.message,
            })
            .to_string(),
        }
    }

}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach min/avg/max latency fields
    pub fn latency(self, stats: &LatencyStats) -> Self {
        self.field("min_ms", stats.min_ms)
            .field("avg_ms", stats.avg_ms)
            .field("max_ms", stats.max_ms)
            .field("sample_count", stats.sample_count)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error", error.to_string())
            .field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for benchmark cell lifecycle events
pub struct BenchmarkLogger {
    logger: Logger,
}

impl BenchmarkLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("BENCH".to_string(), config),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Announce a cell; the returned ID correlates its later events
    pub async fn log_cell_start(&self, backend: &str, operation: &str, mode: &str, iterations: usize) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.logger
            .info(&format!("Starting {} {} x{} ({})", backend, operation, iterations, mode))
            .correlation_id(&correlation_id)
            .field("backend", backend)
            .field("operation", operation)
            .field("mode", mode)
            .field("iterations", iterations)
            .log()
            .await;
        correlation_id
    }

    pub async fn log_cell_complete(&self, cell: &CellResult, correlation_id: &str) {
        let mut builder = self
            .logger
            .info(&format!(
                "Completed {} {}: {} samples, {} failures in {:.1}ms",
                cell.backend,
                cell.operation,
                cell.samples.len(),
                cell.failures.len(),
                cell.wall_time_ms
            ))
            .correlation_id(correlation_id)
            .field("backend", &cell.backend)
            .field("operation", cell.operation.as_str())
            .field("failures", cell.failures.len())
            .field("wall_time_ms", cell.wall_time_ms);
        if let Some(stats) = &cell.stats {
            builder = builder.latency(stats);
        }
        builder.log().await;
    }

    pub async fn log_cell_failed(&self, backend: &str, operation: &str, error: &AppError, correlation_id: &str) {
        self.logger
            .error(&format!("{} {} failed: {}", backend, operation, error))
            .correlation_id(correlation_id)
            .field("backend", backend)
            .field("operation", operation)
            .error_info(error)
            .log()
            .await;
    }

    /// One iteration that produced no sample (or needed a retry)
    pub async fn log_iteration_failure(
        &self,
        backend: &str,
        index: usize,
        error: &AppError,
        retried: bool,
        correlation_id: &str,
    ) {
        let level = if retried { LogLevel::Debug } else { LogLevel::Warn };
        self.logger
            .log(level, &format!("{} iteration {} failed: {}", backend, index, error))
            .correlation_id(correlation_id)
            .field("backend", backend)
            .field("index", index)
            .field("retried", retried)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_run_summary(&self, report: &RunReport) {
        self.logger
            .info(&format!(
                "Run finished: {} cells, {} failed, {:.1}ms total",
                report.cells.len(),
                report.failed_cells().len(),
                report.total_duration_ms
            ))
            .field("cells", report.cells.len())
            .field("failed_cells", report.failed_cells().len())
            .field("total_duration_ms", report.total_duration_ms)
            .log()
            .await;
    }
}

/// Logger for line connection lifecycle events
pub struct ConnectionLogger {
    logger: Logger,
}

impl ConnectionLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("CONN".to_string(), config),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub async fn log_connect(&self, target: &str, success: bool, duration_ms: f64, error: Option<&AppError>) {
        let level = if success { LogLevel::Debug } else { LogLevel::Warn };
        let message = match error {
            Some(err) => format!("Failed to connect to {}: {}", target, err),
            None => format!("Connected to {} in {:.2}ms", target, duration_ms),
        };

        let mut builder = self
            .logger
            .log(level, &message)
            .field("target", target)
            .field("success", success)
            .field("duration_ms", duration_ms);
        if let Some(err) = error {
            builder = builder.error_info(err);
        }
        builder.log().await;
    }

    /// A replacement connection was opened after an earlier one was discarded
    pub async fn log_reconnect(&self, target: &str, connects: u64) {
        self.logger
            .info(&format!("Reconnected to {}", target))
            .field("target", target)
            .field("connects", connects)
            .log()
            .await;
    }

    /// The connection was discarded; the next call reconnects
    pub async fn log_fault(&self, target: &str, error: &AppError) {
        self.logger
            .warn(&format!("Connection to {} faulted: {}", target, error))
            .field("target", target)
            .error_info(error)
            .log()
            .await;
    }
}

/// Logger for errors surfaced to the user
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };

        let mut builder = self.logger.error(&message).error_info(error);
        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }
        builder.log().await;
    }
}

/// Creates loggers sharing one session ID
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_benchmark_logger(&self) -> BenchmarkLogger {
        BenchmarkLogger::from_logger(self.create_logger("BENCH").await)
    }

    pub async fn create_connection_logger(&self) -> ConnectionLogger {
        ConnectionLogger::from_logger(self.create_logger("CONN").await)
    }

    pub fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::new(&self.config)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Log at debug level with the call site attached
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

/// Log at info level with the call site attached
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

/// Log at warn level with the call site attached
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

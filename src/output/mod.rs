//! Output formatting and display system
//!
//! Renders a [`RunReport`] either as terminal tables (plain or colored) or as
//! a JSON object for scripts.

mod colored;
mod formatter;
mod json;

pub use colored::{band_color, ColorScheme, ColoredFormatter};
pub use formatter::{
    format_ms, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat,
};
pub use json::JsonFormatter;

use crate::{
    error::Result,
    models::{Config, RunReport},
    stats::StatisticsEngine,
    types::OutputFormat,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Plain text formatter for scripts and logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    format: OutputFormat,
    json: JsonFormatter,
}

impl OutputCoordinator {
    /// Table output through the given formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self {
            formatter,
            format: OutputFormat::Table,
            json: JsonFormatter::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            formatter: OutputFormatterFactory::create_formatter(config.enable_color, config.verbose),
            format: config.output_format,
            json: JsonFormatter::default(),
        }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    /// Render the whole report
    pub fn display_results(&self, report: &RunReport) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.json.format_report(report);
        }

        let mut sections = vec![
            self.formatter.format_header("Cache Latency Benchmark Results")?,
            self.formatter.format_run_summary(report)?,
            self.formatter.format_results_table(report)?,
        ];

        let failures = self.formatter.format_failures(report)?;
        if !failures.is_empty() {
            sections.push(failures);
        }

        // No completed cells means nothing to compare
        if let Ok(analysis) = StatisticsEngine::from_report(report).analyze() {
            let comparison = self.formatter.format_comparison(&analysis)?;
            if !comparison.is_empty() {
                sections.push(comparison);
            }
        }

        Ok(sections.join("\n\n"))
    }
}

//! Colored formatter with latency band highlighting
//!
//! Layout is identical to [`PlainFormatter`]; cells are padded first and
//! colored afterwards so ANSI codes never disturb column widths.

use super::formatter::{
    failure_lines, format_ms, results_rows, results_table_format, FormattingOptions, OutputFormatter, PlainFormatter,
    FAILURES_COLUMN, FIRST_LATENCY_COLUMN,
};
use crate::{
    error::{AppError, Result},
    models::RunReport,
    stats::RunAnalysis,
    types::LatencyBand,
};
use colored::*;
use std::fmt::Write as _;

/// Color used for a latency band
pub fn band_color(band: LatencyBand) -> Color {
    match band {
        LatencyBand::Fast => Color::Green,
        LatencyBand::Moderate => Color::Yellow,
        LatencyBand::Slow => Color::Red,
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            highlight: Color::Magenta,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn emphasize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color).bold()
        } else {
            text.normal()
        }
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format colored output: {}", e))
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "=".repeat(title.len() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.emphasize(title, self.color_scheme.header),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_run_summary(&self, report: &RunReport) -> Result<String> {
        let samples: usize = report.completed().map(|c| c.samples.len()).sum();
        let excluded: usize = report.completed().map(|c| c.excluded_count()).sum();
        let failed = report.failed_cells().len();

        let failed_text = format!("{} failed", failed);
        let failed_text = if failed > 0 {
            self.colorize(&failed_text, self.color_scheme.error)
        } else {
            self.colorize(&failed_text, self.color_scheme.muted)
        };
        let excluded_text = if excluded > 0 {
            self.colorize(&excluded.to_string(), self.color_scheme.warning)
        } else {
            self.colorize(&excluded.to_string(), self.color_scheme.success)
        };

        let mut output = String::new();
        writeln!(output, "{}", self.emphasize("Run Summary:", self.color_scheme.header)).map_err(fmt_err)?;
        writeln!(
            output,
            "Total Duration:   {}",
            self.colorize(&format_ms(report.total_duration_ms), self.color_scheme.info)
        )
        .map_err(fmt_err)?;
        writeln!(output, "Cells:            {} ({})", report.cells.len(), failed_text).map_err(fmt_err)?;
        writeln!(output, "Samples:          {}", samples).map_err(fmt_err)?;
        write!(output, "Excluded Calls:   {}", excluded_text).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_results_table(&self, report: &RunReport) -> Result<String> {
        if report.cells.is_empty() {
            return Ok(self
                .colorize("No benchmark results available.", self.color_scheme.warning)
                .to_string());
        }

        let rows = results_rows(report);
        let data: Vec<_> = rows.iter().map(|(row, _)| row.clone()).collect();
        let format = results_table_format(self.options.table_borders);

        Ok(self.plain_formatter.render_table(&format, &data, |col, row, text| {
            let Some(cell) = rows[row].1 else {
                return self.colorize(text, self.color_scheme.error).to_string();
            };
            match col {
                0 => self.colorize(text, self.color_scheme.highlight).to_string(),
                FAILURES_COLUMN if cell.excluded_count() > 0 => {
                    self.colorize(text, self.color_scheme.warning).to_string()
                }
                c if c >= FIRST_LATENCY_COLUMN => {
                    let Some(stats) = cell.stats else { return text.to_string() };
                    let ms = match c - FIRST_LATENCY_COLUMN {
                        0 => stats.min_ms,
                        1 => stats.avg_ms,
                        _ => stats.max_ms,
                    };
                    self.colorize(text, band_color(LatencyBand::from_ms(ms))).to_string()
                }
                _ => text.to_string(),
            }
        }))
    }

    fn format_failures(&self, report: &RunReport) -> Result<String> {
        let lines = failure_lines(report, self.options.verbose_mode);
        if lines.is_empty() {
            return Ok(String::new());
        }
        let mut output = self.emphasize("Failures:", self.color_scheme.error).to_string();
        for line in lines {
            write!(output, "\n  {}", self.colorize(&line, self.color_scheme.warning)).map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_comparison(&self, analysis: &RunAnalysis) -> Result<String> {
        let mut output = String::new();
        for comparison in &analysis.comparisons {
            let Some(fastest) = comparison.fastest() else { continue };
            if !output.is_empty() {
                output.push('\n');
            }
            write!(
                output,
                "Fastest {}: {} ({} avg)",
                comparison.operation,
                self.emphasize(&fastest.backend, self.color_scheme.success),
                self.colorize(&format_ms(fastest.avg_ms), band_color(LatencyBand::from_ms(fastest.avg_ms)))
            )
            .map_err(fmt_err)?;
            for other in comparison.rankings.iter().skip(1) {
                let factor = format!("{:.2}x", other.relative_to_fastest);
                write!(
                    output,
                    "\n  {} is {} slower",
                    other.backend,
                    self.colorize(&factor, self.color_scheme.muted)
                )
                .map_err(fmt_err)?;
            }
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("ERROR:", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("WARNING:", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("SUCCESS:", self.color_scheme.success), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::test_reports::mixed_report;

    fn options(enable_color: bool) -> FormattingOptions {
        FormattingOptions {
            enable_color,
            verbose_mode: false,
            table_borders: true,
        }
    }

    #[test]
    fn test_band_colors() {
        assert_eq!(band_color(LatencyBand::from_ms(0.4)), Color::Green);
        assert_eq!(band_color(LatencyBand::from_ms(4.0)), Color::Yellow);
        assert_eq!(band_color(LatencyBand::from_ms(40.0)), Color::Red);
    }

    #[test]
    fn test_disabled_color_matches_plain_table() {
        let report = mixed_report();
        let colored = ColoredFormatter::new(options(false)).format_results_table(&report).unwrap();
        let plain = PlainFormatter::new(options(false)).format_results_table(&report).unwrap();
        assert_eq!(colored, plain);
    }

    #[test]
    fn test_colored_table_keeps_layout() {
        colored::control::set_override(true);
        let report = mixed_report();
        let table = ColoredFormatter::new(options(true)).format_results_table(&report).unwrap();
        assert!(table.contains("\u{1b}["));
        assert_eq!(table.lines().count(), 7);
        assert!(table.contains("LineTcp"));
    }

    #[test]
    fn test_status_messages_keep_text() {
        let formatter = ColoredFormatter::new(options(false));
        assert_eq!(formatter.format_error("boom").unwrap(), "ERROR: boom");
        assert!(formatter.format_warning("careful").unwrap().ends_with("careful"));
    }
}

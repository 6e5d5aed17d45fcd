//! Core formatting traits and the plain text implementation

use crate::{
    error::{AppError, Result},
    models::{CellOutcome, CellResult, RunReport},
    stats::RunAnalysis,
};
use std::fmt::Write as _;

/// Renders a run report as terminal text
pub trait OutputFormatter {
    fn format_header(&self, title: &str) -> Result<String>;

    /// Totals for the run: cells, samples, failures, wall time
    fn format_run_summary(&self, report: &RunReport) -> Result<String>;

    /// One row per completed cell
    fn format_results_table(&self, report: &RunReport) -> Result<String>;

    /// Failed cells and per-cell failure categories
    fn format_failures(&self, report: &RunReport) -> Result<String>;

    /// Fastest backend per operation and how the others compare
    fn format_comparison(&self, analysis: &RunAnalysis) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Show individual failure records, not just counts
    pub verbose_mode: bool,
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Index of the first latency column in [`results_table_format`]
pub(crate) const FIRST_LATENCY_COLUMN: usize = 5;
pub(crate) const FAILURES_COLUMN: usize = 4;

/// Columns of the results table
pub(crate) fn results_table_format(show_borders: bool) -> TableFormat {
    TableFormat {
        columns: vec![
            Column::new("Backend", Alignment::Left, 8, 24),
            Column::new("Operation", Alignment::Left, 9, 9),
            Column::new("Mode", Alignment::Left, 10, 16),
            Column::new("Samples", Alignment::Right, 7, 10),
            Column::new("Failures", Alignment::Right, 8, 10),
            Column::new("Min", Alignment::Right, 10, 14),
            Column::new("Avg", Alignment::Right, 10, 14),
            Column::new("Max", Alignment::Right, 10, 14),
        ],
        show_borders,
    }
}

/// Table rows for the completed cells, in run order
pub(crate) fn results_rows(report: &RunReport) -> Vec<(RowData, Option<&CellResult>)> {
    report
        .cells
        .iter()
        .map(|outcome| match outcome.result {
            Ok(ref cell) => {
                let (min, avg, max) = match cell.stats {
                    Some(ref s) => (format_ms(s.min_ms), format_ms(s.avg_ms), format_ms(s.max_ms)),
                    None => ("N/A".to_string(), "N/A".to_string(), "N/A".to_string()),
                };
                (
                    vec![
                        cell.backend.clone(),
                        cell.operation.to_string(),
                        cell.mode.to_string(),
                        cell.samples.len().to_string(),
                        cell.excluded_count().to_string(),
                        min,
                        avg,
                        max,
                    ],
                    Some(cell),
                )
            }
            Err(ref e) => (
                vec![
                    outcome.backend.clone(),
                    outcome.operation.to_string(),
                    outcome.mode.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    e.category().to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ],
                None,
            ),
        })
        .collect()
}

/// Latency in milliseconds with microsecond precision
pub fn format_ms(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.3}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Render a table; `paint` may decorate each padded cell (column, row, text)
    pub(crate) fn render_table<F>(&self, format: &TableFormat, rows: &[RowData], paint: F) -> String
    where
        F: Fn(usize, usize, &str) -> String,
    {
        if rows.is_empty() {
            return String::new();
        }

        let widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&widths));
            output.push('\n');
        }
        let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
        output.push_str(&self.create_row(&headers, &widths, format, |_, text| text.to_string()));
        output.push('\n');
        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&widths));
            output.push('\n');
        }

        for (row_idx, row) in rows.iter().enumerate() {
            output.push_str(&self.create_row(row, &widths, format, |col, text| paint(col, row_idx, text)));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&widths));
        }

        output
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        format
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let content = rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                content.max(column.min_width).max(column.header.len()).min(column.max_width)
            })
            .collect()
    }

    fn create_row<F>(&self, data: &[String], widths: &[usize], format: &TableFormat, paint: F) -> String
    where
        F: Fn(usize, &str) -> String,
    {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map(|c| &c.alignment).unwrap_or(&Alignment::Left);
            let padded = align_text(cell, width, alignment);
            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&paint(idx, &padded));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

/// Align text within `width` characters, truncating if needed
fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

/// Lines describing failures, shared by the plain and colored formatters
pub(crate) fn failure_lines(report: &RunReport, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for outcome in &report.cells {
        match outcome.result {
            Err(ref e) => lines.push(format!("{} {}: cell failed: {}", outcome.backend, outcome.operation, e)),
            Ok(ref cell) if !cell.failures.is_empty() => {
                lines.push(cell_failure_line(outcome, cell));
                if verbose {
                    for failure in &cell.failures {
                        lines.push(format!(
                            "    #{} {}{}: {}",
                            failure.index,
                            failure.category,
                            if failure.retried { " (retried)" } else { "" },
                            failure.message
                        ));
                    }
                }
            }
            Ok(_) => {}
        }
    }

    lines
}

fn cell_failure_line(outcome: &CellOutcome, cell: &CellResult) -> String {
    let mut categories: Vec<(&str, usize)> = Vec::new();
    for failure in &cell.failures {
        match categories.iter_mut().find(|(c, _)| *c == failure.category) {
            Some((_, count)) => *count += 1,
            None => categories.push((failure.category.as_str(), 1)),
        }
    }
    let breakdown: Vec<String> = categories.iter().map(|(c, n)| format!("{} x{}", c, n)).collect();
    format!(
        "{} {}: {} excluded, {} retried ({})",
        outcome.backend,
        outcome.operation,
        cell.excluded_count(),
        cell.retried_count(),
        breakdown.join(", ")
    )
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);
        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_run_summary(&self, report: &RunReport) -> Result<String> {
        let samples: usize = report.completed().map(|c| c.samples.len()).sum();
        let failures: usize = report.completed().map(|c| c.excluded_count()).sum();

        let mut output = String::new();
        writeln!(output, "Run Summary:").map_err(fmt_err)?;
        writeln!(output, "------------").map_err(fmt_err)?;
        writeln!(output, "Total Duration:   {}", format_ms(report.total_duration_ms)).map_err(fmt_err)?;
        writeln!(output, "Cells:            {} ({} failed)", report.cells.len(), report.failed_cells().len())
            .map_err(fmt_err)?;
        writeln!(output, "Samples:          {}", samples).map_err(fmt_err)?;
        write!(output, "Excluded Calls:   {}", failures).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_results_table(&self, report: &RunReport) -> Result<String> {
        if report.cells.is_empty() {
            return Ok("No benchmark results available.".to_string());
        }
        let rows: Vec<RowData> = results_rows(report).into_iter().map(|(row, _)| row).collect();
        Ok(self.render_table(&results_table_format(self.options.table_borders), &rows, |_, _, text| {
            text.to_string()
        }))
    }

    fn format_failures(&self, report: &RunReport) -> Result<String> {
        let lines = failure_lines(report, self.options.verbose_mode);
        if lines.is_empty() {
            return Ok(String::new());
        }
        let mut output = String::from("Failures:\n---------");
        for line in lines {
            write!(output, "\n  {}", line).map_err(fmt_err)?;
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
                fastest.backend,
                format_ms(fastest.avg_ms)
            )
            .map_err(fmt_err)?;
            for other in comparison.rankings.iter().skip(1) {
                write!(output, "\n  {} is {:.2}x slower", other.backend, other.relative_to_fastest).map_err(fmt_err)?;
            }
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

//! Output formatting utilities

use crate::error::{CliError, CliResult};
use colored::*;
use extforge_types::RunReport;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with a failure table
    #[default]
    Text,
    /// The full report as JSON
    Json,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Diagnostic")]
    diagnostic: String,
}

/// Render the human-readable summary.
pub fn render_text(report: &RunReport, output_root: &Path) -> String {
    let mut text = String::new();

    let status = if report.failed() {
        "✗".red().to_string()
    } else {
        "✓".green().to_string()
    };
    text.push_str(&format!(
        "{status} {} attempted, {} succeeded, {} failed",
        report.attempted,
        report.succeeded().to_string().green(),
        report.failed_count().to_string().red()
    ));
    if let Some(ms) = report.elapsed_ms() {
        text.push_str(&format!(" {}", format!("({ms} ms)").dimmed()));
    }
    text.push('\n');

    text.push_str(&format!(
        "  {} {} artifacts in {}\n",
        "→".blue(),
        report.placed.len(),
        output_root.display()
    ));
    if !report.resources.is_empty() {
        text.push_str(&format!("  {} {} resources copied\n", "→".blue(), report.resources.len()));
    }

    if report.failed() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                unit: f.relative_path.clone(),
                stage: f.stage.to_string(),
                diagnostic: f.diagnostics.lines().next().unwrap_or_default().to_string(),
            })
            .collect();
        text.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        text.push('\n');
    }
    text
}

/// Print the report in the requested format on stdout.
pub fn print_report(report: &RunReport, format: OutputFormat, output_root: &Path) -> CliResult<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(report, output_root)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Write the report as JSON to `path`.
pub fn write_report_file(report: &RunReport, path: &Path) -> CliResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|source| CliError::Report {
        path: path.to_path_buf(),
        source,
    })
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

//! Table and JSON output for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use fileforge_core::types::Category;
use fileforge_worker::BatchReport;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One line of the conversion summary.
#[derive(Debug, Serialize, Tabled)]
pub struct FileRow {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Output")]
    pub output: String,
    #[tabled(rename = "Size")]
    pub size: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

/// One line of the format table.
#[derive(Debug, Serialize, Tabled)]
pub struct FormatRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Output formats")]
    pub formats: String,
}

/// Summary rows for a batch: converted files first, then failures.
/// `written` holds the path each converted file was saved to, parallel to
/// `report.converted`.
pub fn file_rows(report: &BatchReport, written: &[String]) -> Vec<FileRow> {
    let converted = report
        .converted
        .iter()
        .zip(written)
        .map(|(converted, path)| FileRow {
            file: converted.file_name.clone(),
            status: "completed".to_string(),
            output: path.clone(),
            size: human_size(converted.blob.len()),
            error: String::new(),
        });
    let failed = report.failed.iter().map(|failed| FileRow {
        file: failed.file_name.clone(),
        status: "error".to_string(),
        output: String::new(),
        size: String::new(),
        error: failed.error.to_string(),
    });
    converted.chain(failed).collect()
}

pub fn format_rows() -> Vec<FormatRow> {
    Category::ALL
        .iter()
        .map(|category| FormatRow {
            category: category.to_string(),
            formats: category.output_formats().join(", "),
        })
        .collect()
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

//! Report rendering.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::report::{FailureKind, RunReport};

const REPORT_SCHEMA_VERSION: &str = "imgreap.report.v1";

const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with tables.
    #[default]
    Text,
    /// JSON document.
    Json,
}

/// Formats a byte count with binary unit suffixes, e.g. `1.50 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Outcome")]
    outcome: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Cause")]
    cause: String,
}

/// Human-readable summary of `report`.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    let heading = if report.dry_run {
        format!("Cleanup of {} (dry run, nothing was removed)", report.repositories.join(", "))
    } else {
        format!("Cleanup of {}", report.repositories.join(", "))
    };
    out.push_str(&format!("{}\n", heading.bold()));

    let (untagged, deleted) = if report.dry_run {
        ("Would untag", "Would delete")
    } else {
        ("Untagged", "Deleted")
    };
    let mut rows = vec![
        CountRow { outcome: "Kept", count: report.kept },
        CountRow { outcome: untagged, count: report.untagged },
        CountRow { outcome: "Tags removed", count: report.tags_removed },
        CountRow { outcome: deleted, count: report.deleted },
    ];
    if !report.dry_run {
        rows.push(CountRow { outcome: "Skipped (in use)", count: report.skipped_in_use });
        rows.push(CountRow { outcome: "Already removed", count: report.already_removed });
        rows.push(CountRow { outcome: "Failed", count: report.failed });
    }
    out.push_str(&Table::new(rows).to_string());
    out.push('\n');

    if !report.failures.is_empty() {
        out.push_str(&format!("\n{}\n", "Failures".red().bold()));
        let rows = report.failures.iter().map(|failure| FailureRow {
            action: match failure.kind {
                FailureKind::TagRemovalFailed => "untag",
                FailureKind::DeletionFailed => "delete",
            },
            image: failure.image_id.short().to_string(),
            tag: failure.reference.clone().unwrap_or_else(|| "-".to_string()),
            cause: failure.cause.clone(),
        });
        out.push_str(&Table::new(rows).to_string());
        out.push('\n');
    }

    let label = if report.dry_run {
        "Total space that would be saved:"
    } else {
        "Total space saved:"
    };
    out.push_str(&format!(
        "\n{} {}\n",
        label.green().bold(),
        format_bytes(report.reclaimed_bytes)
    ));
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    schema_version: &'static str,
    data: &'a RunReport,
}

/// JSON document for `report`, wrapped with a schema version marker.
pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Envelope {
        schema_version: REPORT_SCHEMA_VERSION,
        data: report,
    })
}

/// Print `report` to stdout in the specified format.
pub fn print_report(report: &RunReport, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Text => print!("{}", render_text(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
    }
    Ok(())
}

use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::io::{self, Write};

use crate::cli_args::FormatOutputOpts;
use docify_core::DigestReport;

/// Three-decimal size in binary units, e.g. `12.345 KiB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{:.3}", adjusted)
}

pub fn wants_structured(format_opts: &FormatOutputOpts) -> bool {
    format_opts
        .format
        .as_deref()
        .is_some_and(|f| !f.eq_ignore_ascii_case("text"))
}

pub fn print_structured<T: Serialize>(data: &T) -> Result<()> {
    let content =
        serde_json::to_string_pretty(data).context("Failed to serialize output to JSON")?;
    write_to_stdout(&content)
}

pub fn print_report_table(report: &DigestReport, estimated_tokens: Option<usize>) {
    println!();
    println!("{}", " Codebase Digest Summary ".green().bold().underline());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Metric").fg(Color::Green),
        Cell::new("Value").fg(Color::Green),
    ]);

    let rows: Vec<(&str, String)> = vec![
        ("Directories", report.directories.to_string()),
        ("Files", report.files.to_string()),
        ("Embedded", report.embedded.len().to_string()),
        (
            "Skipped (line budget)",
            report.skipped_over_budget.len().to_string(),
        ),
        (
            "Skipped (read errors)",
            report.skipped_unreadable.len().to_string(),
        ),
        (
            "Lines",
            format!("{}/{}", report.lines_consumed, report.max_lines),
        ),
        ("Output", report.output_path.display().to_string()),
        ("Size", format_file_size(report.output_bytes)),
        (
            "Est. Tokens",
            estimated_tokens.map_or_else(|| "n/a".to_string(), |t| t.to_string()),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).fg(Color::Cyan),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    if !report.skipped_over_budget.is_empty() {
        println!("\n{}", "Files left out by the line budget:".yellow());
        for skipped in &report.skipped_over_budget {
            println!(" - {} ({} lines)", skipped.path.cyan(), skipped.lines);
        }
    }
    println!();
}

fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

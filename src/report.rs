//! Plain-text and JSON renderings of a finished run.

use std::{fmt::Write as _, fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};

use crate::{ingest::RunSummary, schema::SchemaChange};

/// Renders rows as left-aligned columns separated by two spaces, with a
/// dashed rule under the header.
pub fn render_columns(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    for line in std::iter::once(&header_cells)
        .chain(std::iter::once(&rule))
        .chain(rows)
    {
        let mut rendered = String::new();
        for (idx, (cell, width)) in line.iter().zip(&widths).enumerate() {
            if idx > 0 {
                rendered.push_str("  ");
            }
            let _ = write!(rendered, "{cell:<width$}");
        }
        let _ = writeln!(output, "{}", rendered.trim_end());
    }
    output
}

fn describe_change(change: Option<&SchemaChange>) -> String {
    match change {
        None => String::new(),
        Some(SchemaChange::Create { columns }) => format!("created ({})", columns.len()),
        Some(SchemaChange::Extend { columns }) => format!("+{}", columns.join(", +")),
    }
}

pub fn render_summary(summary: &RunSummary) -> String {
    let rows = summary
        .files
        .iter()
        .map(|report| {
            let name = report
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| report.file.display().to_string());
            vec![
                name,
                if report.skipped {
                    "skipped".to_string()
                } else {
                    report.rows.to_string()
                },
                report.ragged_rows.to_string(),
                describe_change(report.schema_change.as_ref()),
            ]
        })
        .collect::<Vec<_>>();
    let mut output = render_columns(&["file", "rows", "ragged", "schema"], &rows);
    let _ = writeln!(
        output,
        "{} row(s) in '{}' across {} file(s); table has {} column(s)",
        summary.total_rows,
        summary.table,
        summary.files.len(),
        summary.columns.len()
    );
    output
}

pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Writing summary JSON to {path:?}"))
}

//! Rendering and export of field analysis results.

use std::{borrow::Cow, fmt::Write as _, io::Write, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    classify::{FieldAnalysis, RuleKind},
    io_utils,
};

pub const REPORT_HEADERS: [&str; 6] = [
    "SHEET",
    "FIELD_NAME",
    "RULE_TYPE",
    "SOURCE_FIELD",
    "LOGIC",
    "CONFIDENCE",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Json,
}

/// One line of the mapping draft.
pub fn report_row(sheet: &str, analysis: &FieldAnalysis) -> Vec<String> {
    vec![
        sheet.to_string(),
        analysis.target().to_string(),
        analysis.kind().to_string(),
        analysis.source_column().unwrap_or_default().to_string(),
        analysis.explanation().to_string(),
        format!("{:.1}%", analysis.confidence()),
    ]
}

/// Count of results per rule kind, in cascade order.
pub fn summarize(results: &[FieldAnalysis]) -> Vec<(RuleKind, usize)> {
    let counts = results.iter().counts_by(FieldAnalysis::kind);
    [
        RuleKind::Const,
        RuleKind::Direct,
        RuleKind::Logic,
        RuleKind::Dominant,
        RuleKind::Unknown,
    ]
    .into_iter()
    .filter_map(|kind| counts.get(&kind).map(|count| (kind, *count)))
    .collect()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    sheet: &'a str,
    fields: &'a [FieldAnalysis],
}

pub fn write_report(
    sheet: &str,
    results: &[FieldAnalysis],
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<()> {
    match format {
        ReportFormat::Table => {
            let headers = REPORT_HEADERS.map(str::to_string);
            let rows = results
                .iter()
                .map(|analysis| report_row(sheet, analysis))
                .collect::<Vec<_>>();
            let mut writer = io_utils::open_output(output)?;
            writer
                .write_all(render_table(&headers, &rows).as_bytes())
                .context("Writing report table")?;
            writer.flush().context("Flushing report table")?;
        }
        ReportFormat::Csv => {
            let mut writer = io_utils::open_csv_writer(output, io_utils::DEFAULT_CSV_DELIMITER)?;
            writer
                .write_record(REPORT_HEADERS)
                .context("Writing report headers")?;
            for analysis in results {
                writer
                    .write_record(report_row(sheet, analysis))
                    .with_context(|| format!("Writing report row for '{}'", analysis.target()))?;
            }
            writer.flush().context("Flushing report CSV")?;
        }
        ReportFormat::Json => {
            let report = JsonReport {
                generated_at: Utc::now().to_rfc3339(),
                sheet,
                fields: results,
            };
            let mut writer = io_utils::open_output(output)?;
            serde_json::to_writer_pretty(&mut writer, &report)
                .context("Serializing report JSON")?;
            writeln!(writer).context("Writing report JSON")?;
            writer.flush().context("Flushing report JSON")?;
        }
    }
    Ok(())
}

/// Left-aligned plain-text table with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let rule = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", layout_line(headers, &widths));
    let _ = writeln!(output, "{}", layout_line(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", layout_line(row, &widths));
    }
    output
}

fn layout_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", flatten(cell), width = *width))
        .join("  ");
    line.trim_end().to_string()
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

//! Port listing output: aligned table, JSON, CSV

use crate::graph::ports::{ALL_COLUMNS, DEFAULT_COLUMNS, WIDE_EXTRA_COLUMNS};
use crate::graph::PortRow;
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::io::Write;

/// Columns to show: an explicit `a,b,c` list wins over `--wide`
pub fn resolve_columns(columns: Option<&str>, wide: bool) -> Result<Vec<String>> {
    if let Some(list) = columns {
        let selected: Vec<String> = list
            .split(',')
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        if selected.is_empty() {
            bail!("--columns needs at least one column");
        }
        if let Some(unknown) = selected.iter().find(|c| !ALL_COLUMNS.contains(&c.as_str())) {
            bail!("Unknown column '{}'. Available: {}", unknown, ALL_COLUMNS.join(","));
        }
        return Ok(selected);
    }

    let mut selected: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    if wide {
        selected.extend(WIDE_EXTRA_COLUMNS.iter().map(|c| c.to_string()));
    }
    Ok(selected)
}

fn cell<'a>(row: &'a PortRow, column: &str) -> &'a str {
    row.column(column).unwrap_or_default()
}

/// Aligned plain-text table with an upper-case header and a dash rule
pub fn render_table(rows: &[PortRow], columns: &[String]) -> String {
    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            rows.iter()
                .map(|r| cell(r, c).chars().count())
                .fold(c.chars().count(), usize::max)
        })
        .collect();

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{:<width$}", text, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(columns.iter().map(|c| c.to_uppercase()).collect()));
    out.push(line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        out.push(line(columns.iter().map(|c| cell(row, c).to_string()).collect()));
    }
    out.join("\n")
}

/// JSON array of objects holding the selected columns, in column order
pub fn render_json(rows: &[PortRow], columns: &[String]) -> Result<String> {
    let records: Vec<Value> = rows
        .iter()
        .map(|row| {
            let map: Map<String, Value> = columns
                .iter()
                .map(|c| (c.clone(), Value::String(cell(row, c).to_string())))
                .collect();
            Value::Object(map)
        })
        .collect();
    serde_json::to_string_pretty(&records).context("Failed to serialize ports")
}

/// CSV with a header row of column names
pub fn write_csv<W: Write>(writer: W, rows: &[PortRow], columns: &[String]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns).context("Failed to write CSV header")?;
    for row in rows {
        csv.write_record(columns.iter().map(|c| cell(row, c)))
            .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

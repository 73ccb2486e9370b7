//! Output formatting for query results.
//!
//! Values are rendered according to their column's [`DisplayType`]: IPv4
//! and MAC integers become addresses, epoch seconds become UTC timestamps.
//! Results can be written as a table, CSV, or JSON lines.

use std::io::Write;

use chrono::DateTime;
use clap::ValueEnum;

use pcapql_core::format::{format_ipv4, format_mac_u64};

use crate::query::Value;
use crate::search::{DisplayType, QueryResult};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    Table,
    /// Comma-separated values
    Csv,
    /// JSON Lines (one JSON object per row)
    Json,
}

/// Formats query results for output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format the rows of `result` and write them to the given writer.
    pub fn write<W: Write>(&self, result: &QueryResult, writer: &mut W) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_table(result, writer),
            OutputFormat::Csv => self.write_csv(result, writer),
            OutputFormat::Json => self.write_json(result, writer),
        }
    }

    /// Match counts, time range and errors, for stderr.
    pub fn write_summary<W: Write>(result: &QueryResult, writer: &mut W) -> std::io::Result<()> {
        writeln!(
            writer,
            "matched {} of {} candidate packets, {} rows",
            result.matched_count,
            result.searched_count,
            result.rows.len()
        )?;
        if let (Some(min), Some(max)) = (result.min_ts, result.max_ts) {
            writeln!(
                writer,
                "time range {} .. {}",
                format_timestamp((min / 1_000_000) as i64),
                format_timestamp((max / 1_000_000) as i64)
            )?;
        }
        for error in &result.errors {
            writeln!(writer, "{error}")?;
        }
        Ok(())
    }

    /// Format a single cell value for its column type.
    pub fn format_value(value: &Value, display_type: DisplayType) -> String {
        match (display_type, value) {
            (_, Value::Null) => String::new(),
            (DisplayType::Ipv4, Value::Int(i)) => match u32::try_from(*i) {
                Ok(addr) => format_ipv4(addr),
                Err(_) => i.to_string(),
            },
            (DisplayType::Mac, Value::Int(i)) if *i >= 0 => format_mac_u64(*i as u64),
            (DisplayType::Timestamp, Value::Int(secs)) => format_timestamp(*secs),
            (_, other) => other.to_string(),
        }
    }

    fn write_table<W: Write>(&self, result: &QueryResult, writer: &mut W) -> std::io::Result<()> {
        use comfy_table::{Cell, Table};

        let mut table = Table::new();

        let headers: Vec<Cell> = result.columns.iter().map(|c| Cell::new(&c.name)).collect();
        table.set_header(headers);

        for row in &result.rows {
            let cells: Vec<Cell> = row
                .iter()
                .zip(&result.columns)
                .map(|(value, column)| Cell::new(Self::format_value(value, column.display_type)))
                .collect();
            table.add_row(cells);
        }

        writeln!(writer, "{table}")
    }

    fn write_csv<W: Write>(&self, result: &QueryResult, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", result.column_names().join(","))?;

        for row in &result.rows {
            let values: Vec<String> = row
                .iter()
                .zip(&result.columns)
                .map(|(value, column)| {
                    let value = Self::format_value(value, column.display_type);
                    // Escape commas and quotes
                    if value.contains(',') || value.contains('"') || value.contains('\n') {
                        format!("\"{}\"", value.replace('"', "\"\""))
                    } else {
                        value
                    }
                })
                .collect();
            writeln!(writer, "{}", values.join(","))?;
        }

        Ok(())
    }

    fn write_json<W: Write>(&self, result: &QueryResult, writer: &mut W) -> std::io::Result<()> {
        for row in &result.rows {
            let mut obj = serde_json::Map::new();
            for (value, column) in row.iter().zip(&result.columns) {
                let json_value = match (column.display_type, value) {
                    (_, Value::Null) => serde_json::Value::Null,
                    // Formatted addresses and times are always strings
                    (DisplayType::Ipv4 | DisplayType::Mac | DisplayType::Timestamp, v) => {
                        serde_json::Value::String(Self::format_value(v, column.display_type))
                    }
                    (_, Value::Int(i)) => serde_json::Value::Number((*i).into()),
                    (_, Value::Float(f)) => serde_json::json!(f),
                    (_, Value::Bool(b)) => serde_json::Value::Bool(*b),
                    (_, other) => serde_json::Value::String(other.to_string()),
                };
                obj.insert(column.name.clone(), json_value);
            }

            writeln!(writer, "{}", serde_json::Value::Object(obj))?;
        }

        Ok(())
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

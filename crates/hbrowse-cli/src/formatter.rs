//! Output formatting for scan results and schemas.
//!
//! Supports table, JSON, CSV, and raw output formats.

use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::json;

use hbrowse_client::{Row, ScanResult, SchemaDescriptor};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON output.
    Json,
    /// CSV output.
    Csv,
    /// Raw output (values separated by tabs).
    Raw,
}

impl OutputFormat {
    /// Parses a format name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            "raw" => Some(OutputFormat::Raw),
            _ => None,
        }
    }

    /// Returns the format name.
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Raw => "raw",
        }
    }
}

/// Header and cell text of a result: `rowkey` then one column per
/// `family:qualifier` label. Cells a row lacks are empty.
fn grid(result: &ScanResult) -> (Vec<String>, Vec<Vec<String>>) {
    let columns = result.columns();
    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("rowkey".to_string());
    header.extend(columns.iter().cloned());

    let rows = result
        .iter()
        .map(|row| {
            let mut values = Vec::with_capacity(header.len());
            values.push(row.rowkey.clone());
            values.extend(columns.iter().map(|label| cell_text(row, label)));
            values
        })
        .collect();
    (header, rows)
}

fn cell_text(row: &Row, label: &str) -> String {
    row.cells
        .values()
        .find(|cell| cell.column() == label)
        .map(|cell| cell.value.clone())
        .unwrap_or_default()
}

/// Formats a scan result according to the specified format.
pub fn format_result(result: &ScanResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let (header, rows) = grid(result);
            format_table(&header, &rows)
        }
        OutputFormat::Json => format_json(result),
        OutputFormat::Csv => {
            let (header, rows) = grid(result);
            format_csv(&header, &rows)
        }
        OutputFormat::Raw => {
            let (header, rows) = grid(result);
            format_raw(&header, &rows)
        }
    }
}

/// Formats table schemas: one line per table with its families.
pub fn format_schemas(schemas: &[SchemaDescriptor], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(schemas).unwrap_or_else(|_| "[]".to_string());
    }

    let header = vec!["table".to_string(), "families".to_string()];
    let rows: Vec<Vec<String>> = schemas
        .iter()
        .map(|schema| {
            vec![
                schema.table_name.clone(),
                schema.families.iter().cloned().collect::<Vec<_>>().join(","),
            ]
        })
        .collect();

    match format {
        OutputFormat::Csv => format_csv(&header, &rows),
        OutputFormat::Raw => format_raw(&header, &rows),
        _ => format_table(&header, &rows),
    }
}

/// Formats the families of one table.
pub fn format_families(schema: &SchemaDescriptor, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return json!({
            "table": schema.table_name,
            "families": schema.families,
        })
        .to_string();
    }

    let header = vec!["family".to_string()];
    let rows: Vec<Vec<String>> = schema.families.iter().map(|f| vec![f.clone()]).collect();
    match format {
        OutputFormat::Csv => format_csv(&header, &rows),
        OutputFormat::Raw => format_raw(&header, &rows),
        _ => format_table(&header, &rows),
    }
}

fn format_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    table.set_header(header.iter().map(Cell::new));
    for row in rows {
        table.add_row(row.iter().map(Cell::new));
    }

    table.to_string()
}

fn format_json(result: &ScanResult) -> String {
    serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
}

fn format_csv(header: &[String], rows: &[Vec<String>]) -> String {
    let mut output = String::new();

    let header: Vec<String> = header.iter().map(|c| escape_csv(c)).collect();
    output.push_str(&header.join(","));
    output.push('\n');

    for row in rows {
        let values: Vec<String> = row.iter().map(|v| escape_csv(v)).collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

/// Escapes a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_raw(header: &[String], rows: &[Vec<String>]) -> String {
    let mut output = String::new();

    output.push_str(&header.join("\t"));
    output.push('\n');

    for row in rows {
        output.push_str(&row.join("\t"));
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbrowse_client::store::{RawCell, RawRecord};
    use hbrowse_client::materialize;

    fn make_test_result() -> ScanResult {
        let mut result = ScanResult::empty("users");
        result.rows.push(materialize(&RawRecord::new(
            "user:1",
            vec![
                RawCell::new("info", "name", "Alice"),
                RawCell::new("info", "city", "Paris, FR"),
            ],
        )));
        result.rows.push(materialize(&RawRecord::new(
            "user:2",
            vec![RawCell::new("info", "name", "Bob")],
        )));
        result
    }

    #[test]
    fn test_format_table() {
        let output = format_result(&make_test_result(), OutputFormat::Table);
        assert!(output.contains("rowkey"));
        assert!(output.contains("info:name"));
        assert!(output.contains("Alice"));
        assert!(output.contains("Bob"));
    }

    #[test]
    fn test_format_json() {
        let output = format_result(&make_test_result(), OutputFormat::Json);

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["rowkey"], "user:1");
        assert_eq!(parsed[0]["cells"]["name"]["value"], "Alice");
    }

    #[test]
    fn test_format_csv_fills_missing_cells() {
        let output = format_result(&make_test_result(), OutputFormat::Csv);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "rowkey,info:name,info:city");
        assert_eq!(lines[1], "user:1,Alice,\"Paris, FR\"");
        assert_eq!(lines[2], "user:2,Bob,");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello,world"), "\"hello,world\"");
        assert_eq!(escape_csv("hello\"world"), "\"hello\"\"world\"");
    }

    #[test]
    fn test_format_raw() {
        let output = format_result(&make_test_result(), OutputFormat::Raw);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "rowkey\tinfo:name\tinfo:city");
        assert_eq!(lines[2], "user:2\tBob\t");
    }

    #[test]
    fn test_format_schemas() {
        let schemas = vec![SchemaDescriptor::new("users", ["stats", "info"])];
        let output = format_schemas(&schemas, OutputFormat::Csv);
        assert_eq!(output.lines().nth(1), Some("users,\"info,stats\""));

        let output = format_families(&schemas[0], OutputFormat::Raw);
        assert_eq!(output, "family\ninfo\nstats\n");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
        assert_eq!(OutputFormat::Csv.name(), "csv");
    }
}

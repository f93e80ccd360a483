// crates/relic-cli/src/output.rs
//
// Output formatting utilities for the Relic CLI.
// Supports table and JSON output modes.

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    Table,
    /// JSON output for machine consumption.
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        }
    }
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

/// Print `rows` as a table, or `raw` as JSON.
pub fn emit<T: Tabled, R: Serialize + ?Sized>(format: OutputFormat, rows: &[T], raw: &R) {
    match format {
        OutputFormat::Table => println!("{}", format_table(rows)),
        OutputFormat::Json => println!("{}", format_json(raw)),
    }
}

/// Fixed-precision float for table cells.
pub fn fmt_f64(v: f64) -> String {
    format!("{:.4}", v)
}

/// Shortened UUID for table cells.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled, Serialize)]
    struct Row {
        name: String,
        value: u32,
    }

    #[test]
    fn test_table_and_json_render_rows() {
        let rows = vec![Row {
            name: "giza".to_string(),
            value: 3,
        }];
        let table = format_table(&rows);
        assert!(table.contains("giza"));
        assert!(table.contains("value"));
        let json = format_json(&rows);
        assert!(json.contains("\"value\": 3"));
    }

    #[test]
    fn test_short_id_is_prefix() {
        let id = uuid::Uuid::now_v7();
        assert!(id.to_string().starts_with(&short_id(&id)));
        assert_eq!(short_id(&id).len(), 8);
    }
}

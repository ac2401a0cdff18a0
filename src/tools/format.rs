//! Text rendering of tabular results for the `query` and `explain` tools.

use crate::models::{ColumnMetadata, JsonRow};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query/explain results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// ASCII table format (like MySQL CLI)
    Table,
    /// Markdown table format
    Markdown,
}

/// Row counts shown under a rendered table.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub row_count: usize,
    pub total_rows: usize,
    pub execution_time_ms: Option<u64>,
}

impl Footer {
    pub fn new(row_count: usize, total_rows: usize) -> Self {
        Self {
            row_count,
            total_rows,
            execution_time_ms: None,
        }
    }

    pub fn with_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = Some(execution_time_ms);
        self
    }

    fn summary(&self) -> String {
        let noun = if self.row_count == 1 { "row" } else { "rows" };
        let mut text = format!("{} {} in set", self.row_count, noun);
        if self.total_rows > self.row_count {
            text.push_str(&format!(" (truncated from {})", self.total_rows));
        }
        if let Some(ms) = self.execution_time_ms {
            text.push_str(&format!(" ({:.2} sec)", ms as f64 / 1000.0));
        }
        text
    }
}

/// Render columns and rows in the requested text format.
///
/// Returns `None` for [`OutputFormat::Json`].
pub fn render(
    format: OutputFormat,
    columns: &[ColumnMetadata],
    rows: &[JsonRow],
    footer: Footer,
) -> Option<String> {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    match format {
        OutputFormat::Json => None,
        OutputFormat::Table => Some(format_as_table(&names, rows, footer)),
        OutputFormat::Markdown => Some(format_as_markdown(&names, rows, footer)),
    }
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

fn cell<'a>(row: &'a JsonRow, column: &str) -> &'a JsonValue {
    row.get(column).unwrap_or(&JsonValue::Null)
}

/// Pad to a display width; `{:<width$}` counts chars, not terminal columns.
fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

pub fn format_as_table(columns: &[&str], rows: &[JsonRow], footer: Footer) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            widths[i] = widths[i].max(format_value(cell(row, col)).width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = separator.clone();
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad(col, *w, false)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let line: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = cell(row, col);
                let numeric = matches!(value, JsonValue::Number(_));
                format!("| {} ", pad(&format_value(value), *w, numeric))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&separator);
    output.push_str(&footer.summary());
    output.push('\n');
    output
}

pub fn format_as_markdown(columns: &[&str], rows: &[JsonRow], footer: Footer) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output: String = columns
        .iter()
        .map(|c| format!("| {} ", c))
        .collect::<String>()
        + "|\n";
    output.push_str(&(columns.iter().map(|_| "|---").collect::<String>() + "|\n"));

    for row in rows {
        let line: String = columns
            .iter()
            .map(|col| format!("| {} ", format_value(cell(row, col)).replace('|', "\\|")))
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&format!("\n*{}*", footer.summary()));
    output
}

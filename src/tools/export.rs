//! CSV export of row arrays.
//!
//! Rows are flattened (`{"address": {"city": "NYC"}}` becomes the column
//! `address.city`), written with a UTF-8 byte-order mark and CRLF line
//! endings so spreadsheet applications open them correctly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::values::to_display_string;

use super::{failure, required_array, Parameter, ParameterKind, Tool, ToolError, EXPORT_EXCEL};

const BOM: char = '\u{feff}';
const DEFAULT_FILENAME: &str = "export.csv";

/// Write row arrays to a CSV file in the export directory.
pub struct ExportCsv {
    export_dir: PathBuf,
}

impl ExportCsv {
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }
}

struct ExportParams {
    data: Vec<Value>,
    filename: String,
    columns: Vec<String>,
}

impl ExportParams {
    fn parse(mut args: Map<String, Value>) -> Result<Self, ToolError> {
        let data = required_array(
            EXPORT_EXCEL,
            &mut args,
            "data",
            "Pass the data array from a previous tool result (e.g., from filter_data result.data or api_call result.data).",
        )?;
        if data.is_empty() {
            return Err(ToolError::EmptyData(EXPORT_EXCEL.to_string()));
        }

        let filename = match args.get("filename") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            _ => DEFAULT_FILENAME.to_string(),
        };

        let columns = match args.get("columns") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(columns)) => columns
                .iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => to_display_string(other),
                })
                .collect(),
            Some(_) => {
                return Err(ToolError::InvalidParameter {
                    tool: EXPORT_EXCEL.to_string(),
                    parameter: "columns".to_string(),
                    reason: "expected an array of column names".to_string(),
                })
            }
        };

        Ok(Self {
            data,
            filename,
            columns,
        })
    }
}

/// Flatten nested objects into dot-joined keys. Arrays are kept whole.
/// A row that is not an object becomes a single `value` column.
pub fn flatten_row(row: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match row {
        Value::Object(map) => flatten_into(map, "", &mut out),
        Value::Null => {}
        other => {
            out.insert("value".to_string(), other.clone());
        }
    }
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Map<String, Value>) {
    for (key, value) in map {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &full_key, out),
            other => {
                out.insert(full_key, other.clone());
            }
        }
    }
}

fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
        Some(other) => to_display_string(other),
    }
}

/// Render rows as CSV text, returning the content and the header used.
///
/// With no explicit `columns`, the header is the sorted union of every
/// row's flattened keys.
pub fn build_csv(rows: &[Value], columns: &[String]) -> (String, Vec<String>) {
    let flat: Vec<Map<String, Value>> = rows.iter().map(flatten_row).collect();

    let headers: Vec<String> = if columns.is_empty() {
        flat.iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        columns.to_vec()
    };

    let mut lines = Vec::with_capacity(flat.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape_cell(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &flat {
        lines.push(
            headers
                .iter()
                .map(|h| escape_cell(&cell_text(row.get(h))))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    let mut content = String::new();
    content.push(BOM);
    content.push_str(&lines.join("\r\n"));
    (content, headers)
}

/// Final on-disk name: directory parts and the extension are dropped and
/// `.csv` is appended (`reports/users.xlsx` becomes `users.csv`).
pub fn export_filename(requested: &str) -> String {
    let base = Path::new(requested.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => &base[..idx],
        _ => base.as_str(),
    };
    let stem = stem.trim();
    if stem.is_empty() {
        "export.csv".to_string()
    } else {
        format!("{}.csv", stem)
    }
}

#[async_trait]
impl Tool for ExportCsv {
    fn name(&self) -> &str {
        EXPORT_EXCEL
    }

    fn description(&self) -> &str {
        "Export an array of objects to a CSV file that opens in Excel. IMPORTANT: You must pass the 'data' array from a previous tool result (e.g., from filter_data result.data or api_call result.data)."
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new(
                "data",
                ParameterKind::Array(Box::new(ParameterKind::Object)),
                "REQUIRED: Array of objects to export. This should come from a previous tool call result (e.g., if filter_data returned {success: true, data: [...]}, use that data array here).",
            )
            .required(),
            Parameter::new(
                "filename",
                ParameterKind::String,
                "Output filename (e.g., 'users.xlsx' or 'data.csv')",
            )
            .required(),
            Parameter::new(
                "columns",
                ParameterKind::Array(Box::new(ParameterKind::String)),
                "Optional array of column names. If not provided, uses object keys.",
            ),
        ]
    }

    fn chained_parameter(&self) -> Option<&str> {
        Some("data")
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let params = ExportParams::parse(args)?;

        let (content, headers) = build_csv(&params.data, &params.columns);
        let saved_as = export_filename(&params.filename);
        let path = self.export_dir.join(&saved_as);

        if let Err(e) = tokio::fs::create_dir_all(&self.export_dir).await {
            return Ok(failure(format!(
                "Could not create export directory {}: {}",
                self.export_dir.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::write(&path, content.as_bytes()).await {
            return Ok(failure(format!("Could not write {}: {}", path.display(), e)));
        }

        tracing::info!(
            path = %path.display(),
            rows = params.data.len(),
            columns = headers.len(),
            "Export completed"
        );

        Ok(json!({
            "success": true,
            "filename": params.filename,
            "savedAs": saved_as,
            "path": path.display().to_string(),
            "rowCount": params.data.len(),
            "columnCount": headers.len(),
            "exportedAt": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header fragments that mark a column as name-like when the configured
/// identity column is missing or blank.
pub const NAME_MARKERS: [&str; 2] = ["Name", "Nombre"];

/// One application record. Column order follows the uploaded table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateRow(Map<String, Value>);

impl CandidateRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Text form of a cell, or `None` when it is missing, null or blank.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.0.get(column)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Resolves the label used in logs and for resume matching.
    ///
    /// `identity_column` is tried first, then every name-like column (see
    /// [`NAME_MARKERS`]) in column order; the first non-empty value wins. Rows
    /// with none of them are labelled `Row {index + 1}`.
    pub fn display_name(&self, identity_column: &str, index: usize) -> String {
        self.text(identity_column)
            .or_else(|| {
                self.0
                    .keys()
                    .filter(|column| is_name_like(column))
                    .find_map(|column| self.text(column))
            })
            .unwrap_or_else(|| positional_label(index))
    }
}

pub fn is_name_like(column: &str) -> bool {
    NAME_MARKERS.iter().any(|marker| column.contains(marker))
}

pub fn positional_label(index: usize) -> String {
    format!("Row {}", index + 1)
}

/// An in-memory table: ordered header plus rows keyed by that header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<CandidateRow>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<CandidateRow>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Serializes the rows as a JSON array of objects.
    pub fn to_records_json(&self) -> String {
        serde_json::to_string_pretty(&self.rows).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Interprets a raw cell the way a spreadsheet would: blank is null,
/// integers and finite floats become numbers, everything else stays text.
pub fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    Value::String(trimmed.to_string())
}

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Value};

use crate::ingest::TableError;
use crate::models::table::{CandidateRow, Table};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// True when the payload looks like an xlsx/xls workbook, by name or by magic bytes.
pub fn looks_like_spreadsheet(bytes: &[u8], file_name: Option<&str>) -> bool {
    let by_name = file_name
        .map(|n| n.to_ascii_lowercase())
        .is_some_and(|n| n.ends_with(".xlsx") || n.ends_with(".xls") || n.ends_with(".xlsm"));
    by_name || bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

/// Reads the first worksheet; the first row is the header.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Table, TableError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TableError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TableError::Spreadsheet("workbook has no worksheets".into()))?
        .map_err(|e| TableError::Spreadsheet(e.to_string()))?;

    let mut rows_iter = range.rows();
    let header = rows_iter.next().ok_or(TableError::Empty)?;
    let columns: Vec<String> = header
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        })
        .collect();

    if columns.iter().all(|c| c.is_empty()) {
        return Err(TableError::Empty);
    }

    let rows = rows_iter
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            let mut fields = Map::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                fields.insert(column.clone(), cell_value(cells.get(i)));
            }
            CandidateRow::new(fields)
        })
        .collect();

    Ok(Table::new(columns, rows))
}

fn cell_value(cell: Option<&Data>) -> Value {
    match cell {
        None | Some(Data::Empty) => Value::Null,
        Some(Data::Int(i)) => Value::from(*i),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Value::from(*f as i64),
        Some(Data::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Data::Bool(b)) => Value::Bool(*b),
        Some(Data::String(s)) if s.trim().is_empty() => Value::Null,
        Some(Data::String(s)) => Value::String(s.trim().to_string()),
        Some(other) => Value::String(other.to_string()),
    }
}

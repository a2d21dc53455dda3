use std::io::Read;

use serde_json::Map;

use crate::ingest::TableError;
use crate::models::table::{infer_cell, CandidateRow, Table};

/// Parses CSV into a [`Table`], inferring numbers and nulls per cell.
///
/// Short rows are padded with nulls; extra trailing cells are dropped.
pub fn parse_csv<R: Read>(reader: R) -> Result<Table, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if columns.iter().all(|c| c.is_empty()) {
        return Err(TableError::Empty);
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut fields = Map::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            fields.insert(column.clone(), infer_cell(record.get(i).unwrap_or("")));
        }
        rows.push(CandidateRow::new(fields));
    }

    Ok(Table::new(columns, rows))
}

// Upload and context-file decoding into `Table`s.
// CSV is the baseline format; spreadsheets are attempted first when detected
// and fall back to CSV when the workbook cannot be read.

pub mod csv_table;
pub mod spreadsheet;

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::table::Table;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet parse error: {0}")]
    Spreadsheet(String),

    #[error("invalid base64 data URL: {0}")]
    DataUrl(#[from] base64::DecodeError),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Unwraps a `data:<mime>;base64,<payload>` wrapper if the bytes carry one.
/// Anything else is returned unchanged.
pub fn decode_data_url(bytes: &[u8]) -> Result<Vec<u8>, TableError> {
    let head = trim_ascii_start(bytes);
    if !head.starts_with(b"data:") {
        return Ok(bytes.to_vec());
    }
    let marker = b";base64,";
    let Some(pos) = head.windows(marker.len()).position(|w| w == marker) else {
        return Ok(bytes.to_vec());
    };
    let payload: Vec<u8> = head[pos + marker.len()..]
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(payload)?)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Decodes an uploaded table: data-URL unwrap, then spreadsheet (if detected)
/// with CSV as the fallback.
pub fn parse_table_bytes(bytes: &[u8], file_name: Option<&str>) -> Result<Table, TableError> {
    if trim_ascii_start(bytes).is_empty() {
        return Err(TableError::Empty);
    }
    let decoded = decode_data_url(bytes)?;
    if decoded.is_empty() {
        return Err(TableError::Empty);
    }

    if spreadsheet::looks_like_spreadsheet(&decoded, file_name) {
        match spreadsheet::parse_spreadsheet(&decoded) {
            Ok(table) => {
                debug!("Parsed spreadsheet upload: {} rows", table.len());
                return Ok(table);
            }
            Err(e) => warn!("Spreadsheet parse failed ({e}); retrying as CSV"),
        }
    }

    csv_table::parse_csv(decoded.as_slice())
}

/// Reads a table from disk, using the file extension as the format hint.
pub fn load_table_file(path: &Path) -> Result<Table, TableError> {
    let bytes = std::fs::read(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path.file_name().and_then(|n| n.to_str());
    parse_table_bytes(&bytes, name)
}

//! Incremental CSV output for resumable batches.
//!
//! Every scored row is flattened (`parent_child` columns) and the whole file is
//! rewritten through a temp file in the same directory, so the artifact on disk
//! is always a complete table. One writer per path is assumed; nothing locks it.
//!
//! The first column, [`ROW_KEY_COLUMN`], holds the display name the scoring loop
//! resolved for the row, so a later run matches on exactly the same key.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::scoring::ScoredResult;
use crate::models::table::{infer_cell, CandidateRow};

pub const FLATTEN_SEPARATOR: &str = "_";
pub const ROW_KEY_COLUMN: &str = "row_key";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to replace output file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Identity values already present in a prior output artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedSet(HashSet<String>);

impl CompletedSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for CompletedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct IncrementalSink {
    path: PathBuf,
}

impl IncrementalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scans the artifact for rows that were already scored.
    ///
    /// Keys come from [`ROW_KEY_COLUMN`]. Artifacts written without it are keyed
    /// with [`CandidateRow::display_name`] over their rows, the same rule the
    /// scoring loop applies. A missing or unreadable file yields an empty set.
    pub fn completed_set(&self, identity_column: &str) -> CompletedSet {
        if !self.path.exists() {
            return CompletedSet::default();
        }
        match read_table(&self.path) {
            Ok((headers, rows)) => completed_from(&headers, &rows, identity_column),
            Err(e) => {
                warn!(
                    "Could not read prior output {}: {e}; starting from scratch",
                    self.path.display()
                );
                CompletedSet::default()
            }
        }
    }

    /// Appends one result under `key`, widening the header if the row brings
    /// new columns.
    pub fn append(&self, key: &str, result: &ScoredResult) -> Result<(), SinkError> {
        let (mut headers, mut rows) = if self.path.exists() {
            read_table(&self.path)?
        } else {
            (Vec::new(), Vec::new())
        };

        let mut flat = vec![(ROW_KEY_COLUMN.to_string(), key.to_string())];
        flat.extend(flatten_record(result.record()));
        for (column, _) in &flat {
            if !headers.contains(column) {
                headers.push(column.clone());
            }
        }
        let new_row = headers
            .iter()
            .map(|h| {
                flat.iter()
                    .find(|(c, _)| c == h)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            })
            .collect();
        rows.push(new_row);

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            writer.write_record(&headers)?;
            for row in &rows {
                let mut padded = row.clone();
                padded.resize(headers.len(), String::new());
                writer.write_record(&padded)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)?;

        debug!(
            "Persisted row {} to {} ({} columns)",
            rows.len(),
            self.path.display(),
            headers.len()
        );
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), SinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(File::open(path)?);
    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn completed_from(headers: &[String], rows: &[Vec<String>], identity_column: &str) -> CompletedSet {
    if let Some(i) = headers.iter().position(|h| h == ROW_KEY_COLUMN) {
        return rows
            .iter()
            .filter_map(|r| r.get(i))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }

    warn!("Prior output has no '{ROW_KEY_COLUMN}' column; re-deriving row names");
    rows.iter()
        .enumerate()
        .map(|(index, cells)| {
            let fields: Map<String, Value> = headers
                .iter()
                .zip(cells.iter())
                .map(|(h, v)| (h.clone(), infer_cell(v)))
                .collect();
            CandidateRow::new(fields).display_name(identity_column, index)
        })
        .collect()
}

/// Flattens nested objects into `parent_child` columns; arrays are stored as
/// JSON text and nulls as empty cells.
pub fn flatten_record(record: &Map<String, Value>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(record.len());
    for (key, value) in record {
        flatten_into(key.clone(), value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(format!("{prefix}{FLATTEN_SEPARATOR}{key}"), nested, out);
            }
        }
        Value::Null => out.push((prefix, String::new())),
        Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}

// Append-only analyst feedback log.
// Rows are arbitrary JSON objects; the first row written fixes the CSV header.

pub mod handlers;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feedback log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone)]
pub struct FeedbackLog {
    path: PathBuf,
    stamp_submitted_at: bool,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stamp_submitted_at: false,
        }
    }

    /// Adds a `submitted_at` column to entries that do not carry one.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.stamp_submitted_at = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry as a CSV row.
    ///
    /// A new log takes its header from this entry. Later entries are aligned to
    /// that header; keys it does not know are dropped with a warning.
    pub fn append(&self, entry: &Map<String, Value>) -> Result<(), FeedbackError> {
        let mut entry = entry.clone();
        if self.stamp_submitted_at {
            entry
                .entry(SUBMITTED_AT_COLUMN)
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }

        let existing_header = self.read_header()?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let header = match existing_header {
            Some(header) => header,
            None => {
                let header: Vec<String> = entry.keys().cloned().collect();
                writer.write_record(&header)?;
                header
            }
        };

        let dropped: Vec<&String> = entry.keys().filter(|k| !header.contains(k)).collect();
        if !dropped.is_empty() {
            warn!("Feedback keys not in log header were dropped: {dropped:?}");
        }

        let row: Vec<String> = header
            .iter()
            .map(|column| entry.get(column).map(cell_text).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
        writer.flush()?;

        info!("Feedback appended to {}", self.path.display());
        Ok(())
    }

    fn read_header(&self) -> Result<Option<Vec<String>>, FeedbackError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() == 0 {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_reader(file);
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        Ok(Some(header).filter(|h| !h.is_empty()))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

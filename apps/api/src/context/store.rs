use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::ingest::load_table_file;
use crate::models::table::Table;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    #[error("{0} context is not loaded")]
    Unavailable(&'static str),
}

/// File locations for the startup context load.
#[derive(Debug, Clone)]
pub struct ContextPaths {
    pub qualitative: PathBuf,
    pub quantitative: Option<PathBuf>,
    pub thesis: PathBuf,
}

/// Borrowed view of everything a scoring call needs.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioContext<'a> {
    pub qualitative: &'a Table,
    pub quantitative: Option<&'a Table>,
    pub thesis: &'a str,
}

/// Portfolio tables and thesis text, loaded once at startup.
///
/// There is no reload: a failed load is reported through the getters until
/// the process is restarted with the files in place.
#[derive(Debug, Default)]
pub struct ContextStore {
    qualitative: Option<Table>,
    quantitative: Option<Table>,
    thesis: Option<String>,
}

impl ContextStore {
    /// Loads every configured source. Individual failures are logged and leave
    /// that piece unavailable; they never abort startup.
    pub fn load(paths: &ContextPaths) -> Self {
        let qualitative = match load_table_file(&paths.qualitative) {
            Ok(table) => {
                info!(
                    "Historical portfolio loaded from {}: {} records",
                    paths.qualitative.display(),
                    table.len()
                );
                Some(table)
            }
            Err(e) => {
                error!("Failed to load historical portfolio: {e}");
                None
            }
        };

        let quantitative = paths.quantitative.as_ref().and_then(|path| {
            match load_table_file(path) {
                Ok(table) => {
                    info!(
                        "Quantitative portfolio loaded from {}: {} records",
                        path.display(),
                        table.len()
                    );
                    Some(table)
                }
                Err(e) => {
                    error!("Failed to load quantitative portfolio: {e}");
                    None
                }
            }
        });

        let thesis = match load_thesis(&paths.thesis) {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    "Investment thesis loaded from {}: {} characters",
                    paths.thesis.display(),
                    text.chars().count()
                );
                Some(text)
            }
            Ok(_) => {
                error!("Investment thesis at {} is empty", paths.thesis.display());
                None
            }
            Err(e) => {
                error!("Failed to load investment thesis: {e}");
                None
            }
        };

        Self {
            qualitative,
            quantitative,
            thesis,
        }
    }

    #[cfg(test)]
    pub fn from_parts(qualitative: Table, quantitative: Option<Table>, thesis: String) -> Self {
        Self {
            qualitative: Some(qualitative),
            quantitative,
            thesis: Some(thesis).filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn qualitative(&self) -> Result<&Table, ContextError> {
        self.qualitative
            .as_ref()
            .ok_or(ContextError::Unavailable("historical portfolio"))
    }

    pub fn quantitative(&self) -> Result<&Table, ContextError> {
        self.quantitative
            .as_ref()
            .ok_or(ContextError::Unavailable("quantitative portfolio"))
    }

    pub fn thesis(&self) -> Result<&str, ContextError> {
        self.thesis
            .as_deref()
            .ok_or(ContextError::Unavailable("investment thesis"))
    }

    /// Guard used before any row is processed. The quantitative table is optional.
    pub fn require(&self) -> Result<PortfolioContext<'_>, ContextError> {
        Ok(PortfolioContext {
            qualitative: self.qualitative()?,
            quantitative: self.quantitative().ok(),
            thesis: self.thesis()?,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.require().is_ok()
    }
}

fn load_thesis(path: &Path) -> anyhow::Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        pdf_extract::extract_text(path)
            .map_err(|e| anyhow::anyhow!("PDF text extraction failed: {e:?}"))
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Reads a thesis sent with a request: PDF (by extension or `%PDF` magic) or
/// plain text.
pub fn thesis_from_upload(bytes: &[u8], file_name: Option<&str>) -> anyhow::Result<String> {
    let is_pdf = bytes.starts_with(b"%PDF")
        || file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(".pdf"));
    if is_pdf {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| anyhow::anyhow!("PDF text extraction failed: {e:?}"))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::context::ContextPaths;
use crate::llm_client::DEFAULT_API_URL;
use crate::scoring::pacer::RequestPacer;

const DEFAULT_INTER_ROW_DELAY_MS: u64 = 6000;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_api_url: String,
    pub port: u16,
    pub rust_log: String,
    pub scoring_config_path: PathBuf,
    pub historical_portfolio_path: PathBuf,
    pub quantitative_portfolio_path: Option<PathBuf>,
    pub thesis_path: PathBuf,
    pub feedback_log_path: PathBuf,
    /// Stamps feedback rows with a `submitted_at` column.
    pub feedback_timestamp: bool,
    /// Enables resumable batch runs when set.
    pub incremental_output_path: Option<PathBuf>,
    /// Resumable output of `/api/score-historical-data`.
    pub historical_output_path: PathBuf,
    pub identity_column: String,
    pub inter_row_delay: Duration,
    pub llm_timeout: Duration,
    /// `["*"]` means any origin.
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let inter_row_delay = match optional_env("REQUESTS_PER_MINUTE") {
            Some(rpm) => RequestPacer::per_minute(
                rpm.parse::<u32>()
                    .context("REQUESTS_PER_MINUTE must be a positive integer")?,
            )
            .delay(),
            None => Duration::from_millis(parse_env("INTER_ROW_DELAY_MS", DEFAULT_INTER_ROW_DELAY_MS)?),
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_url: optional_env("ANTHROPIC_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scoring_config_path: path_env("SCORING_CONFIG_PATH", "scoring_config.json"),
            historical_portfolio_path: path_env("HISTORICAL_PORTFOLIO_PATH", "historical_data.csv"),
            quantitative_portfolio_path: optional_env("QUANTITATIVE_PORTFOLIO_PATH").map(PathBuf::from),
            thesis_path: path_env("THESIS_PATH", "proyecto_preprofesional.pdf"),
            feedback_log_path: path_env("FEEDBACK_LOG_PATH", "feedback_log.csv"),
            feedback_timestamp: parse_env("FEEDBACK_TIMESTAMP", false)?,
            incremental_output_path: optional_env("INCREMENTAL_OUTPUT_PATH").map(PathBuf::from),
            historical_output_path: path_env("HISTORICAL_OUTPUT_PATH", "scored_historical_data.csv"),
            identity_column: optional_env("IDENTITY_COLUMN")
                .unwrap_or_else(|| "Nombre de la startup".to_string()),
            inter_row_delay,
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?),
            allowed_origins: parse_origins(&optional_env("ALLOWED_ORIGINS").unwrap_or_else(|| "*".into())),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    pub fn context_paths(&self) -> ContextPaths {
        ContextPaths {
            qualitative: self.historical_portfolio_path.clone(),
            quantitative: self.quantitative_portfolio_path.clone(),
            thesis: self.thesis_path.clone(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn path_env(key: &str, default: &str) -> PathBuf {
    PathBuf::from(optional_env(key).unwrap_or_else(|| default.to_string()))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

//! Lenient extraction of the scoring JSON from raw model text.
//!
//! The model is asked for bare JSON but routinely wraps it in fences or prose.
//! We slice from the first `{` to the last `}` and strictly decode that span.
//! A stray brace pair inside narrative text can still yield a wrong object;
//! no bracket balancing is attempted.

use serde_json::Value;
use thiserror::Error;

use crate::models::scoring::LlmScoringResult;

#[derive(Debug, Error, PartialEq)]
pub enum ParseFailure {
    #[error("no JSON object found in model response")]
    NoObject,

    #[error("model response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("model JSON has an unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Returns the substring spanning the first `{` through the last `}`, if any.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn parse_scoring_response(text: &str) -> Result<LlmScoringResult, ParseFailure> {
    let span = extract_json_span(text).ok_or(ParseFailure::NoObject)?;
    let value: Value =
        serde_json::from_str(span).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseFailure::UnexpectedShape("top level is not an object".into()));
    }
    serde_json::from_value(value).map_err(|e| ParseFailure::UnexpectedShape(e.to_string()))
}

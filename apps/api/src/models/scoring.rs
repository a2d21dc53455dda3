use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::table::CandidateRow;

/// Sentinel written into every narrative field when a row could not be scored.
pub const ERROR_SENTINEL: &str = "Error";

pub const QUALITATIVE_FIELDS: [&str; 6] = [
    "project_thesis",
    "problem",
    "solution",
    "key_metrics",
    "founding_team",
    "market_and_competition",
];

pub const JUSTIFICATION_FIELDS: [&str; 4] = ["equipo", "tesis_utec", "oportunidad", "validacion"];

pub const FINAL_SCORE_FIELD: &str = "final_weighted_score";

/// Dimension → 0-100 rating as returned by the model.
///
/// Values are kept as raw JSON so a sloppy response (`"80"`, `null`) survives
/// the round trip into the output; [`DimensionalScores::get`] does the numeric read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionalScores(Map<String, Value>);

impl DimensionalScores {
    pub fn new(scores: Map<String, Value>) -> Self {
        Self(scores)
    }

    /// Numeric score for a dimension. `None` means missing, null or non-numeric;
    /// a literal zero is `Some(0.0)`.
    pub fn get(&self, dimension: &str) -> Option<f64> {
        match self.0.get(dimension)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

/// Structured model output for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmScoringResult {
    #[serde(default)]
    pub dimensional_scores: DimensionalScores,
    #[serde(default)]
    pub qualitative_analysis: Map<String, Value>,
    #[serde(default)]
    pub score_justification: Map<String, Value>,
    /// Any additional top-level keys the model chose to include.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LlmScoringResult {
    /// The placeholder used whenever the model call or its parsing fails:
    /// every configured dimension at zero, every narrative field set to `"Error"`.
    pub fn error_default<'a>(dimensions: impl IntoIterator<Item = &'a str>) -> Self {
        let scores = dimensions
            .into_iter()
            .map(|d| (d.to_string(), Value::from(0)))
            .collect();
        Self {
            dimensional_scores: DimensionalScores::new(scores),
            qualitative_analysis: sentinel_map(&QUALITATIVE_FIELDS),
            score_justification: sentinel_map(&JUSTIFICATION_FIELDS),
            extra: Map::new(),
        }
    }
}

fn sentinel_map(fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| (f.to_string(), Value::String(ERROR_SENTINEL.to_string())))
        .collect()
}

/// Result of one scoring attempt. A failed attempt keeps its reason so callers
/// can log it even though the row is still emitted with placeholder content.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringOutcome {
    Scored(LlmScoringResult),
    Failed { reason: String },
}

impl ScoringOutcome {
    #[cfg(test)]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ScoringOutcome::Scored(_) => None,
            ScoringOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// A candidate merged with its model output and final score.
///
/// Serializes as one flat JSON object: candidate columns, then the model
/// sections, then `final_weighted_score`. Later keys overwrite earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoredResult {
    record: Map<String, Value>,
    #[serde(skip)]
    final_weighted_score: f64,
    #[serde(skip)]
    failure: Option<String>,
}

impl ScoredResult {
    pub fn new(
        candidate: &CandidateRow,
        report: &LlmScoringResult,
        final_weighted_score: f64,
        failure: Option<String>,
    ) -> Self {
        let mut record = candidate.fields().clone();
        if let Ok(Value::Object(sections)) = serde_json::to_value(report) {
            record.extend(sections);
        }
        record.insert(FINAL_SCORE_FIELD.to_string(), Value::from(final_weighted_score));
        Self {
            record,
            final_weighted_score,
            failure,
        }
    }

    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    pub fn final_weighted_score(&self) -> f64 {
        self.final_weighted_score
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

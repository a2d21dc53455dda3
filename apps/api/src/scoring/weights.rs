//! Scoring weights and the final weighted-score formula.
//!
//! Weights come from a JSON file shaped as
//! `{"SCORING_CATEGORIES": {"equipo": {"peso": 0.3, ...}, ...}}` and are used
//! as-is: they are not required to sum to 1.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::scoring::DimensionalScores;

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to read scoring config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scoring config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scoring config has no 'SCORING_CATEGORIES' key")]
    MissingCategories,
}

/// One configured scoring dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    #[serde(rename = "peso", alias = "weight", default)]
    pub weight: f64,
    /// Descriptive fields (labels, help text) passed through to the front-end untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CategoryWeight {
    #[cfg(test)]
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringWeights(BTreeMap<String, CategoryWeight>);

#[derive(Deserialize)]
struct ScoringConfigFile {
    #[serde(rename = "SCORING_CATEGORIES")]
    categories: Option<ScoringWeights>,
}

impl ScoringWeights {
    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(d, w)| (d.to_string(), CategoryWeight::new(w)))
                .collect(),
        )
    }

    pub fn from_json_str(raw: &str) -> Result<Self, WeightsError> {
        let file: ScoringConfigFile = serde_json::from_str(raw)?;
        file.categories.ok_or(WeightsError::MissingCategories)
    }

    pub fn load(path: &Path) -> Result<Self, WeightsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| WeightsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(d, c)| (d.as_str(), c.weight))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Σ over configured dimensions of `score × weight`, rounded to 2 decimals.
///
/// Dimensions the model scored but the config does not name are ignored;
/// configured dimensions with a missing or non-numeric score contribute 0.
pub fn compute_final_score(scores: &DimensionalScores, weights: &ScoringWeights) -> f64 {
    let total: f64 = weights
        .iter()
        .map(|(dimension, weight)| scores.get(dimension).unwrap_or(0.0) * weight)
        .sum();
    round2(total)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scores(value: Value) -> DimensionalScores {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_even_split() {
        let w = ScoringWeights::from_pairs([("equipo", 0.5), ("producto", 0.5)]);
        let s = scores(json!({"equipo": 80, "producto": 60}));
        assert_eq!(compute_final_score(&s, &w), 70.0);
    }

    #[test]
    fn test_missing_and_null_dimensions_count_as_zero() {
        let w = ScoringWeights::from_pairs([("equipo", 0.4), ("oportunidad", 0.3), ("validacion", 0.3)]);
        let s = scores(json!({"equipo": 90, "oportunidad": null}));
        // 0.4*90 = 36
        assert_eq!(compute_final_score(&s, &w), 36.0);
    }

    #[test]
    fn test_unweighted_dimensions_ignored() {
        let w = ScoringWeights::from_pairs([("equipo", 1.0)]);
        let s = scores(json!({"equipo": 10, "producto": 100}));
        assert_eq!(compute_final_score(&s, &w), 10.0);
    }

    #[test]
    fn test_weights_not_normalized() {
        let w = ScoringWeights::from_pairs([("equipo", 2.0), ("producto", 1.5)]);
        let s = scores(json!({"equipo": 10, "producto": 10}));
        assert_eq!(compute_final_score(&s, &w), 35.0);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let w = ScoringWeights::from_pairs([("equipo", 0.333)]);
        let s = scores(json!({"equipo": 77}));
        // 25.641
        assert_eq!(compute_final_score(&s, &w), 25.64);
    }

    #[test]
    fn test_empty_weights_score_zero() {
        let s = scores(json!({"equipo": 100}));
        assert_eq!(compute_final_score(&s, &ScoringWeights::default()), 0.0);
    }

    #[test]
    fn test_config_file_parsing_keeps_extra_fields() {
        let raw = r#"{
            "SCORING_CATEGORIES": {
                "equipo": {"peso": 0.3, "label": "Equipo"},
                "tesis_utec": {"weight": 0.2}
            }
        }"#;
        let w = ScoringWeights::from_json_str(raw).unwrap();
        let dims: Vec<_> = w.dimensions().collect();
        assert_eq!(dims, vec!["equipo", "tesis_utec"]);

        let reflected = serde_json::to_value(&w).unwrap();
        assert_eq!(reflected["equipo"]["peso"], 0.3);
        assert_eq!(reflected["equipo"]["label"], "Equipo");
        assert_eq!(reflected["tesis_utec"]["peso"], 0.2);
    }

    #[test]
    fn test_config_without_categories_is_rejected() {
        let err = ScoringWeights::from_json_str(r#"{"OTHER": {}}"#).unwrap_err();
        assert!(matches!(err, WeightsError::MissingCategories));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScoringWeights::load(Path::new("/nonexistent/scoring_config.json")).unwrap_err();
        assert!(matches!(err, WeightsError::Io { .. }));
    }
}

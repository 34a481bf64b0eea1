//! Evaluation data types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Evaluation worker failed: {0}")]
    Worker(String),
}

/// What the caller is steering the conversation towards
///
/// Parsed leniently: anything other than an object with a `keywords` array
/// yields no keywords, and non-string array items are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Goals {
    pub keywords: Vec<String>,
}

impl Goals {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Value> for Goals {
    fn from(value: Value) -> Self {
        let keywords = value
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { keywords }
    }
}

/// A proposed next utterance or move
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateAction {
    pub text: String,
}

impl CandidateAction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl std::fmt::Display for CandidateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Caller-supplied candidates, validated at the JSON boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePool(Vec<CandidateAction>);

impl CandidatePool {
    /// Accept only an array of strings
    pub fn from_value(value: &Value) -> Result<Self, EvaluationError> {
        let items = value.as_array().ok_or_else(|| {
            EvaluationError::InvalidArgument("candidates must be an array".to_string())
        })?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(CandidateAction::new).ok_or_else(|| {
                    EvaluationError::InvalidArgument(format!(
                        "candidates[{i}] must be a string"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn into_inner(self) -> Vec<CandidateAction> {
        self.0
    }
}

/// One rollout of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub score: f64,
    /// Human-readable step and bonus lines, in order
    pub trace: Vec<String>,
    pub final_state: String,
}

/// All rollouts of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateDetail {
    pub action: CandidateAction,
    pub mean: f64,
    pub rollouts: Vec<SimulationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub best_action: CandidateAction,
    pub expected_value: f64,
    /// One entry per candidate, in input order
    pub details: Vec<CandidateDetail>,
}

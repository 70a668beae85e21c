use crate::domain::analysis::QueryAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One result row as column name to scalar value.
pub type ResultRow = HashMap<String, serde_json::Value>;

/// Candidate SQL produced by the synthesizer. The explanation keeps the
/// full generated text, including any prose around the statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlCandidate {
    pub statement: String,
    pub explanation: String,
}

/// Outcome of the safety gate. Pure function of the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Terminal artifact of one pipeline run.
///
/// On a validation failure the partial `analysis` and `statement` are still
/// attached for transparency; runtime faults (execution, insight generation)
/// carry only the error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<QueryAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<ResultRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineOutcome {
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            analysis: None,
            statement: None,
            explanation: None,
            rows: None,
            row_count: None,
            insights: None,
            error: Some(error),
        }
    }
}
